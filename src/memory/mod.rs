/*!
 * Memory Module
 * Block model, size codec and host interface
 */

pub(crate) mod arena;
pub mod block;
pub mod size;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use block::BlockId;
pub use size::CompactSize;
pub use traits::*;
pub use types::*;
