/*!
 * Clockwork GC Library
 * Non-tracing time-wheel garbage collector for embedding hosts
 *
 * Blocks are leased rather than traced: every block expires at a wheel slot
 * unless the block holding it re-asserts the reference in time. Fat blocks
 * are periodically asked to re-assert their references through the host's
 * `preserve` callback, and ownership rings are detected and cut loose so
 * they can expire.
 */

pub mod core;
pub mod gc;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::{GcError, GcResult, Size, Slot, Tick};
pub use gc::{OwnerChain, Pool};
pub use memory::{
    BlockId, BlockKind, BlockState, CompactSize, DrainMode, Host, PoolConfig, PoolStats, VecHost,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
