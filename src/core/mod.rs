/*!
 * Core
 * Shared types, limits and errors for the collector
 */

pub mod errors;
pub mod limits;
pub mod types;

pub use errors::{GcError, GcResult};
pub use types::{Size, Slot, Tick};
