/*!
 * Collector
 * Time-wheel scheduling, the reference protocol and ring detection
 */

pub mod cycle;
pub mod pool;
pub(crate) mod schedule;
pub(crate) mod wheel;

pub use cycle::OwnerChain;
pub use pool::Pool;
