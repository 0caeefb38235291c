/*!
 * Monitoring
 * Tracing setup for binaries embedding a pool
 */

mod tracer;

pub use tracer::{init_tracing, span_collection, CollectionSpan};
