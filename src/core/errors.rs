/*!
 * Error Types
 * Collector error handling with thiserror, miette, and serde support
 */

use crate::memory::BlockId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collector operation result
pub type GcResult<T> = Result<T, GcError>;

/// Errors surfaced by pool allocation and configuration
///
/// Reference-protocol misuse is never reported here; `reference` and
/// `unroot` ignore invalid combinations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum GcError {
    #[error("Quota exceeded: requested {requested} bytes, available {available} bytes ({used} used / {quota} quota)")]
    #[diagnostic(
        code(gc::quota_exceeded),
        help("A full collection cycle could not free enough space. Drop roots or raise the quota.")
    )]
    QuotaExceeded {
        requested: usize,
        available: usize,
        used: usize,
        quota: usize,
    },

    #[error("Allocation of {size} bytes cannot be encoded (maximum {max} bytes)")]
    #[diagnostic(
        code(gc::size_overflow),
        help("Split the payload into several blocks.")
    )]
    SizeOverflow { size: usize, max: usize },

    #[error("Host allocator failed to provide {size} bytes")]
    #[diagnostic(
        code(gc::host_alloc_failed),
        help("The host allocator returned no memory. The collector does not retry.")
    )]
    HostAllocFailed { size: usize },

    #[error("Invalid owner {0}: owners must be live fat blocks")]
    #[diagnostic(
        code(gc::invalid_owner),
        help("Pass a handle returned by alloc_fat that has not expired, or no owner for a root.")
    )]
    InvalidOwner(BlockId),

    #[error("Invalid pool configuration: {0}")]
    #[diagnostic(code(gc::invalid_config))]
    InvalidConfig(String),
}

impl GcError {
    /// Whether retrying after more collection could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GcError::QuotaExceeded { .. } | GcError::HostAllocFailed { .. })
    }
}
