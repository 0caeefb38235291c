/*!
 * Host Traits
 * The interface an embedding program implements to drive a pool
 */

use super::block::BlockId;
use crate::core::types::Size;
use crate::gc::Pool;

/// Host side of a pool: raw memory source plus lifecycle notifications
///
/// The host value is the pool's opaque context. `expire` and `preserve` are
/// associated functions receiving the whole pool so they can reach the host
/// through [`Pool::host_mut`] and re-enter any pool operation.
pub trait Host: Sized {
    /// Payload stored for each block
    type Memory;

    /// Provide storage for a payload of `size` bytes
    ///
    /// Returning `None` fails the allocation with `HostAllocFailed`.
    fn alloc(&mut self, size: Size) -> Option<Self::Memory>;

    /// Release a payload; called once per freed block
    fn free(&mut self, memory: Self::Memory);

    /// Called exactly once right before `block` is freed
    ///
    /// The payload is still reachable through [`Pool::memory`].
    fn expire(_pool: &mut Pool<Self>, _block: BlockId) {}

    /// Called when a fat block's lease is due for renewal
    ///
    /// Implementations must call [`Pool::reference`] for every block `block`
    /// still refers to, or those targets may expire while in use.
    fn preserve(_pool: &mut Pool<Self>, _block: BlockId) {}
}

/// Host backed by zeroed byte vectors, with no callbacks
///
/// Suitable for atomic data where nothing needs re-asserting.
#[derive(Debug, Default, Clone)]
pub struct VecHost;

impl Host for VecHost {
    type Memory = Vec<u8>;

    fn alloc(&mut self, size: Size) -> Option<Vec<u8>> {
        Some(vec![0; size])
    }

    fn free(&mut self, _memory: Vec<u8>) {}
}
