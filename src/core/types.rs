/*!
 * Core Types
 * Common types used across the collector
 */

/// Index into one of the scheduling wheels
///
/// Wheels have exactly 256 slots, so slot arithmetic is plain `u8` wrapping.
pub type Slot = u8;

/// Size type for memory accounting
pub type Size = usize;

/// Monotonic clock value; `tick as Slot` is the slot it points at
pub type Tick = u64;

/// Slot a clock value points at
#[inline]
pub const fn slot_of(clock: Tick) -> Slot {
    (clock % super::limits::NUM_SLOTS as Tick) as Slot
}
