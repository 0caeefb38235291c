/*!
 * Collector Limits and Constants
 *
 * Centralized location for the scheduling constants of the collector.
 * Performance-sensitive constants are marked with [PERF].
 */

use super::types::Size;

// =============================================================================
// WHEEL GEOMETRY
// =============================================================================

/// Number of slots in the expiration and preservation wheels
/// Must stay 256: slots are stored as `u8` and rely on wrapping arithmetic
pub const NUM_SLOTS: usize = 256;

/// Ticks forced by quota reclamation before an allocation gives up
/// One full wheel revolution visits every pending expiration once
pub const MAX_RECLAIM_TICKS: usize = NUM_SLOTS;

/// Closest a preservation slot may be scheduled behind the clock
/// The window for a new preservation slot ends at `now - PRESERVE_TAIL_GAP`
pub const PRESERVE_TAIL_GAP: u8 = 2;

/// Drain passes pool teardown makes before releasing leftovers unexpired
/// Bounds teardown when expire callbacks keep allocating
pub const MAX_TEARDOWN_PASSES: usize = NUM_SLOTS;

// =============================================================================
// CYCLE DETECTION
// =============================================================================

/// Preservation passes between ownership-ring checks of a fat block
/// Short enough to catch abandoned rings within a few revolutions, long
/// enough that a structure still under construction is not orphaned
pub const CYCLE_DETECT_INTERVAL: u8 = 4;

// =============================================================================
// RANDOMIZATION
// =============================================================================

/// Entries in the per-pool jitter table used for preservation slots
/// [PERF] Table lookups keep slot selection branch-light on the hot path
pub const RAND_COUNT: usize = 128;

/// Seed used for the jitter table when the config does not provide one
pub const DEFAULT_SEED: u64 = 0x7e17_6142_c640_db5e;

// =============================================================================
// QUOTA
// =============================================================================

/// Default pool quota (1MB of header + payload bytes)
pub const DEFAULT_QUOTA: Size = 1_000_000;
