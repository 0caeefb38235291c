/*!
 * Scheduling Math
 * Circular slot ordering and preservation-slot selection
 */

use crate::core::limits::{PRESERVE_TAIL_GAP, RAND_COUNT};
use crate::core::types::Slot;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Whether `before` comes strictly earlier than `after` on a wheel read
/// forward from `now`
///
/// `now` itself is the earliest position, so a slot equal to `now` is before
/// every other slot. Equal slots are never before each other.
#[inline]
pub(crate) fn is_before(now: Slot, before: Slot, after: Slot) -> bool {
    before.wrapping_sub(now) < after.wrapping_sub(now)
}

/// Pick a preservation slot in the window `[floor, now - 2)` read forward
///
/// `floor` is the block's expiration slot, or `now + 1` for roots, so a
/// parent is asked to re-assert its children no later than the children
/// would expire. `rnd` spreads blocks across the window.
#[inline]
pub(crate) fn preserve_slot(now: Slot, floor: Slot, rnd: u32) -> Slot {
    let ceiling = now.wrapping_sub(PRESERVE_TAIL_GAP);
    let width = ceiling.wrapping_sub(floor);
    if width == 0 {
        floor
    } else {
        floor.wrapping_add((rnd % width as u32) as Slot)
    }
}

/// Fixed table of seeded random values walked by a cursor
#[derive(Debug, Clone)]
pub(crate) struct Jitter {
    table: [u32; RAND_COUNT],
    cursor: usize,
}

impl Jitter {
    pub fn seeded(seed: u64) -> Self {
        let mut table = [0u32; RAND_COUNT];
        StdRng::seed_from_u64(seed).fill(&mut table[..]);
        Self { table, cursor: 0 }
    }

    #[inline]
    pub fn next(&mut self) -> u32 {
        let value = self.table[self.cursor % RAND_COUNT];
        self.cursor = self.cursor.wrapping_add(1);
        value
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
