/*!
 * Cycle Detector
 *
 * Ownership rings (A owns B owns A) keep re-asserting each other from their
 * preserve callbacks and would never expire on their own. Each preservation
 * pass counts down a per-block interval; when it runs out the block's owner
 * chain is walked, and a chain leading back to the block is cut loose: every
 * member becomes an orphan and stops being preserved. Orphans then expire
 * through their stale expiration slots unless a reference from outside the
 * ring rescues them first.
 */

use super::pool::Pool;
use super::wheel::Chain;
use crate::memory::block::BlockId;
use crate::memory::traits::Host;
use ahash::AHashSet;
use tracing::debug;

/// Outcome of walking a block's owner chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerChain {
    /// The chain ends at a root or a block that is gone
    Open,
    /// The chain leads into a ring that does not include the start
    Joins(BlockId),
    /// The chain returns to the start; members in walk order
    Ring(Vec<BlockId>),
}

impl<H: Host> Pool<H> {
    /// Walk `owner` links from `start`
    ///
    /// The walk visits each block at most once, so it is bounded by the live
    /// block count.
    pub fn owner_chain(&self, start: BlockId) -> OwnerChain {
        let mut members = vec![start];
        let mut seen = AHashSet::with_capacity(8);
        seen.insert(start);

        let mut cursor = self.owner(start);
        while let Some(id) = cursor {
            if id == start {
                return OwnerChain::Ring(members);
            }
            // Blocks being expired are already unscheduled
            let settled = self.arena.get(id).map_or(false, |b| !b.header.expiring);
            if !settled {
                break;
            }
            if !seen.insert(id) {
                return OwnerChain::Joins(id);
            }
            members.push(id);
            cursor = self.owner(id);
        }
        OwnerChain::Open
    }

    /// Count down the block's ring check and orphan its ring when due
    ///
    /// Returns whether the block itself was orphaned.
    pub(super) fn check_ownership_ring(&mut self, index: u32) -> bool {
        let interval = self.config().cycle_detect_interval;
        let id = self.arena.id_at(index);

        let due = match self.arena.at_mut(index).fat_mut() {
            Some(fat) => {
                fat.countdown = fat.countdown.saturating_sub(1);
                if fat.countdown == 0 {
                    fat.countdown = interval;
                    fat.owner.is_some()
                } else {
                    false
                }
            }
            None => false,
        };
        if !due {
            return false;
        }

        match self.owner_chain(id) {
            OwnerChain::Ring(members) => {
                debug!(block = %id, members = members.len(), "ownership ring orphaned");
                for member in members {
                    self.orphan(member.index());
                }
                true
            }
            _ => false,
        }
    }

    fn orphan(&mut self, index: u32) {
        if self.arena.at(index).header.desc.is_orphan() {
            return;
        }
        self.preservation.unlink(&mut self.arena, index);

        let block = self.arena.at_mut(index);
        block.header.desc.set_orphan(true);
        if let Some(fat) = block.fat_mut() {
            fat.owner = None;
        }
        self.preservation.push(&mut self.arena, index, Chain::Side);
        self.counters.orphaned += 1;
    }
}
