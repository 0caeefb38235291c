/*!
 * Collector Pool
 *
 * Owns the block arena, both scheduling wheels, the clock and the quota.
 *
 * ## Scheduling
 *
 * - **Expiration wheel**: every owned block sits in the slot of its owner's
 *   preservation slot. Reaching that slot without a fresh `reference` frees it.
 * - **Preservation wheel**: every fat block sits in a slot chosen between its
 *   own expiration slot and the clock tail. Reaching it invokes the host
 *   `preserve` callback, which re-asserts the block's outgoing references and
 *   so pushes its children's expiration forward.
 * - **Roots** live on a side list of the expiration lane and never expire
 *   through the wheel. **Orphans** live on a side list of the preservation
 *   lane and are no longer preserved.
 *
 * A slot is processed preservations first, so a parent due in the same slot
 * as its children always refreshes them before they are considered expired.
 */

use super::schedule::{is_before, preserve_slot, Jitter};
use super::wheel::{Chain, Expiration, Preservation, Wheel};
use crate::core::errors::{GcError, GcResult};
use crate::core::limits::{MAX_RECLAIM_TICKS, MAX_TEARDOWN_PASSES, NUM_SLOTS};
use crate::core::types::{slot_of, Size, Slot, Tick};
use crate::memory::arena::Arena;
use crate::memory::block::{Block, BlockId};
use crate::memory::size::CompactSize;
use crate::memory::traits::Host;
use crate::memory::types::{BlockKind, BlockState, DrainMode, PoolConfig, PoolStats};
use tracing::{debug, trace, warn};

#[derive(Debug, Default, Clone, Copy)]
pub(super) struct Counters {
    pub preserved: u64,
    pub expired: u64,
    pub orphaned: u64,
    pub forced_ticks: u64,
}

/// Garbage-collected memory pool
///
/// Single-owner and not thread-safe: every operation takes `&mut self`, and
/// host callbacks run synchronously inside `tick`, `step`, `cycle` and
/// allocation. Dropping the pool expires every live block.
pub struct Pool<H: Host> {
    config: PoolConfig,
    host: H,
    pub(super) arena: Arena<H::Memory>,
    pub(super) expiration: Wheel<Expiration>,
    pub(super) preservation: Wheel<Preservation>,
    clock: Tick,
    jitter: Jitter,
    used: Size,
    pub(super) counters: Counters,
}

impl<H: Host> Pool<H> {
    /// Create an empty pool
    pub fn new(config: PoolConfig, host: H) -> GcResult<Self> {
        config.validate()?;
        debug!(
            quota = config.quota,
            cycle_detect_interval = config.cycle_detect_interval,
            "collector pool created"
        );

        Ok(Self {
            jitter: Jitter::seeded(config.seed),
            config,
            host,
            arena: Arena::new(),
            expiration: Wheel::new(),
            preservation: Wheel::new(),
            clock: 0,
            used: 0,
            counters: Counters::default(),
        })
    }

    /// Create a pool with the default configuration and a custom quota
    pub fn with_quota(quota: Size, host: H) -> GcResult<Self> {
        Self::new(PoolConfig::new(quota), host)
    }

    /// Expire every live block and release the pool
    pub fn free_pool(mut self) {
        self.teardown();
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate an atomic block, owned by `owner` or rooted when `None`
    pub fn alloc_slim(&mut self, size: Size, owner: Option<BlockId>) -> GcResult<BlockId> {
        self.alloc(BlockKind::Slim, size, owner)
    }

    /// Allocate a block that may hold references, owned by `owner` or rooted
    pub fn alloc_fat(&mut self, size: Size, owner: Option<BlockId>) -> GcResult<BlockId> {
        self.alloc(BlockKind::Fat, size, owner)
    }

    /// Allocate a block of either kind
    pub fn alloc(
        &mut self,
        kind: BlockKind,
        size: Size,
        owner: Option<BlockId>,
    ) -> GcResult<BlockId> {
        if let Some(owner) = owner {
            self.owner_slot(owner).ok_or(GcError::InvalidOwner(owner))?;
        }

        let compact = CompactSize::compress(size);
        if compact.decompress() < size {
            return Err(GcError::SizeOverflow {
                size,
                max: CompactSize::max_size(),
            });
        }
        let footprint = kind.header_size() + compact.decompress();

        self.reserve_for_alloc(footprint)?;

        // Forced collection may have expired the owner
        let owner_slot = match owner {
            Some(owner) => Some((owner, self.owner_slot(owner).ok_or(GcError::InvalidOwner(owner))?)),
            None => None,
        };

        let memory = self
            .host
            .alloc(size)
            .ok_or(GcError::HostAllocFailed { size })?;

        let id = self
            .arena
            .insert(Block::new(kind, compact, owner.is_none(), memory));
        let index = id.index();
        if let Some(fat) = self.arena.at_mut(index).fat_mut() {
            fat.countdown = self.config.cycle_detect_interval;
        }

        match owner_slot {
            Some((owner, slot)) => {
                self.set_owner(index, owner, slot);
                self.expiration
                    .push(&mut self.arena, index, Chain::Slot(slot));
            }
            None => self.to_root(index),
        }

        if kind == BlockKind::Fat {
            let slot = self.next_preserve_slot(index);
            self.set_preserve(index, slot);
        }

        self.used += footprint;
        trace!(block = %id, ?kind, size, footprint, owner = ?owner, "allocated block");
        Ok(id)
    }

    /// Quota check before a raw allocation, forcing collection if needed
    fn reserve_for_alloc(&mut self, footprint: Size) -> GcResult<()> {
        if footprint > self.config.quota {
            return Err(self.quota_error(footprint));
        }

        if !self.reclaim(footprint) {
            let err = self.quota_error(footprint);
            warn!(
                requested = footprint,
                used = self.used,
                quota = self.config.quota,
                "allocation refused after a full reclamation cycle"
            );
            return Err(err);
        }
        Ok(())
    }

    fn quota_error(&self, requested: Size) -> GcError {
        GcError::QuotaExceeded {
            requested,
            available: self.avail(),
            used: self.used,
            quota: self.config.quota,
        }
    }

    /// Tick until `amount` more bytes fit, at most one wheel revolution
    fn reclaim(&mut self, amount: Size) -> bool {
        let mut ticks = MAX_RECLAIM_TICKS;
        while self.used.saturating_add(amount) > self.config.quota && ticks > 0 {
            self.tick();
            self.counters.forced_ticks += 1;
            ticks -= 1;
        }

        if ticks < MAX_RECLAIM_TICKS {
            debug!(
                forced = MAX_RECLAIM_TICKS - ticks,
                used = self.used,
                quota = self.config.quota,
                "quota pressure forced collection"
            );
        }
        self.used.saturating_add(amount) <= self.config.quota
    }

    // =========================================================================
    // Reference protocol
    // =========================================================================

    /// Record that `owner` holds a reference to `block`
    ///
    /// Must be called when a reference is first stored and again from every
    /// `preserve` callback of the holder. `None` promotes `block` to a root.
    /// Dead handles, self-references and roots are ignored.
    pub fn reference(&mut self, block: BlockId, owner: Option<BlockId>) {
        if owner == Some(block) {
            return;
        }
        match self.arena.get(block) {
            Some(target) if !target.header.expiring => {
                if target.header.desc.is_root() {
                    return;
                }
            }
            _ => {
                trace!(block = %block, "reference to dead block ignored");
                return;
            }
        }

        let owner_slot = match owner {
            Some(owner) => match self.owner_slot(owner) {
                Some(slot) => Some((owner, slot)),
                None => {
                    trace!(block = %block, owner = %owner, "reference from invalid owner ignored");
                    return;
                }
            },
            None => None,
        };

        let index = block.index();
        self.expiration.unlink(&mut self.arena, index);

        let Some((owner, slot)) = owner_slot else {
            let was_orphan = self.arena.at(index).header.desc.is_orphan();
            self.to_root(index);
            trace!(block = %block, "promoted to root");
            if was_orphan {
                self.rescue(index);
            }
            return;
        };

        let interval = self.config.cycle_detect_interval;
        let now = self.now();
        let target = self.arena.at_mut(index);
        if let Some(fat) = target.fat_mut() {
            // A holder other than the recorded owner proves the block is not
            // only reachable from its own ring
            if fat.owner != Some(owner) {
                fat.countdown = interval;
            }
        }

        let was_orphan = target.header.desc.is_orphan();
        let adopt = was_orphan || is_before(now, target.header.e_slot, slot);
        if adopt {
            self.set_owner(index, owner, slot);
        }

        let e_slot = self.arena.at(index).header.e_slot;
        self.expiration
            .push(&mut self.arena, index, Chain::Slot(e_slot));

        // Only a holder still in preservation can rescue; orphan-to-orphan
        // references keep a dead ring collectible
        if adopt && was_orphan && !self.is_orphan(owner) {
            self.rescue(index);
        }
    }

    /// Demote a root to being owned by `owner`
    ///
    /// `owner` must be the only holder at this instant; every other holder has
    /// to call [`Pool::reference`] before the next collection or allocation.
    pub fn unroot(&mut self, block: BlockId, owner: BlockId) {
        if block == owner {
            return;
        }
        let rooted = self
            .arena
            .get(block)
            .map_or(false, |b| b.header.desc.is_root() && !b.header.expiring);
        if !rooted {
            return;
        }
        let Some(slot) = self.owner_slot(owner) else {
            return;
        };

        let index = block.index();
        self.expiration.unlink(&mut self.arena, index);
        self.arena.at_mut(index).header.desc.set_root(false);
        self.set_owner(index, owner, slot);
        self.expiration
            .push(&mut self.arena, index, Chain::Slot(slot));
        trace!(block = %block, owner = %owner, "unrooted");
    }

    /// Preservation slot of a live, fat, non-expiring owner
    fn owner_slot(&self, owner: BlockId) -> Option<Slot> {
        self.arena
            .get(owner)
            .filter(|b| !b.header.expiring)
            .and_then(Block::fat)
            .map(|fat| fat.p_slot)
    }

    fn is_orphan(&self, block: BlockId) -> bool {
        self.arena
            .get(block)
            .map_or(false, |b| b.header.desc.is_orphan())
    }

    fn set_owner(&mut self, index: u32, owner: BlockId, slot: Slot) {
        let block = self.arena.at_mut(index);
        block.header.e_slot = slot;
        if let Some(fat) = block.fat_mut() {
            fat.owner = Some(owner);
        }
    }

    fn to_root(&mut self, index: u32) {
        let block = self.arena.at_mut(index);
        block.header.desc.set_root(true);
        if let Some(fat) = block.fat_mut() {
            fat.owner = None;
        }
        self.expiration.push(&mut self.arena, index, Chain::Side);
    }

    /// Bring an orphan back into preservation scheduling
    fn rescue(&mut self, index: u32) {
        self.arena.at_mut(index).header.desc.set_orphan(false);
        trace!(block = %self.arena.id_at(index), "orphan rescued");
        self.preserve_block(index);
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Process every preservation and expiration due in the current slot,
    /// then advance the clock
    pub fn tick(&mut self) {
        let slot = self.now();
        while let Some(index) = self.preservation.head(Chain::Slot(slot)) {
            self.preserve_block(index);
        }
        while let Some(index) = self.expiration.head(Chain::Slot(slot)) {
            self.expire_block(index);
        }
        self.clock += 1;
    }

    /// Perform one unit of work: a preservation, else an expiration, else a
    /// clock advance
    pub fn step(&mut self) {
        let slot = self.now();
        if let Some(index) = self.preservation.head(Chain::Slot(slot)) {
            self.preserve_block(index);
        } else if let Some(index) = self.expiration.head(Chain::Slot(slot)) {
            self.expire_block(index);
        } else {
            self.clock += 1;
        }
    }

    /// Tick once per wheel slot
    pub fn cycle(&mut self) {
        for _ in 0..NUM_SLOTS {
            self.tick();
        }
    }

    /// Collect until `amount` more bytes fit in the quota, for at most one
    /// cycle; returns whether they now fit
    pub fn reserve(&mut self, amount: Size) -> bool {
        self.reclaim(amount)
    }

    fn preserve_block(&mut self, index: u32) {
        let id = self.arena.id_at(index);
        let slot = self.next_preserve_slot(index);
        self.preservation.unlink(&mut self.arena, index);
        self.set_preserve(index, slot);
        self.counters.preserved += 1;

        // An orphan still re-asserts once, so its children are not freed in
        // the slot that cut the ring loose
        let orphaned = self.check_ownership_ring(index);

        trace!(block = %id, slot, orphaned, "preserving");
        H::preserve(self, id);
    }

    fn set_preserve(&mut self, index: u32, slot: Slot) {
        if let Some(fat) = self.arena.at_mut(index).fat_mut() {
            fat.p_slot = slot;
        }
        self.preservation
            .push(&mut self.arena, index, Chain::Slot(slot));
    }

    fn next_preserve_slot(&mut self, index: u32) -> Slot {
        let now = self.now();
        let header = &self.arena.at(index).header;
        let floor = if header.desc.is_root() {
            now.wrapping_add(1)
        } else {
            header.e_slot
        };
        preserve_slot(now, floor, self.jitter.next())
    }

    fn expire_block(&mut self, index: u32) {
        let id = self.arena.id_at(index);
        self.expiration.unlink(&mut self.arena, index);
        if self.arena.at(index).header.desc.is_fat() {
            self.preservation.unlink(&mut self.arena, index);
        }

        // Unlinked and marked so re-entrant calls treat it as gone
        self.arena.at_mut(index).header.expiring = true;
        H::expire(self, id);

        if let Some(block) = self.arena.remove(id) {
            self.used -= block.footprint();
            self.counters.expired += 1;
            trace!(block = %id, "expired");
            self.host.free(block.memory);
        }
    }

    /// Expire everything still live
    fn teardown(&mut self) {
        let live = self.arena.len();
        let mut passes = 0;
        loop {
            // Blocks created by callbacks during a pass wait for the next one
            for id in self.drain_order() {
                let pending = self
                    .arena
                    .get(id)
                    .map_or(false, |b| !b.header.expiring);
                if pending {
                    self.expire_block(id.index());
                }
            }
            passes += 1;

            if self.arena.is_empty() || self.config.drain_on_drop == DrainMode::SinglePass {
                break;
            }
            if passes >= MAX_TEARDOWN_PASSES {
                warn!(
                    passes,
                    remaining = self.arena.len(),
                    "expire callbacks keep creating blocks; releasing the rest"
                );
                break;
            }
        }

        let leftover: Vec<BlockId> = self.arena.ids().collect();
        if !leftover.is_empty() {
            debug!(count = leftover.len(), "releasing blocks left after teardown pass");
        }
        for id in leftover {
            if let Some(block) = self.arena.remove(id) {
                self.used -= block.footprint();
                self.host.free(block.memory);
            }
        }
        // Released blocks may still be named by list heads
        self.expiration = Wheel::new();
        self.preservation = Wheel::new();

        if live > 0 {
            debug!(blocks = live, "collector pool drained");
        }
    }

    /// Every block on the expiration lane: wheel slots in order, then roots
    fn drain_order(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.arena.len());
        for slot in 0..NUM_SLOTS {
            let chain = Chain::Slot(slot as Slot);
            order.extend(
                self.expiration
                    .members(&self.arena, chain)
                    .into_iter()
                    .map(|index| self.arena.id_at(index)),
            );
        }
        order.extend(
            self.expiration
                .members(&self.arena, Chain::Side)
                .into_iter()
                .map(|index| self.arena.id_at(index)),
        );
        order
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Bytes left in the quota
    pub fn avail(&self) -> Size {
        self.config.quota.saturating_sub(self.used)
    }

    /// Bytes charged by live blocks
    pub fn used(&self) -> Size {
        self.used
    }

    pub fn quota(&self) -> Size {
        self.config.quota
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Clock value; the current slot is `clock % 256`
    pub fn clock(&self) -> Tick {
        self.clock
    }

    #[inline]
    fn now(&self) -> Slot {
        slot_of(self.clock)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Payload of a live block
    pub fn memory(&self, block: BlockId) -> Option<&H::Memory> {
        self.arena.get(block).map(|b| &b.memory)
    }

    pub fn memory_mut(&mut self, block: BlockId) -> Option<&mut H::Memory> {
        self.arena.get_mut(block).map(|b| &mut b.memory)
    }

    pub fn is_live(&self, block: BlockId) -> bool {
        self.arena.contains(block)
    }

    /// Number of live blocks
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Handles of every live block
    pub fn blocks(&self) -> Vec<BlockId> {
        self.arena.ids().collect()
    }

    pub fn kind(&self, block: BlockId) -> Option<BlockKind> {
        self.arena.get(block).map(Block::kind)
    }

    pub fn block_state(&self, block: BlockId) -> Option<BlockState> {
        self.arena.get(block).map(|b| {
            if b.header.desc.is_root() {
                BlockState::Root
            } else if b.header.desc.is_orphan() {
                BlockState::Orphan
            } else {
                BlockState::Owned
            }
        })
    }

    /// Recorded owner of a fat block
    pub fn owner(&self, block: BlockId) -> Option<BlockId> {
        self.arena.get(block).and_then(Block::owner)
    }

    /// Bytes a live block charges against the quota
    pub fn block_footprint(&self, block: BlockId) -> Option<Size> {
        self.arena.get(block).map(Block::footprint)
    }

    /// Bytes a new block of `kind` and `size` would charge, if representable
    pub fn footprint(&self, kind: BlockKind, size: Size) -> Option<Size> {
        let decoded = CompactSize::compress(size).decompress();
        (decoded >= size).then(|| kind.header_size() + decoded)
    }

    /// Slot a block will expire in, unless rooted
    pub fn expiration_slot(&self, block: BlockId) -> Option<Slot> {
        self.arena
            .get(block)
            .filter(|b| !b.header.desc.is_root())
            .map(|b| b.header.e_slot)
    }

    /// Slot a fat block is next preserved in, unless orphaned
    pub fn preservation_slot(&self, block: BlockId) -> Option<Slot> {
        self.arena
            .get(block)
            .filter(|b| !b.header.desc.is_orphan())
            .and_then(Block::fat)
            .map(|fat| fat.p_slot)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            quota: self.config.quota,
            used: self.used,
            available: self.avail(),
            live_blocks: self.arena.len(),
            fat_blocks: self.arena.blocks().filter(|b| b.fat().is_some()).count(),
            roots: self.expiration.side_len(),
            orphans: self.preservation.side_len(),
            clock: self.clock,
            preserved: self.counters.preserved,
            expired: self.counters.expired,
            orphaned: self.counters.orphaned,
            forced_ticks: self.counters.forced_ticks,
        }
    }

    /// Check wheel membership and byte accounting against every live block
    pub fn audit(&self) -> Result<(), String> {
        let mut total = 0;
        let mut roots = 0;
        let mut orphans = 0;

        for id in self.arena.ids() {
            let Some(block) = self.arena.get(id) else {
                continue;
            };
            let desc = block.header.desc;
            total += block.footprint();

            if desc.is_root() && desc.is_orphan() {
                return Err(format!("{} is both root and orphan", id));
            }
            if desc.is_fat() != block.fat().is_some() {
                return Err(format!("{} descriptor disagrees with its kind", id));
            }

            let expected = if desc.is_root() {
                roots += 1;
                Chain::Side
            } else {
                Chain::Slot(block.header.e_slot)
            };
            if block.header.e_link.chain != Some(expected) {
                return Err(format!(
                    "{} expiration linkage {:?}, expected {:?}",
                    id, block.header.e_link.chain, expected
                ));
            }

            match block.fat() {
                Some(fat) => {
                    let expected = if desc.is_orphan() {
                        orphans += 1;
                        Chain::Side
                    } else {
                        Chain::Slot(fat.p_slot)
                    };
                    if fat.p_link.chain != Some(expected) {
                        return Err(format!(
                            "{} preservation linkage {:?}, expected {:?}",
                            id, fat.p_link.chain, expected
                        ));
                    }
                }
                None if desc.is_orphan() => {
                    return Err(format!("slim block {} is orphaned", id));
                }
                None => {}
            }
        }

        if total != self.used {
            return Err(format!("used is {} but live blocks sum to {}", self.used, total));
        }
        if roots != self.expiration.side_len() || orphans != self.preservation.side_len() {
            return Err(format!(
                "side lists hold {} roots / {} orphans, blocks report {} / {}",
                self.expiration.side_len(),
                self.preservation.side_len(),
                roots,
                orphans
            ));
        }
        Ok(())
    }
}

impl<H: Host> Drop for Pool<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<H: Host + std::fmt::Debug> std::fmt::Debug for Pool<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("host", &self.host)
            .field("clock", &self.clock)
            .field("used", &self.used)
            .field("quota", &self.config.quota)
            .field("live_blocks", &self.arena.len())
            .finish()
    }
}
