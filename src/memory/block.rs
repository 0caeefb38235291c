/*!
 * Block Model
 * Handles, descriptors and the per-block scheduling record
 */

use super::size::CompactSize;
use super::types::BlockKind;
use crate::core::limits::CYCLE_DETECT_INTERVAL;
use crate::core::types::Slot;
use crate::gc::wheel::Link;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a pooled block
///
/// Handles are generation-checked: once a block expires its handle stops
/// resolving, even if the arena slot is reused by a later allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId {
    index: u32,
    generation: u32,
}

impl BlockId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot of the block
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the arena slot when the block was allocated
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

const FAT_BIT: u16 = 1;
const ROOT_BIT: u16 = 1 << 1;
const ORPHAN_BIT: u16 = 1 << 2;
const FLAG_BITS: u32 = 3;

/// Packed block descriptor: 13-bit compact size above three flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Descriptor(u16);

impl Descriptor {
    pub fn new(size: CompactSize, fat: bool, root: bool) -> Self {
        let mut desc = Self(size.bits() << FLAG_BITS);
        desc.set(FAT_BIT, fat);
        desc.set(ROOT_BIT, root);
        desc
    }

    #[inline]
    fn set(&mut self, bit: u16, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    #[inline]
    pub fn size(self) -> CompactSize {
        // The shifted-out value always fits the 13-bit range
        CompactSize::from_bits(self.0 >> FLAG_BITS).unwrap_or(CompactSize::MAX)
    }

    #[inline]
    pub fn is_fat(self) -> bool {
        self.0 & FAT_BIT != 0
    }

    #[inline]
    pub fn is_root(self) -> bool {
        self.0 & ROOT_BIT != 0
    }

    #[inline]
    pub fn is_orphan(self) -> bool {
        self.0 & ORPHAN_BIT != 0
    }

    #[inline]
    pub fn set_root(&mut self, root: bool) {
        self.set(ROOT_BIT, root);
    }

    #[inline]
    pub fn set_orphan(&mut self, orphan: bool) {
        self.set(ORPHAN_BIT, orphan);
    }
}

/// State shared by every block kind
#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub desc: Descriptor,
    /// Expiration slot; meaningless while rooted
    pub e_slot: Slot,
    /// Membership in an expiration slot or the root list
    pub e_link: Link,
    /// Set while the host expire callback runs
    pub expiring: bool,
}

/// Extra scheduling state carried by fat blocks
#[derive(Debug, Clone)]
pub(crate) struct FatState {
    pub p_slot: Slot,
    /// Membership in a preservation slot or the orphan list
    pub p_link: Link,
    /// Preservation passes left before the next ownership-ring check
    pub countdown: u8,
    /// Non-owning back-reference; only walked, never kept alive
    pub owner: Option<BlockId>,
}

#[derive(Debug, Clone)]
pub(crate) enum Kind {
    Slim,
    Fat(FatState),
}

/// A pooled block: header, kind-specific state and the host payload
#[derive(Debug)]
pub(crate) struct Block<M> {
    pub header: Header,
    pub kind: Kind,
    pub memory: M,
}

impl<M> Block<M> {
    pub fn new(kind: BlockKind, size: CompactSize, root: bool, memory: M) -> Self {
        let state = match kind {
            BlockKind::Slim => Kind::Slim,
            BlockKind::Fat => Kind::Fat(FatState {
                p_slot: 0,
                p_link: Link::default(),
                countdown: CYCLE_DETECT_INTERVAL,
                owner: None,
            }),
        };

        Self {
            header: Header {
                desc: Descriptor::new(size, kind == BlockKind::Fat, root),
                e_slot: 0,
                e_link: Link::default(),
                expiring: false,
            },
            kind: state,
            memory,
        }
    }

    #[inline]
    pub fn kind(&self) -> BlockKind {
        match self.kind {
            Kind::Slim => BlockKind::Slim,
            Kind::Fat(_) => BlockKind::Fat,
        }
    }

    #[inline]
    pub fn fat(&self) -> Option<&FatState> {
        match &self.kind {
            Kind::Fat(fat) => Some(fat),
            Kind::Slim => None,
        }
    }

    #[inline]
    pub fn fat_mut(&mut self) -> Option<&mut FatState> {
        match &mut self.kind {
            Kind::Fat(fat) => Some(fat),
            Kind::Slim => None,
        }
    }

    /// Owner back-reference; slim blocks do not record one
    #[inline]
    pub fn owner(&self) -> Option<BlockId> {
        self.fat().and_then(|fat| fat.owner)
    }

    /// Bytes this block counts against the quota
    pub fn footprint(&self) -> usize {
        self.kind().header_size() + self.header.desc.size().decompress()
    }
}
