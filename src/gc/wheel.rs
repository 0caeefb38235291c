/*!
 * Scheduling Wheels
 * Index-linked intrusive lists over the block arena
 *
 * Each block embeds a [`Link`] per lane recording which list it is in and
 * its neighbours by arena index, so membership changes are O(1) without
 * self-referential pointers. A lane has 256 slot lists plus one side list:
 * roots for the expiration lane, orphans for the preservation lane.
 */

use crate::core::limits::NUM_SLOTS;
use crate::core::types::Slot;
use crate::memory::arena::Arena;
use crate::memory::block::Block;
use std::marker::PhantomData;

/// A list within a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Chain {
    Slot(Slot),
    Side,
}

/// Intrusive list membership
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Link {
    pub chain: Option<Chain>,
    pub prev: Option<u32>,
    pub next: Option<u32>,
}

impl Link {
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.chain.is_some()
    }
}

/// Selects which embedded link a list operates on
pub(crate) trait Lane {
    const NAME: &'static str;

    fn link<M>(block: &Block<M>) -> &Link;
    fn link_mut<M>(block: &mut Block<M>) -> &mut Link;
}

/// Expiration slots and the root list
#[derive(Debug)]
pub(crate) struct Expiration;

/// Preservation slots and the orphan list; fat blocks only
#[derive(Debug)]
pub(crate) struct Preservation;

impl Lane for Expiration {
    const NAME: &'static str = "expiration";

    #[inline]
    fn link<M>(block: &Block<M>) -> &Link {
        &block.header.e_link
    }

    #[inline]
    fn link_mut<M>(block: &mut Block<M>) -> &mut Link {
        &mut block.header.e_link
    }
}

impl Lane for Preservation {
    const NAME: &'static str = "preservation";

    #[inline]
    fn link<M>(block: &Block<M>) -> &Link {
        match block.fat() {
            Some(fat) => &fat.p_link,
            None => panic!("slim block has no preservation linkage"),
        }
    }

    #[inline]
    fn link_mut<M>(block: &mut Block<M>) -> &mut Link {
        match block.fat_mut() {
            Some(fat) => &mut fat.p_link,
            None => panic!("slim block has no preservation linkage"),
        }
    }
}

/// List heads for one lane
#[derive(Debug)]
pub(crate) struct Wheel<L> {
    slots: Box<[Option<u32>; NUM_SLOTS]>,
    side: Option<u32>,
    side_len: usize,
    _lane: PhantomData<L>,
}

impl<L: Lane> Wheel<L> {
    pub fn new() -> Self {
        Self {
            slots: Box::new([None; NUM_SLOTS]),
            side: None,
            side_len: 0,
            _lane: PhantomData,
        }
    }

    #[inline]
    pub fn head(&self, chain: Chain) -> Option<u32> {
        match chain {
            Chain::Slot(slot) => self.slots[slot as usize],
            Chain::Side => self.side,
        }
    }

    #[inline]
    fn head_mut(&mut self, chain: Chain) -> &mut Option<u32> {
        match chain {
            Chain::Slot(slot) => &mut self.slots[slot as usize],
            Chain::Side => &mut self.side,
        }
    }

    /// Link `index` at the front of `chain`
    pub fn push<M>(&mut self, arena: &mut Arena<M>, index: u32, chain: Chain) {
        let old_head = self.head(chain);
        {
            let link = L::link_mut(arena.at_mut(index));
            assert!(
                !link.is_linked(),
                "block {} is already in the {} lane",
                index,
                L::NAME
            );
            *link = Link {
                chain: Some(chain),
                prev: None,
                next: old_head,
            };
        }
        if let Some(next) = old_head {
            L::link_mut(arena.at_mut(next)).prev = Some(index);
        }
        *self.head_mut(chain) = Some(index);
        if chain == Chain::Side {
            self.side_len += 1;
        }
    }

    /// Remove `index` from whichever list of this lane holds it
    pub fn unlink<M>(&mut self, arena: &mut Arena<M>, index: u32) {
        let link = *L::link(arena.at(index));
        let chain = match link.chain {
            Some(chain) => chain,
            None => panic!("block {} is not in the {} lane", index, L::NAME),
        };

        match link.prev {
            Some(prev) => L::link_mut(arena.at_mut(prev)).next = link.next,
            None => {
                let head = self.head_mut(chain);
                assert_eq!(*head, Some(index), "{} list head out of sync", L::NAME);
                *head = link.next;
            }
        }
        if let Some(next) = link.next {
            L::link_mut(arena.at_mut(next)).prev = link.prev;
        }

        *L::link_mut(arena.at_mut(index)) = Link::default();
        if chain == Chain::Side {
            self.side_len -= 1;
        }
    }

    /// Members of the side list
    pub fn side_len(&self) -> usize {
        self.side_len
    }

    /// Indices in `chain`, front to back
    pub fn members<M>(&self, arena: &Arena<M>, chain: Chain) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cursor = self.head(chain);
        while let Some(index) = cursor {
            out.push(index);
            cursor = L::link(arena.at(index)).next;
        }
        out
    }

    /// Whether every slot list and the side list are empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.side.is_none() && self.slots.iter().all(Option::is_none)
    }
}

impl<L: Lane> Default for Wheel<L> {
    fn default() -> Self {
        Self::new()
    }
}
