/*!
 * Block Arena
 * Generational slot storage for pooled blocks
 */

use super::block::{Block, BlockId};

#[derive(Debug)]
struct Entry<M> {
    generation: u32,
    block: Option<Block<M>>,
}

/// Arena of blocks addressed by generation-checked handles
///
/// Vacated slots are recycled LIFO; each reuse bumps the slot generation so
/// handles to the previous occupant stop resolving.
#[derive(Debug)]
pub(crate) struct Arena<M> {
    entries: Vec<Entry<M>>,
    free: Vec<u32>,
    live: usize,
}

impl<M> Arena<M> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, block: Block<M>) -> BlockId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            debug_assert!(entry.block.is_none());
            entry.generation = entry.generation.wrapping_add(1);
            entry.block = Some(block);
            return BlockId::new(index, entry.generation);
        }

        let index = u32::try_from(self.entries.len()).unwrap_or_else(|_| {
            panic!("block arena exhausted its {} slot index space", u32::MAX)
        });
        self.entries.push(Entry {
            generation: 0,
            block: Some(block),
        });
        BlockId::new(index, 0)
    }

    pub fn remove(&mut self, id: BlockId) -> Option<Block<M>> {
        let entry = self.entries.get_mut(id.index() as usize)?;
        if entry.generation != id.generation() {
            return None;
        }
        let block = entry.block.take()?;
        self.free.push(id.index());
        self.live -= 1;
        Some(block)
    }

    pub fn get(&self, id: BlockId) -> Option<&Block<M>> {
        self.entries
            .get(id.index() as usize)
            .filter(|entry| entry.generation == id.generation())
            .and_then(|entry| entry.block.as_ref())
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block<M>> {
        self.entries
            .get_mut(id.index() as usize)
            .filter(|entry| entry.generation == id.generation())
            .and_then(|entry| entry.block.as_mut())
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.get(id).is_some()
    }

    /// Block at a linked index; list linkage only ever names live slots
    pub fn at(&self, index: u32) -> &Block<M> {
        match self.entries.get(index as usize).and_then(|e| e.block.as_ref()) {
            Some(block) => block,
            None => panic!("list linkage names vacant arena slot {}", index),
        }
    }

    pub fn at_mut(&mut self, index: u32) -> &mut Block<M> {
        match self
            .entries
            .get_mut(index as usize)
            .and_then(|e| e.block.as_mut())
        {
            Some(block) => block,
            None => panic!("list linkage names vacant arena slot {}", index),
        }
    }

    /// Current handle for a live index
    pub fn id_at(&self, index: u32) -> BlockId {
        BlockId::new(index, self.entries[index as usize].generation)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.block.is_some())
            .map(|(index, entry)| BlockId::new(index as u32, entry.generation))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block<M>> + '_ {
        self.entries.iter().filter_map(|entry| entry.block.as_ref())
    }
}

impl<M> Default for Arena<M> {
    fn default() -> Self {
        Self::new()
    }
}
