//! Single-owner node storage shared by both tree engines.
//!
//! Nodes refer to each other by [`NodeId`] (an index into the arena) instead of
//! pointers, so a node is owned by exactly one arena slot and the B+ tree leaf
//! chain never creates a second owner.

use crate::error::{TreeError, TreeResult};

/// Node identifier (index into node storage)
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct NodeArena<N> {
    slots: Vec<Option<N>>,
    /// Released slots, reused before the arena grows
    free_list: Vec<NodeId>,
    live: usize,
}

impl<N> NodeArena<N> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Store a node, returning its ID
    pub fn allocate(&mut self, node: N) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free_list.pop() {
            self.slots[id] = Some(node);
            id
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        }
    }

    pub fn get(&self, id: NodeId) -> TreeResult<&N> {
        self.slots
            .get(id)
            .and_then(|slot| slot.as_ref())
            .ok_or(TreeError::NodeNotFound(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> TreeResult<&mut N> {
        self.slots
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or(TreeError::NodeNotFound(id))
    }

    /// Take a node out of the arena, handing its ownership to the caller.
    /// The slot goes onto the free list.
    pub fn release(&mut self, id: NodeId) -> TreeResult<N> {
        let node = self
            .slots
            .get_mut(id)
            .and_then(Option::take)
            .ok_or(TreeError::NodeNotFound(id))?;
        self.free_list.push(id);
        self.live -= 1;
        Ok(node)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.live = 0;
    }
}

impl<N> Default for NodeArena<N> {
    fn default() -> Self {
        Self::new()
    }
}
