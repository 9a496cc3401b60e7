//! B+ tree engine
//!
//! Only leaves hold real keys. Internal nodes hold separator copies, and the
//! leaves form a singly linked chain in key order. It supports:
//! - preemptive splitting on the way down during insert
//! - postemptive rebalancing (borrow or merge) after the recursive delete returns
//! - ordered traversal over the leaf chain
//!
//! Order `m` means:
//! - every node holds at most `m - 1` keys
//! - non-root nodes should hold at least `ceil(m/2) - 1` keys
//!
//! A full internal node has `m - 1` keys, so splitting it before an insert
//! leaves `m - 2` keys for the two halves. For odd orders the right half ends
//! up one key short of the floor, and for order 3 it is a single-child node
//! with no separator. Deletion repairs such nodes when it walks through them.

mod node;
#[cfg(test)]
mod tests;

pub use node::{BPlusNode, InternalNode, LeafNode};

use crate::arena::{NodeArena, NodeId};
use crate::error::{TreeError, TreeResult};
use crate::event::{EventKind, EventLog, Retention};
use crate::tree::{KeyLocation, SearchTree, TreeKey, TreeStats, bracketed};

/// Smallest order the structure supports
pub const MIN_ORDER: usize = 3;

/// Order used by the interactive session when none is given
pub const DEFAULT_ORDER: usize = 4;

/// Events kept by default
pub const DEFAULT_HISTORY: usize = 50;

#[derive(Debug)]
pub struct BPlusTree<K> {
    root: NodeId,

    /// Tree order (max children per internal node)
    order: usize,

    nodes: NodeArena<BPlusNode<K>>,

    /// First leaf node (start of the leaf chain)
    first_leaf: NodeId,

    events: EventLog,
}

impl<K: TreeKey> BPlusTree<K> {
    /// Create a new empty B+ tree keeping the latest 50 events
    ///
    /// # Arguments
    /// * `order` - The tree order (must be >= 3)
    pub fn new(order: usize) -> TreeResult<Self> {
        Self::with_retention(order, Retention::Latest(DEFAULT_HISTORY))
    }

    pub fn with_retention(order: usize, retention: Retention) -> TreeResult<Self> {
        if order < MIN_ORDER {
            return Err(TreeError::InvalidConfiguration {
                variant: "B+ tree order",
                value: order,
                minimum: MIN_ORDER,
            });
        }

        let mut nodes = NodeArena::new();
        let root = nodes.allocate(BPlusNode::Leaf(LeafNode::new()));

        Ok(Self {
            root,
            order,
            nodes,
            first_leaf: root,
            events: EventLog::new(retention),
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Maximum keys in any node
    pub fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Minimum keys in a non-root node
    pub fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn root_node_id(&self) -> NodeId {
        self.root
    }

    pub fn first_leaf_id(&self) -> NodeId {
        self.first_leaf
    }

    /// Get a reference to a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&BPlusNode<K>> {
        self.nodes.get(id).ok()
    }

    fn internal(&self, id: NodeId) -> TreeResult<&InternalNode<K>> {
        self.nodes
            .get(id)?
            .as_internal()
            .ok_or_else(|| TreeError::InvalidState(format!("node {id} is not an internal node")))
    }

    fn internal_mut(&mut self, id: NodeId) -> TreeResult<&mut InternalNode<K>> {
        self.nodes
            .get_mut(id)?
            .as_internal_mut()
            .ok_or_else(|| TreeError::InvalidState(format!("node {id} is not an internal node")))
    }

    fn leaf_mut(&mut self, id: NodeId) -> TreeResult<&mut LeafNode<K>> {
        self.nodes
            .get_mut(id)?
            .as_leaf_mut()
            .ok_or_else(|| TreeError::InvalidState(format!("node {id} is not a leaf")))
    }

    fn child_at(&self, parent_id: NodeId, index: usize) -> TreeResult<NodeId> {
        self.internal(parent_id)?
            .children
            .get(index)
            .copied()
            .ok_or_else(|| TreeError::InvalidState(format!("node {parent_id} has no child {index}")))
    }

    // ========== Search Operations ==========

    /// Locate the leaf slot holding `key`
    ///
    /// Internal nodes never answer a lookup: their keys are copies, so the
    /// descent always ends in a leaf.
    pub fn search(&self, key: &K) -> Option<KeyLocation> {
        let mut current = self.root;
        let mut path = Vec::new();

        loop {
            match self.nodes.get(current).ok()? {
                BPlusNode::Leaf(leaf) => {
                    return leaf.position(key).map(|index| KeyLocation {
                        node: current,
                        index,
                        path,
                    });
                }
                BPlusNode::Internal(node) => {
                    let child_idx = node.find_child_index(key);
                    path.push(child_idx);
                    current = *node.children.get(child_idx)?;
                }
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Search and report the outcome on the event stream
    pub fn find(&mut self, key: &K) -> TreeResult<KeyLocation> {
        match self.search(key) {
            Some(location) => {
                self.events.record(
                    EventKind::Info,
                    format!(
                        "found value {key} in a leaf at depth {}, position {}",
                        location.depth(),
                        location.index
                    ),
                );
                Ok(location)
            }
            None => {
                self.events
                    .record(EventKind::Error, format!("value {key} not found in the tree"));
                Err(TreeError::KeyNotFound(key.to_string()))
            }
        }
    }

    // ========== Insert Operations ==========

    /// Insert a key, splitting full nodes on the way down
    pub fn insert(&mut self, key: K) -> TreeResult<()> {
        if self.contains(&key) {
            self.events.record(
                EventKind::Error,
                format!("value {key} already exists in the tree"),
            );
            return Err(TreeError::DuplicateKey(key.to_string()));
        }

        self.events
            .record(EventKind::Insert, format!("inserting value {key}"));

        if self.nodes.get(self.root)?.len() == self.max_keys() {
            let old_root = self.root;
            self.root = self
                .nodes
                .allocate(BPlusNode::Internal(InternalNode::new(Vec::new(), vec![old_root])));
            self.events
                .record(EventKind::Info, "root is full, growing a new root");
            self.split_child(self.root, 0)?;
        }

        let path = self.insert_non_full(key)?;
        for &node_id in path.iter().rev() {
            self.repair_children(node_id)?;
        }
        self.collapse_root()
    }

    /// Descend from the root, splitting any full child before entering it.
    /// Returns the internal nodes visited, top down.
    fn insert_non_full(&mut self, key: K) -> TreeResult<Vec<NodeId>> {
        let mut current = self.root;
        let mut path = Vec::new();

        loop {
            let mut child_idx = match self.nodes.get(current)? {
                BPlusNode::Leaf(_) => break,
                BPlusNode::Internal(node) => node.find_child_index(&key),
            };

            let child_id = self.child_at(current, child_idx)?;
            if self.nodes.get(child_id)?.len() == self.max_keys() {
                self.split_child(current, child_idx)?;
                if key >= self.internal(current)?.keys[child_idx] {
                    child_idx += 1;
                }
            }

            path.push(current);
            current = self.child_at(current, child_idx)?;
        }

        let leaf = self.leaf_mut(current)?;
        leaf.insert(key.clone());
        let message = format!("inserted {key} into leaf {}", bracketed(&leaf.keys));
        self.events.record(EventKind::Insert, message);

        Ok(path)
    }

    /// Bring every child of `node_id` back to the key floor
    ///
    /// An internal split hands the right half one key under the floor for odd
    /// orders (no key at all for order 3). Borrowing or merging it before the
    /// insert returns keeps every non-root node within bounds, so a later
    /// delete never meets an underfull node off its own path.
    fn repair_children(&mut self, node_id: NodeId) -> TreeResult<()> {
        let min_keys = self.min_keys();
        let mut index = 0;

        while index < self.internal(node_id)?.children.len() {
            let child_id = self.child_at(node_id, index)?;
            let siblings = self.internal(node_id)?.children.len() > 1;
            if siblings && self.nodes.get(child_id)?.len() < min_keys {
                index = self.rebalance(node_id, index)?;
            }
            index += 1;
        }

        Ok(())
    }

    /// Split the full child at `index` of `parent_id`
    ///
    /// A leaf copies its new sibling's first key up as the separator and links
    /// the sibling into the chain. An internal node moves its median up.
    fn split_child(&mut self, parent_id: NodeId, index: usize) -> TreeResult<()> {
        let child_id = self.child_at(parent_id, index)?;
        let mid = self.order / 2;

        let (separator, sibling, message) = match self.nodes.get_mut(child_id)? {
            BPlusNode::Leaf(leaf) => {
                let right = leaf.split(mid);
                let separator = right.min_key().cloned().ok_or_else(|| {
                    TreeError::InvalidState("leaf split produced an empty sibling".to_string())
                })?;
                let message = format!(
                    "split leaf: {} -> {}",
                    bracketed(&leaf.keys),
                    bracketed(&right.keys)
                );
                (separator, BPlusNode::Leaf(right), message)
            }
            BPlusNode::Internal(node) => {
                let (separator, right) = node.split().ok_or_else(|| {
                    TreeError::InvalidState("cannot split an internal node without keys".to_string())
                })?;
                let message = format!("split internal node, key {separator} moves up");
                (separator, BPlusNode::Internal(right), message)
            }
        };

        let sibling_id = self.nodes.allocate(sibling);
        if let BPlusNode::Leaf(leaf) = self.nodes.get_mut(child_id)? {
            leaf.next = Some(sibling_id);
        }

        self.internal_mut(parent_id)?
            .insert_child(index, separator, sibling_id);
        self.events.record(EventKind::Split, message);

        Ok(())
    }

    // ========== Delete Operations ==========

    /// Delete a key, rebalancing underflowing nodes on the way back up
    pub fn delete(&mut self, key: &K) -> TreeResult<()> {
        if !self.contains(key) {
            self.events
                .record(EventKind::Error, format!("value {key} not found in the tree"));
            return Err(TreeError::KeyNotFound(key.to_string()));
        }

        self.events
            .record(EventKind::Delete, format!("deleting value {key}"));
        self.delete_from(self.root, key)?;
        self.collapse_root()
    }

    fn delete_from(&mut self, node_id: NodeId, key: &K) -> TreeResult<()> {
        let child_idx = match self.nodes.get_mut(node_id)? {
            BPlusNode::Leaf(leaf) => {
                if leaf.delete(key) {
                    let message = format!("removed {key} from leaf {}", bracketed(&leaf.keys));
                    self.events.record(EventKind::Delete, message);
                }
                return Ok(());
            }
            BPlusNode::Internal(node) => node.find_child_index(key),
        };

        let child_id = self.child_at(node_id, child_idx)?;
        self.delete_from(child_id, key)?;
        self.fix_child(node_id, child_idx)?;

        Ok(())
    }

    /// Bring the child at `index` back to the key floor, then refresh the
    /// separators around it. Returns the child's index after any merge.
    fn fix_child(&mut self, parent_id: NodeId, index: usize) -> TreeResult<usize> {
        let mut index = index;
        // Separators rotate or merge down below, so they must be current first
        self.refresh_separators(parent_id, index)?;

        let child_id = self.child_at(parent_id, index)?;
        let underflow = self.nodes.get(child_id)?.len() < self.min_keys();
        if underflow && self.internal(parent_id)?.children.len() > 1 {
            index = self.rebalance(parent_id, index)?;
        }

        self.refresh_separators(parent_id, index)?;
        Ok(index)
    }

    /// Resolve underflow of the child at `index`: borrow from the left sibling,
    /// else from the right sibling, else merge (with the left one when there is
    /// one). Returns the child's index afterwards.
    fn rebalance(&mut self, parent_id: NodeId, index: usize) -> TreeResult<usize> {
        let min_keys = self.min_keys();
        let (left, right) = {
            let parent = self.internal(parent_id)?;
            let left = index.checked_sub(1).map(|i| parent.children[i]);
            (left, parent.children.get(index + 1).copied())
        };

        if let Some(left_id) = left {
            if self.nodes.get(left_id)?.len() > min_keys {
                self.borrow_from_left(parent_id, index)?;
                return Ok(index);
            }
        }

        if let Some(right_id) = right {
            if self.nodes.get(right_id)?.len() > min_keys {
                self.borrow_from_right(parent_id, index)?;
                return Ok(index);
            }
        }

        if index > 0 {
            self.merge_children(parent_id, index - 1)?;
            Ok(index - 1)
        } else {
            self.merge_children(parent_id, index)?;
            Ok(index)
        }
    }

    fn borrow_from_left(&mut self, parent_id: NodeId, index: usize) -> TreeResult<()> {
        let (left_id, child_id) = {
            let parent = self.internal(parent_id)?;
            (parent.children[index - 1], parent.children[index])
        };

        // Leaves lend a key, internal nodes lend a key with its rightmost child
        let lent = match self.nodes.get_mut(left_id)? {
            BPlusNode::Leaf(left) => left.keys.pop().map(|key| (key, None)),
            BPlusNode::Internal(left) => left
                .keys
                .pop()
                .zip(left.children.pop())
                .map(|(key, grandchild)| (key, Some(grandchild))),
        };
        let (key, grandchild) = lent.ok_or_else(|| empty_sibling(left_id))?;

        let message = match grandchild {
            None => {
                self.leaf_mut(child_id)?.keys.insert(0, key.clone());
                self.internal_mut(parent_id)?.keys[index - 1] = key.clone();
                format!("leaf borrowed {key} from its left sibling")
            }
            Some(grandchild) => {
                let separator =
                    std::mem::replace(&mut self.internal_mut(parent_id)?.keys[index - 1], key);
                let child = self.internal_mut(child_id)?;
                child.keys.insert(0, separator.clone());
                child.children.insert(0, grandchild);
                format!(
                    "internal node borrowed from its left sibling, separator {separator} rotates down"
                )
            }
        };

        self.events.record(EventKind::Borrow, message);
        Ok(())
    }

    fn borrow_from_right(&mut self, parent_id: NodeId, index: usize) -> TreeResult<()> {
        let (child_id, right_id) = {
            let parent = self.internal(parent_id)?;
            (parent.children[index], parent.children[index + 1])
        };

        // The right sibling must keep a key behind to serve as the new separator
        let lent = match self.nodes.get_mut(right_id)? {
            BPlusNode::Leaf(right) if right.keys.len() >= 2 => {
                let key = right.keys.remove(0);
                Some((key, None, right.keys[0].clone()))
            }
            BPlusNode::Internal(right) if right.keys.len() >= 2 => {
                let key = right.keys.remove(0);
                let grandchild = right.children.remove(0);
                Some((key.clone(), Some(grandchild), key))
            }
            _ => None,
        };
        let (key, grandchild, new_separator) = lent.ok_or_else(|| empty_sibling(right_id))?;

        let separator =
            std::mem::replace(&mut self.internal_mut(parent_id)?.keys[index], new_separator);
        let message = match grandchild {
            None => {
                self.leaf_mut(child_id)?.keys.push(key.clone());
                format!("leaf borrowed {key} from its right sibling")
            }
            Some(grandchild) => {
                let child = self.internal_mut(child_id)?;
                child.keys.push(separator.clone());
                child.children.push(grandchild);
                format!(
                    "internal node borrowed from its right sibling, separator {separator} rotates down"
                )
            }
        };

        self.events.record(EventKind::Borrow, message);
        Ok(())
    }

    /// Merge the child at `index + 1` into the child at `index`
    ///
    /// Leaves drop the separator (their keys already hold it) and unlink the
    /// absorbed leaf from the chain; internal nodes pull the separator down.
    fn merge_children(&mut self, parent_id: NodeId, index: usize) -> TreeResult<()> {
        let (separator, left_id, right_id) = {
            let parent = self.internal_mut(parent_id)?;
            if index + 1 >= parent.children.len() {
                return Err(TreeError::InvalidState(format!(
                    "node {parent_id} has no sibling to merge at {index}"
                )));
            }
            let separator = parent.keys.remove(index);
            let right_id = parent.children.remove(index + 1);
            (separator, parent.children[index], right_id)
        };

        let right = self.nodes.release(right_id)?;
        let merged = match (self.nodes.get_mut(left_id)?, right) {
            (BPlusNode::Leaf(left), BPlusNode::Leaf(right)) => {
                left.keys.extend(right.keys);
                left.next = right.next;
                bracketed(&left.keys)
            }
            (BPlusNode::Internal(left), BPlusNode::Internal(right)) => {
                left.keys.push(separator);
                left.keys.extend(right.keys);
                left.children.extend(right.children);
                bracketed(&left.keys)
            }
            _ => {
                return Err(TreeError::InvalidState(format!(
                    "siblings {left_id} and {right_id} are at different levels"
                )));
            }
        };

        self.events
            .record(EventKind::Merge, format!("merged node {merged} with its sibling"));
        Ok(())
    }

    /// Reset the separators on both sides of the child at `index` to the
    /// smallest key of the subtree to their right
    fn refresh_separators(&mut self, parent_id: NodeId, index: usize) -> TreeResult<()> {
        for separator_idx in [index.checked_sub(1), Some(index)].into_iter().flatten() {
            let Some(&right_id) = self.internal(parent_id)?.children.get(separator_idx + 1) else {
                continue;
            };
            if let Some(min_key) = self.leftmost_key(right_id)? {
                self.internal_mut(parent_id)?.keys[separator_idx] = min_key;
            }
        }
        Ok(())
    }

    fn leftmost_key(&self, node_id: NodeId) -> TreeResult<Option<K>> {
        let mut current = node_id;
        loop {
            match self.nodes.get(current)? {
                BPlusNode::Leaf(leaf) => return Ok(leaf.min_key().cloned()),
                BPlusNode::Internal(node) => {
                    current = *node.children.first().ok_or_else(|| {
                        TreeError::InvalidState(format!("internal node {current} has no children"))
                    })?;
                }
            }
        }
    }

    /// Replace a key-less internal root by its only child
    ///
    /// The child came out of a merge, so it holds at least one key and the
    /// tree loses exactly one level.
    fn collapse_root(&mut self) -> TreeResult<()> {
        let only_child = match self.nodes.get(self.root)? {
            BPlusNode::Internal(root) if root.keys.is_empty() => root.children.first().copied(),
            _ => None,
        };
        if let Some(child) = only_child {
            self.nodes.release(self.root)?;
            self.root = child;
            self.events
                .record(EventKind::Info, "root became empty, tree height shrinks");
        }
        Ok(())
    }

    // ========== Session Operations ==========

    /// Drop every node and start over with an empty leaf root
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.root = self.nodes.allocate(BPlusNode::Leaf(LeafNode::new()));
        self.first_leaf = self.root;
        self.events.record(EventKind::Info, "tree reset");
    }

    // ========== Traversal & Metrics ==========

    /// Levels from root to leaf (1 for a single leaf)
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.root;

        while let Some(BPlusNode::Internal(node)) = self.get_node(current) {
            match node.children.first() {
                Some(&child_id) => {
                    current = child_id;
                    height += 1;
                }
                None => break,
            }
        }

        height
    }

    pub fn node_count(&self) -> usize {
        self.count(self.root, |_| 1)
    }

    /// Keys stored across all nodes, separators included
    pub fn element_count(&self) -> usize {
        self.count(self.root, |node| node.len())
    }

    fn count(&self, node_id: NodeId, weight: fn(&BPlusNode<K>) -> usize) -> usize {
        match self.get_node(node_id) {
            None => 0,
            Some(node) => {
                let below = node
                    .as_internal()
                    .map(|n| n.children.iter().map(|&c| self.count(c, weight)).sum())
                    .unwrap_or(0);
                weight(node) + below
            }
        }
    }

    /// Iterate over all keys in order by walking the leaf chain
    pub fn iter(&self) -> LeafChainIter<'_, K> {
        LeafChainIter::new(self)
    }

    /// Every stored key in ascending order, read from the leaf chain
    pub fn ordered_sequence(&self) -> Vec<K> {
        self.iter().cloned().collect()
    }

    /// Keys of every node, level by level
    pub fn levels(&self) -> TreeResult<Vec<Vec<Vec<K>>>> {
        let mut levels = Vec::new();
        let mut frontier = vec![self.root];

        while !frontier.is_empty() {
            let mut level = Vec::with_capacity(frontier.len());
            let mut next = Vec::new();
            for id in frontier {
                let node = self.nodes.get(id)?;
                level.push(node.keys().to_vec());
                if let BPlusNode::Internal(internal) = node {
                    next.extend(internal.children.iter().copied());
                }
            }
            levels.push(level);
            frontier = next;
        }

        Ok(levels)
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            variant: "B+ tree",
            fanout: self.order,
            height: self.height(),
            node_count: self.node_count(),
            element_count: self.element_count(),
            min_keys: self.min_keys(),
            max_keys: self.max_keys(),
            leaf_values: Some(self.iter().count()),
        }
    }

    /// Insert 10, 20, ..., 120 into a fresh tree with a fresh history
    pub fn load_sample(&mut self) -> TreeResult<()>
    where
        K: From<u8>,
    {
        self.reset();
        self.events.clear();
        self.events
            .record(EventKind::Info, "loading sample data");
        for value in (10u8..=120).step_by(10) {
            self.insert(K::from(value))?;
        }
        self.events
            .record(EventKind::Info, "sample data loaded");
        Ok(())
    }

    // ========== Validation ==========

    /// Check every structural invariant, reporting the first violation
    pub fn validate(&self) -> TreeResult<()> {
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        let reachable = self.validate_node(self.root, 0, None, None, &mut leaf_depth, &mut leaves)?;

        if reachable != self.nodes.len() {
            return Err(TreeError::InvalidState(format!(
                "{} nodes stored but {reachable} reachable",
                self.nodes.len()
            )));
        }

        if leaves.first() != Some(&self.first_leaf) {
            return Err(TreeError::InvalidState(
                "first leaf does not start the chain".to_string(),
            ));
        }

        let mut chain = Vec::new();
        let mut current = Some(self.first_leaf);
        while let Some(id) = current {
            if chain.len() > leaves.len() {
                return Err(TreeError::InvalidState("leaf chain has a cycle".to_string()));
            }
            chain.push(id);
            current = self
                .nodes
                .get(id)?
                .as_leaf()
                .ok_or_else(|| TreeError::InvalidState(format!("chain reaches non-leaf {id}")))?
                .next;
        }
        if chain != leaves {
            return Err(TreeError::InvalidState(
                "leaf chain does not follow key order".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the number of nodes in the subtree
    fn validate_node(
        &self,
        node_id: NodeId,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<NodeId>,
    ) -> TreeResult<usize> {
        let node = self.nodes.get(node_id)?;
        let keys = node.keys();
        let is_root = node_id == self.root;
        let invalid = |reason: String| Err(TreeError::InvalidState(format!("node {node_id}: {reason}")));

        if keys.len() > self.max_keys() {
            return invalid(format!("{} keys exceed the maximum {}", keys.len(), self.max_keys()));
        }
        if !keys.windows(2).all(|w| w[0] < w[1]) {
            return invalid("keys are not strictly ascending".to_string());
        }
        if let (Some(lower), Some(first)) = (lower, keys.first()) {
            if first < lower {
                return invalid(format!("key {first} below separator {lower}"));
            }
        }
        if let (Some(upper), Some(last)) = (upper, keys.last()) {
            if last >= upper {
                return invalid(format!("key {last} not below separator {upper}"));
            }
        }

        match node {
            BPlusNode::Leaf(_) => {
                if !is_root && keys.len() < self.min_keys() {
                    return invalid(format!("leaf holds {} keys, minimum is {}", keys.len(), self.min_keys()));
                }
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return invalid(format!("leaf at depth {depth}, expected {expected}"));
                    }
                    Some(_) => {}
                }
                leaves.push(node_id);
                Ok(1)
            }
            BPlusNode::Internal(internal) => {
                if internal.children.len() != keys.len() + 1 {
                    return invalid(format!(
                        "{} keys but {} children",
                        keys.len(),
                        internal.children.len()
                    ));
                }
                if is_root && keys.is_empty() {
                    return invalid("internal root without keys".to_string());
                }
                if !is_root && keys.len() < self.min_keys() {
                    return invalid(format!(
                        "internal node holds {} keys, minimum is {}",
                        keys.len(),
                        self.min_keys()
                    ));
                }

                let mut count = 1;
                for (i, &child) in internal.children.iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { keys.get(i - 1) };
                    let child_upper = keys.get(i).or(upper);
                    count += self.validate_node(child, depth + 1, child_lower, child_upper, leaf_depth, leaves)?;

                    if i > 0 {
                        if let Some(min_key) = self.leftmost_key(child)? {
                            if min_key != keys[i - 1] {
                                return invalid(format!(
                                    "separator {} differs from the smallest key {min_key} on its right",
                                    keys[i - 1]
                                ));
                            }
                        }
                    }
                }
                Ok(count)
            }
        }
    }
}

/// Ordered walk over the leaf chain
pub struct LeafChainIter<'a, K> {
    tree: &'a BPlusTree<K>,
    current_leaf: Option<NodeId>,
    current_idx: usize,
}

impl<'a, K: TreeKey> LeafChainIter<'a, K> {
    fn new(tree: &'a BPlusTree<K>) -> Self {
        Self {
            tree,
            current_leaf: Some(tree.first_leaf),
            current_idx: 0,
        }
    }
}

impl<'a, K: TreeKey> Iterator for LeafChainIter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf_id = self.current_leaf?;
            let leaf = self.tree.get_node(leaf_id)?.as_leaf()?;

            if let Some(key) = leaf.keys.get(self.current_idx) {
                self.current_idx += 1;
                return Some(key);
            }

            // Move to next leaf
            self.current_leaf = leaf.next;
            self.current_idx = 0;
        }
    }
}

fn empty_sibling(id: NodeId) -> TreeError {
    TreeError::InvalidState(format!("sibling {id} has no key to lend"))
}

impl<K: TreeKey> SearchTree<K> for BPlusTree<K> {
    fn insert(&mut self, key: K) -> TreeResult<()> {
        BPlusTree::insert(self, key)
    }

    fn delete(&mut self, key: &K) -> TreeResult<()> {
        BPlusTree::delete(self, key)
    }

    fn search(&self, key: &K) -> Option<KeyLocation> {
        BPlusTree::search(self, key)
    }

    fn find(&mut self, key: &K) -> TreeResult<KeyLocation> {
        BPlusTree::find(self, key)
    }

    fn reset(&mut self) {
        BPlusTree::reset(self)
    }

    fn height(&self) -> usize {
        BPlusTree::height(self)
    }

    fn node_count(&self) -> usize {
        BPlusTree::node_count(self)
    }

    fn element_count(&self) -> usize {
        BPlusTree::element_count(self)
    }

    fn ordered_keys(&self) -> TreeResult<Vec<K>> {
        Ok(self.ordered_sequence())
    }

    fn levels(&self) -> TreeResult<Vec<Vec<Vec<K>>>> {
        BPlusTree::levels(self)
    }

    fn stats(&self) -> TreeStats {
        BPlusTree::stats(self)
    }

    fn events(&self) -> &EventLog {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }

    fn validate(&self) -> TreeResult<()> {
        BPlusTree::validate(self)
    }
}
