//! Classic B-tree engine
//!
//! Keys live at every level. Minimum degree `t` bounds every node to at most
//! `2t - 1` keys and every non-root node to at least `t - 1`.
//!
//! Insert splits full nodes on the way down. Delete fills a minimal child
//! before descending into it (borrow from a sibling, else merge), so the
//! recursive call always lands in a node that can afford to lose a key.

mod node;

pub use node::BNode;

use crate::arena::{NodeArena, NodeId};
use crate::error::{TreeError, TreeResult};
use crate::event::{EventKind, EventLog, Retention};
use crate::tree::{KeyLocation, SearchTree, TreeKey, TreeStats, bracketed};

/// Smallest minimum degree the structure supports
pub const MIN_DEGREE: usize = 2;

/// Minimum degree of the sample tree and of a default session
pub const DEFAULT_MIN_DEGREE: usize = 3;

#[derive(Debug)]
pub struct BTree<K> {
    root: NodeId,
    min_degree: usize,
    nodes: NodeArena<BNode<K>>,
    events: EventLog,
}

impl<K: TreeKey> BTree<K> {
    /// Create an empty B-tree with an unbounded event history
    pub fn new(min_degree: usize) -> TreeResult<Self> {
        Self::with_retention(min_degree, Retention::Unbounded)
    }

    pub fn with_retention(min_degree: usize, retention: Retention) -> TreeResult<Self> {
        if min_degree < MIN_DEGREE {
            return Err(TreeError::InvalidConfiguration {
                variant: "B-tree minimum degree",
                value: min_degree,
                minimum: MIN_DEGREE,
            });
        }

        let mut nodes = NodeArena::new();
        let root = nodes.allocate(BNode::leaf(Vec::new()));

        Ok(Self {
            root,
            min_degree,
            nodes,
            events: EventLog::new(retention),
        })
    }

    pub fn min_degree(&self) -> usize {
        self.min_degree
    }

    pub fn max_keys(&self) -> usize {
        2 * self.min_degree - 1
    }

    pub fn min_keys(&self) -> usize {
        self.min_degree - 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.get(self.root).map(BNode::is_empty).unwrap_or(true)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn root_node_id(&self) -> NodeId {
        self.root
    }

    pub fn get_node(&self, id: NodeId) -> Option<&BNode<K>> {
        self.nodes.get(id).ok()
    }

    fn child_at(&self, parent_id: NodeId, index: usize) -> TreeResult<NodeId> {
        self.nodes
            .get(parent_id)?
            .children
            .get(index)
            .copied()
            .ok_or_else(|| TreeError::InvalidState(format!("node {parent_id} has no child {index}")))
    }

    fn key_at(&self, node_id: NodeId, index: usize) -> TreeResult<K> {
        self.nodes
            .get(node_id)?
            .keys
            .get(index)
            .cloned()
            .ok_or_else(|| TreeError::InvalidState(format!("node {node_id} has no key {index}")))
    }

    // ========== Search ==========

    pub fn search(&self, key: &K) -> Option<KeyLocation> {
        let mut current = self.root;
        let mut path = Vec::new();

        loop {
            let node = self.nodes.get(current).ok()?;
            let idx = node.lower_bound(key);

            if node.keys.get(idx) == Some(key) {
                return Some(KeyLocation {
                    node: current,
                    index: idx,
                    path,
                });
            }
            if node.is_leaf() {
                return None;
            }

            path.push(idx);
            current = *node.children.get(idx)?;
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
                        "found '{key}' at depth {}, position {}",
                        location.depth(),
                        location.index
                    ),
                );
                Ok(location)
            }
            None => {
                self.events
                    .record(EventKind::Error, format!("key '{key}' not found in the tree"));
                Err(TreeError::KeyNotFound(key.to_string()))
            }
        }
    }

    // ========== Insert ==========

    pub fn insert(&mut self, key: K) -> TreeResult<()> {
        if self.contains(&key) {
            self.events
                .record(EventKind::Error, format!("key '{key}' already exists in the tree"));
            return Err(TreeError::DuplicateKey(key.to_string()));
        }

        self.events
            .record(EventKind::Insert, format!("inserting '{key}'"));

        let root = self.nodes.get(self.root)?;
        if root.len() == self.max_keys() {
            let message = format!("root {} is full, growing a new root", bracketed(&root.keys));
            self.events.record(EventKind::Info, message);

            let old_root = self.root;
            self.root = self
                .nodes
                .allocate(BNode::internal(Vec::new(), vec![old_root]));
            self.split_child(self.root, 0)?;
        }

        self.insert_non_full(key)
    }

    fn insert_non_full(&mut self, key: K) -> TreeResult<()> {
        let mut current = self.root;

        loop {
            let node = self.nodes.get(current)?;
            if node.is_leaf() {
                break;
            }

            let mut idx = node.lower_bound(&key);
            let message = format!("descending to child {idx} of node {}", bracketed(&node.keys));
            self.events.record(EventKind::Info, message);

            let child = self.nodes.get(self.child_at(current, idx)?)?;
            if child.len() == self.max_keys() {
                let message = format!("child {} is full, splitting", bracketed(&child.keys));
                self.events.record(EventKind::Info, message);

                self.split_child(current, idx)?;
                if key > self.key_at(current, idx)? {
                    idx += 1;
                }
            }

            current = self.child_at(current, idx)?;
        }

        let leaf = self.nodes.get_mut(current)?;
        let idx = leaf.lower_bound(&key);
        leaf.keys.insert(idx, key.clone());
        let message = format!("inserted '{key}' into leaf {}", bracketed(&leaf.keys));
        self.events.record(EventKind::Insert, message);

        Ok(())
    }

    /// Split the full child at `index`, moving its median into the parent
    fn split_child(&mut self, parent_id: NodeId, index: usize) -> TreeResult<()> {
        let child_id = self.child_at(parent_id, index)?;
        let mid = self.min_degree - 1;

        let child = self.nodes.get_mut(child_id)?;
        let before = bracketed(&child.keys);
        let (median, sibling) = child.split(mid).ok_or_else(|| {
            TreeError::InvalidState(format!("node {child_id} is too small to split"))
        })?;
        let left = bracketed(&child.keys);
        let right = bracketed(&sibling.keys);

        self.events.record(
            EventKind::Split,
            format!("splitting node {before}, median '{median}'"),
        );

        let sibling_id = self.nodes.allocate(sibling);
        let parent = self.nodes.get_mut(parent_id)?;
        parent.keys.insert(index, median);
        parent.children.insert(index + 1, sibling_id);
        let message = format!(
            "after split: parent {}, left {left}, right {right}",
            bracketed(&parent.keys)
        );
        self.events.record(EventKind::Info, message);

        Ok(())
    }

    // ========== Delete ==========

    pub fn delete(&mut self, key: &K) -> TreeResult<()> {
        if !self.contains(key) {
            self.events
                .record(EventKind::Error, format!("key '{key}' not found in the tree"));
            return Err(TreeError::KeyNotFound(key.to_string()));
        }

        self.events
            .record(EventKind::Delete, format!("deleting '{key}'"));
        self.delete_from(self.root, key)?;

        let root = self.nodes.get(self.root)?;
        if root.is_empty() && !root.is_leaf() {
            let child = self.child_at(self.root, 0)?;
            self.nodes.release(self.root)?;
            self.root = child;
            self.events
                .record(EventKind::Info, "root became empty, tree height shrinks");
        }

        Ok(())
    }

    fn delete_from(&mut self, node_id: NodeId, key: &K) -> TreeResult<()> {
        let node = self.nodes.get_mut(node_id)?;
        let idx = node.lower_bound(key);

        if node.keys.get(idx) == Some(key) {
            if node.is_leaf() {
                node.keys.remove(idx);
                let message = format!("removed '{key}' from leaf {}", bracketed(&node.keys));
                self.events.record(EventKind::Delete, message);
                return Ok(());
            }
            return self.delete_internal(node_id, idx, key);
        }

        if node.is_leaf() {
            return Err(TreeError::KeyNotFound(key.to_string()));
        }

        let mut child_idx = idx;
        if self.nodes.get(self.child_at(node_id, child_idx)?)?.len() <= self.min_keys() {
            child_idx = self.fill_child(node_id, child_idx)?;
        }

        self.delete_from(self.child_at(node_id, child_idx)?, key)
    }

    /// Delete the key at `idx` of an internal node
    fn delete_internal(&mut self, node_id: NodeId, idx: usize, key: &K) -> TreeResult<()> {
        let left_id = self.child_at(node_id, idx)?;
        let right_id = self.child_at(node_id, idx + 1)?;

        if self.nodes.get(left_id)?.len() >= self.min_degree {
            let predecessor = self.predecessor(left_id)?;
            self.events.record(
                EventKind::Info,
                format!("replacing '{key}' with its predecessor '{predecessor}'"),
            );
            self.nodes.get_mut(node_id)?.keys[idx] = predecessor.clone();
            self.delete_from(left_id, &predecessor)
        } else if self.nodes.get(right_id)?.len() >= self.min_degree {
            let successor = self.successor(right_id)?;
            self.events.record(
                EventKind::Info,
                format!("replacing '{key}' with its successor '{successor}'"),
            );
            self.nodes.get_mut(node_id)?.keys[idx] = successor.clone();
            self.delete_from(right_id, &successor)
        } else {
            // Both children are minimal: pull the key down between them
            self.merge_children(node_id, idx)?;
            self.delete_from(left_id, key)
        }
    }

    /// Bring the minimal child at `idx` above the minimum before descending.
    /// Returns where the child sits afterwards: one slot left when it was
    /// merged into its left sibling.
    fn fill_child(&mut self, parent_id: NodeId, idx: usize) -> TreeResult<usize> {
        let min_keys = self.min_keys();
        let parent = self.nodes.get(parent_id)?;
        let left = idx.checked_sub(1).map(|i| parent.children[i]);
        let right = parent.children.get(idx + 1).copied();

        if let Some(left_id) = left {
            if self.nodes.get(left_id)?.len() > min_keys {
                self.borrow_from_left(parent_id, idx)?;
                return Ok(idx);
            }
        }

        if let Some(right_id) = right {
            if self.nodes.get(right_id)?.len() > min_keys {
                self.borrow_from_right(parent_id, idx)?;
                return Ok(idx);
            }
        }

        if idx > 0 {
            self.merge_children(parent_id, idx - 1)?;
            Ok(idx - 1)
        } else {
            self.merge_children(parent_id, idx)?;
            Ok(idx)
        }
    }

    /// Rotate through the parent: the separator drops into the child and the
    /// left sibling's last key replaces it
    fn borrow_from_left(&mut self, parent_id: NodeId, idx: usize) -> TreeResult<()> {
        let left_id = self.child_at(parent_id, idx - 1)?;
        let child_id = self.child_at(parent_id, idx)?;

        let left = self.nodes.get_mut(left_id)?;
        let key = left
            .keys
            .pop()
            .ok_or_else(|| TreeError::InvalidState(format!("left sibling {left_id} is empty")))?;
        let grandchild = if left.is_leaf() { None } else { left.children.pop() };

        let separator = std::mem::replace(&mut self.nodes.get_mut(parent_id)?.keys[idx - 1], key);
        let child = self.nodes.get_mut(child_id)?;
        child.keys.insert(0, separator);
        if let Some(grandchild) = grandchild {
            child.children.insert(0, grandchild);
        }

        self.events
            .record(EventKind::Borrow, "borrowed a key from the left sibling");
        Ok(())
    }

    fn borrow_from_right(&mut self, parent_id: NodeId, idx: usize) -> TreeResult<()> {
        let child_id = self.child_at(parent_id, idx)?;
        let right_id = self.child_at(parent_id, idx + 1)?;

        let right = self.nodes.get_mut(right_id)?;
        if right.is_empty() {
            return Err(TreeError::InvalidState(format!("right sibling {right_id} is empty")));
        }
        let key = right.keys.remove(0);
        let grandchild = (!right.is_leaf() && !right.children.is_empty()).then(|| right.children.remove(0));

        let separator = std::mem::replace(&mut self.nodes.get_mut(parent_id)?.keys[idx], key);
        let child = self.nodes.get_mut(child_id)?;
        child.keys.push(separator);
        if let Some(grandchild) = grandchild {
            child.children.push(grandchild);
        }

        self.events
            .record(EventKind::Borrow, "borrowed a key from the right sibling");
        Ok(())
    }

    /// Merge the child at `idx + 1` and the separator at `idx` into the child at `idx`
    fn merge_children(&mut self, parent_id: NodeId, idx: usize) -> TreeResult<()> {
        let parent = self.nodes.get_mut(parent_id)?;
        if idx + 1 >= parent.children.len() {
            return Err(TreeError::InvalidState(format!(
                "node {parent_id} has no sibling to merge at {idx}"
            )));
        }
        let separator = parent.keys.remove(idx);
        let right_id = parent.children.remove(idx + 1);
        let left_id = parent.children[idx];

        let right = self.nodes.release(right_id)?;
        let left = self.nodes.get_mut(left_id)?;
        left.keys.push(separator);
        left.keys.extend(right.keys);
        left.children.extend(right.children);

        let message = format!("merged node {} with its sibling", bracketed(&left.keys));
        self.events.record(EventKind::Merge, message);
        Ok(())
    }

    /// Largest key in the subtree rooted at `node_id`
    fn predecessor(&self, node_id: NodeId) -> TreeResult<K> {
        let mut current = self.nodes.get(node_id)?;
        while !current.is_leaf() {
            let last = current.children.last().copied().ok_or_else(|| {
                TreeError::InvalidState("internal node without children".to_string())
            })?;
            current = self.nodes.get(last)?;
        }
        current
            .keys
            .last()
            .cloned()
            .ok_or_else(|| TreeError::InvalidState("empty leaf has no predecessor".to_string()))
    }

    /// Smallest key in the subtree rooted at `node_id`
    fn successor(&self, node_id: NodeId) -> TreeResult<K> {
        let mut current = self.nodes.get(node_id)?;
        while !current.is_leaf() {
            let first = current.children.first().copied().ok_or_else(|| {
                TreeError::InvalidState("internal node without children".to_string())
            })?;
            current = self.nodes.get(first)?;
        }
        current
            .keys
            .first()
            .cloned()
            .ok_or_else(|| TreeError::InvalidState("empty leaf has no successor".to_string()))
    }

    // ========== Session ==========

    pub fn reset(&mut self) {
        self.nodes.clear();
        self.root = self.nodes.allocate(BNode::leaf(Vec::new()));
        self.events.record(EventKind::Info, "tree reset");
    }

    // ========== Traversal & Metrics ==========

    /// Levels from root to leaf (1 for a single leaf)
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut current = self.get_node(self.root);

        while let Some(node) = current.filter(|n| !n.is_leaf()) {
            current = node.children.first().and_then(|&id| self.get_node(id));
            height += 1;
        }

        height
    }

    pub fn node_count(&self) -> usize {
        self.weighted_count(|_| 1)
    }

    pub fn element_count(&self) -> usize {
        self.weighted_count(BNode::len)
    }

    fn weighted_count(&self, weight: fn(&BNode<K>) -> usize) -> usize {
        let mut total = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get_node(id) {
                total += weight(node);
                stack.extend(node.children.iter().copied());
            }
        }
        total
    }

    /// In-order traversal of every key
    pub fn keys(&self) -> TreeResult<Vec<K>> {
        let mut out = Vec::new();
        self.collect_keys(self.root, &mut out)?;
        Ok(out)
    }

    fn collect_keys(&self, node_id: NodeId, out: &mut Vec<K>) -> TreeResult<()> {
        let node = self.nodes.get(node_id)?;
        if node.is_leaf() {
            out.extend(node.keys.iter().cloned());
            return Ok(());
        }

        for (i, &child) in node.children.iter().enumerate() {
            self.collect_keys(child, out)?;
            if let Some(key) = node.keys.get(i) {
                out.push(key.clone());
            }
        }
        Ok(())
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
                level.push(node.keys.clone());
                next.extend(node.children.iter().copied());
            }
            levels.push(level);
            frontier = next;
        }

        Ok(levels)
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            variant: "B-tree",
            fanout: self.min_degree,
            height: self.height(),
            node_count: self.node_count(),
            element_count: self.element_count(),
            min_keys: self.min_keys(),
            max_keys: self.max_keys(),
            leaf_values: None,
        }
    }

    // ========== Validation ==========

    pub fn validate(&self) -> TreeResult<()> {
        let mut leaf_depth = None;
        let reachable = self.validate_node(self.root, 0, None, None, &mut leaf_depth)?;

        if reachable != self.nodes.len() {
            return Err(TreeError::InvalidState(format!(
                "{} nodes stored but {reachable} reachable",
                self.nodes.len()
            )));
        }
        Ok(())
    }

    fn validate_node(
        &self,
        node_id: NodeId,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
        leaf_depth: &mut Option<usize>,
    ) -> TreeResult<usize> {
        let node = self.nodes.get(node_id)?;
        let keys = &node.keys;
        let invalid = |reason: String| Err(TreeError::InvalidState(format!("node {node_id}: {reason}")));

        if keys.len() > self.max_keys() {
            return invalid(format!("{} keys exceed the maximum {}", keys.len(), self.max_keys()));
        }
        if node_id != self.root && keys.len() < self.min_keys() {
            return invalid(format!("{} keys, minimum is {}", keys.len(), self.min_keys()));
        }
        if !keys.windows(2).all(|w| w[0] < w[1]) {
            return invalid("keys are not strictly ascending".to_string());
        }
        if let (Some(lower), Some(first)) = (lower, keys.first()) {
            if first <= lower {
                return invalid(format!("key {first} not above {lower}"));
            }
        }
        if let (Some(upper), Some(last)) = (upper, keys.last()) {
            if last >= upper {
                return invalid(format!("key {last} not below {upper}"));
            }
        }

        if node.is_leaf() {
            if !node.children.is_empty() {
                return invalid("leaf with children".to_string());
            }
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return invalid(format!("leaf at depth {depth}, expected {expected}"));
                }
                Some(_) => {}
            }
            return Ok(1);
        }

        if node.children.len() != keys.len() + 1 {
            return invalid(format!("{} keys but {} children", keys.len(), node.children.len()));
        }

        let mut count = 1;
        for (i, &child) in node.children.iter().enumerate() {
            let child_lower = if i == 0 { lower } else { keys.get(i - 1) };
            let child_upper = keys.get(i).or(upper);
            count += self.validate_node(child, depth + 1, child_lower, child_upper, leaf_depth)?;
        }
        Ok(count)
    }
}

impl BTree<char> {
    /// The textbook tree of minimum degree 3 with root `[G, M, P, X]`
    pub fn sample() -> Self {
        let mut tree = Self {
            root: 0,
            min_degree: DEFAULT_MIN_DEGREE,
            nodes: NodeArena::new(),
            events: EventLog::new(Retention::Unbounded),
        };
        tree.load_sample();
        tree
    }

    /// Replace the contents with the sample tree, switching to minimum degree 3.
    /// The history starts over.
    pub fn load_sample(&mut self) {
        self.nodes.clear();
        self.events.clear();
        self.min_degree = DEFAULT_MIN_DEGREE;

        let leaves = [
            vec!['A', 'C', 'D', 'E'],
            vec!['J', 'K'],
            vec!['N', 'O'],
            vec!['R', 'S', 'T', 'U', 'V'],
            vec!['Y', 'Z'],
        ];
        let children = leaves
            .into_iter()
            .map(|keys| self.nodes.allocate(BNode::leaf(keys)))
            .collect();
        self.root = self
            .nodes
            .allocate(BNode::internal(vec!['G', 'M', 'P', 'X'], children));

        self.events.record(EventKind::Info, "initial tree loaded");
    }
}

impl<K: TreeKey> SearchTree<K> for BTree<K> {
    fn insert(&mut self, key: K) -> TreeResult<()> {
        BTree::insert(self, key)
    }

    fn delete(&mut self, key: &K) -> TreeResult<()> {
        BTree::delete(self, key)
    }

    fn search(&self, key: &K) -> Option<KeyLocation> {
        BTree::search(self, key)
    }

    fn find(&mut self, key: &K) -> TreeResult<KeyLocation> {
        BTree::find(self, key)
    }

    fn reset(&mut self) {
        BTree::reset(self)
    }

    fn height(&self) -> usize {
        BTree::height(self)
    }

    fn node_count(&self) -> usize {
        BTree::node_count(self)
    }

    fn element_count(&self) -> usize {
        BTree::element_count(self)
    }

    fn ordered_keys(&self) -> TreeResult<Vec<K>> {
        self.keys()
    }

    fn levels(&self) -> TreeResult<Vec<Vec<Vec<K>>>> {
        BTree::levels(self)
    }

    fn stats(&self) -> TreeStats {
        BTree::stats(self)
    }

    fn events(&self) -> &EventLog {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }

    fn validate(&self) -> TreeResult<()> {
        BTree::validate(self)
    }
}
