use crate::arena::NodeId;

/// Internal node: separator keys and child pointers
///
/// In this B+ tree variant:
/// - children.len() == keys.len() + 1
/// - keys[i] is a copy of the smallest key in the subtree rooted at children[i + 1]
/// - a key equal to keys[i] is routed to children[i + 1]
#[derive(Debug, Clone)]
pub struct InternalNode<K> {
    pub keys: Vec<K>,
    pub children: Vec<NodeId>,
}

impl<K: Ord> InternalNode<K> {
    pub fn new(keys: Vec<K>, children: Vec<NodeId>) -> Self {
        debug_assert_eq!(keys.len() + 1, children.len());
        Self { keys, children }
    }

    /// Number of separator keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Find the child index for a given key
    /// Returns the number of separators <= key
    pub fn find_child_index(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// Insert a separator and the child to its right
    /// Used after the child at `index` was split
    pub fn insert_child(&mut self, index: usize, key: K, right: NodeId) {
        self.keys.insert(index, key);
        self.children.insert(index + 1, right);
    }

    /// Split around the median separator
    ///
    /// The median is removed and returned for the parent; keys and children to
    /// its right move into the new sibling.
    pub fn split(&mut self) -> Option<(K, InternalNode<K>)> {
        let mid = self.keys.len() / 2;

        let right_keys = self.keys.split_off(mid + 1);
        let right_children = self.children.split_off(mid + 1);
        let separator = self.keys.pop()?;

        Some((separator, InternalNode::new(right_keys, right_children)))
    }
}

/// Leaf node: sorted keys, linked to the next leaf
#[derive(Debug, Clone)]
pub struct LeafNode<K> {
    pub keys: Vec<K>,
    /// Link to the next leaf in key order
    pub next: Option<NodeId>,
}

impl<K: Ord> LeafNode<K> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            next: None,
        }
    }

    pub fn with_keys(keys: Vec<K>) -> Self {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        Self { keys, next: None }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Position of `key` in this leaf
    pub fn position(&self, key: &K) -> Option<usize> {
        self.keys.binary_search(key).ok()
    }

    /// Insert a key in sorted order
    /// Returns false if the key was already present
    pub fn insert(&mut self, key: K) -> bool {
        match self.keys.binary_search(&key) {
            Ok(_) => false,
            Err(pos) => {
                self.keys.insert(pos, key);
                true
            }
        }
    }

    /// Returns true if the key was found and deleted
    pub fn delete(&mut self, key: &K) -> bool {
        match self.keys.binary_search(key) {
            Ok(pos) => {
                self.keys.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn min_key(&self) -> Option<&K> {
        self.keys.first()
    }

    /// Split this leaf, returning the new right sibling
    /// This node keeps keys[..mid]; the sibling takes over this node's `next`
    pub fn split(&mut self, mid: usize) -> LeafNode<K> {
        let right_keys = self.keys.split_off(mid);

        let mut right = LeafNode::with_keys(right_keys);
        right.next = self.next.take();

        right
    }
}

impl<K: Ord> Default for LeafNode<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// B+ tree node (either internal or leaf)
#[derive(Debug, Clone)]
pub enum BPlusNode<K> {
    Internal(InternalNode<K>),
    Leaf(LeafNode<K>),
}

impl<K: Ord> BPlusNode<K> {
    pub fn is_leaf(&self) -> bool {
        matches!(self, BPlusNode::Leaf(_))
    }

    pub fn keys(&self) -> &[K] {
        match self {
            BPlusNode::Internal(node) => &node.keys,
            BPlusNode::Leaf(node) => &node.keys,
        }
    }

    /// Number of keys held by the node
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    pub fn as_internal(&self) -> Option<&InternalNode<K>> {
        match self {
            BPlusNode::Internal(node) => Some(node),
            BPlusNode::Leaf(_) => None,
        }
    }

    pub fn as_internal_mut(&mut self) -> Option<&mut InternalNode<K>> {
        match self {
            BPlusNode::Internal(node) => Some(node),
            BPlusNode::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode<K>> {
        match self {
            BPlusNode::Internal(_) => None,
            BPlusNode::Leaf(node) => Some(node),
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafNode<K>> {
        match self {
            BPlusNode::Internal(_) => None,
            BPlusNode::Leaf(node) => Some(node),
        }
    }
}
