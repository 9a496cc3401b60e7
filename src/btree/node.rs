use crate::arena::NodeId;

/// Node of a classic B-tree
///
/// Every key is real data, at any level. Whether a node is a leaf is fixed
/// when it is created: splits and merges build or absorb nodes of the same
/// kind and never flip it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BNode<K> {
    pub keys: Vec<K>,
    /// Child node IDs, `keys.len() + 1` of them for internal nodes
    pub children: Vec<NodeId>,
    leaf: bool,
}

impl<K: Ord> BNode<K> {
    pub fn leaf(keys: Vec<K>) -> Self {
        Self {
            keys,
            children: Vec::new(),
            leaf: true,
        }
    }

    pub fn internal(keys: Vec<K>, children: Vec<NodeId>) -> Self {
        Self {
            keys,
            children,
            leaf: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the first key not less than `key`: the slot holding it if
    /// present, otherwise the child to descend into
    pub fn lower_bound(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Position of `key` in this node, if it is stored here
    pub fn position(&self, key: &K) -> Option<usize> {
        let idx = self.lower_bound(key);
        (self.keys.get(idx) == Some(key)).then_some(idx)
    }

    /// Split a full node around its median at `mid`
    ///
    /// Keys after the median and the children to their right move into the
    /// returned sibling; the median itself is handed back for the parent.
    pub fn split(&mut self, mid: usize) -> Option<(K, BNode<K>)> {
        if mid >= self.keys.len() {
            return None;
        }

        let right_keys = self.keys.split_off(mid + 1);
        let median = self.keys.pop()?;
        let right_children = if self.leaf {
            Vec::new()
        } else {
            self.children.split_off(mid + 1)
        };

        Some((
            median,
            BNode {
                keys: right_keys,
                children: right_children,
                leaf: self.leaf,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_flag_fixed_at_creation() {
        let leaf = BNode::leaf(vec!['A']);
        let internal = BNode::internal(vec!['M'], vec![0, 1]);

        assert!(leaf.is_leaf());
        assert!(!internal.is_leaf());
        assert!(leaf.children.is_empty());
    }

    #[test]
    fn test_lower_bound_and_position() {
        let node = BNode::leaf(vec!['G', 'M', 'P', 'X']);

        assert_eq!(node.lower_bound(&'A'), 0);
        assert_eq!(node.lower_bound(&'M'), 1);
        assert_eq!(node.lower_bound(&'O'), 2);
        assert_eq!(node.lower_bound(&'Z'), 4);

        assert_eq!(node.position(&'P'), Some(2));
        assert_eq!(node.position(&'O'), None);
    }

    #[test]
    fn test_split_leaf() {
        let mut node = BNode::leaf(vec!['A', 'B', 'C', 'D', 'E']);
        let (median, right) = node.split(2).unwrap();

        assert_eq!(median, 'C');
        assert_eq!(node.keys, vec!['A', 'B']);
        assert_eq!(right.keys, vec!['D', 'E']);
        assert!(right.is_leaf());
    }

    #[test]
    fn test_split_internal_moves_children() {
        let mut node = BNode::internal(vec![10, 20, 30], vec![0, 1, 2, 3]);
        let (median, right) = node.split(1).unwrap();

        assert_eq!(median, 20);
        assert_eq!(node.keys, vec![10]);
        assert_eq!(node.children, vec![0, 1]);
        assert_eq!(right.keys, vec![30]);
        assert_eq!(right.children, vec![2, 3]);
        assert!(!right.is_leaf());
    }

    #[test]
    fn test_split_out_of_range() {
        let mut node = BNode::leaf(vec![1]);
        assert!(node.split(1).is_none());
        assert_eq!(node.keys, vec![1]);
    }
}
