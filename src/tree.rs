//! Surface shared by both engines.

use std::fmt::{Debug, Display};

use serde::Serialize;

use crate::arena::NodeId;
use crate::error::TreeResult;
use crate::event::EventLog;

/// Keys a tree can hold: totally ordered scalars that can be rendered in events
pub trait TreeKey: Ord + Clone + Debug + Display {}

impl<T: Ord + Clone + Debug + Display> TreeKey for T {}

/// Where a search found its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocation {
    /// Node holding the key
    pub node: NodeId,
    /// Position of the key inside the node
    pub index: usize,
    /// Child indices followed from the root to reach `node`
    pub path: Vec<usize>,
}

impl KeyLocation {
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub variant: &'static str,
    /// Minimum degree for the B-tree, order for the B+ tree
    pub fanout: usize,
    pub height: usize,
    pub node_count: usize,
    pub element_count: usize,
    pub min_keys: usize,
    pub max_keys: usize,
    /// Length of the leaf chain walk (B+ tree only)
    pub leaf_values: Option<usize>,
}

/// Operations a presentation layer drives, implemented by both engines
pub trait SearchTree<K: TreeKey> {
    fn insert(&mut self, key: K) -> TreeResult<()>;

    fn delete(&mut self, key: &K) -> TreeResult<()>;

    /// Read-only lookup
    fn search(&self, key: &K) -> Option<KeyLocation>;

    /// Lookup that reports its outcome on the event stream
    fn find(&mut self, key: &K) -> TreeResult<KeyLocation>;

    /// Drop every key, keeping the configuration and the history
    fn reset(&mut self);

    fn height(&self) -> usize;

    fn node_count(&self) -> usize;

    fn element_count(&self) -> usize;

    /// All keys in ascending order
    fn ordered_keys(&self) -> TreeResult<Vec<K>>;

    /// Keys of every node, level by level, left to right
    fn levels(&self) -> TreeResult<Vec<Vec<Vec<K>>>>;

    fn stats(&self) -> TreeStats;

    fn events(&self) -> &EventLog;

    /// Lets a front end log its own rejections (bad input) next to the tree's
    fn events_mut(&mut self) -> &mut EventLog;

    fn validate(&self) -> TreeResult<()>;
}

/// Renders keys as `[a, b, c]` for event messages
pub(crate) fn bracketed<K: Display>(keys: &[K]) -> String {
    let inner: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    format!("[{}]", inner.join(", "))
}
