pub mod arena;
pub mod bplus;
pub mod btree;
pub mod config;
pub mod error;
pub mod event;
pub mod repl;
pub mod tree;

pub use arena::{NodeArena, NodeId};
pub use bplus::{BPlusNode, BPlusTree, InternalNode, LeafNode};
pub use btree::{BNode, BTree};
pub use config::{ConfigError, TreeConfig, Variant};
pub use error::{TreeError, TreeResult};
pub use event::{Event, EventKind, EventLog, Retention};
pub use tree::{KeyLocation, SearchTree, TreeKey, TreeStats};
