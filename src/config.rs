//! Tree configuration loaded from JSON or assembled from the command line.

use std::fs;
use std::io;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bplus::{self, BPlusTree};
use crate::btree::{self, BTree};
use crate::error::{TreeError, TreeResult};
use crate::event::Retention;
use crate::tree::TreeKey;

/// Which engine a session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Classic B-tree over letters, fanout is the minimum degree
    #[value(name = "btree")]
    BTree,
    /// B+ tree over non-negative integers, fanout is the order
    #[value(name = "bplus")]
    BPlus,
}

impl Variant {
    pub fn default_fanout(self) -> usize {
        match self {
            Variant::BTree => btree::DEFAULT_MIN_DEGREE,
            Variant::BPlus => bplus::DEFAULT_ORDER,
        }
    }

    pub fn min_fanout(self) -> usize {
        match self {
            Variant::BTree => btree::MIN_DEGREE,
            Variant::BPlus => bplus::MIN_ORDER,
        }
    }

    pub fn default_retention(self) -> Retention {
        match self {
            Variant::BTree => Retention::Unbounded,
            Variant::BPlus => Retention::Latest(bplus::DEFAULT_HISTORY),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Variant::BTree => "B-tree minimum degree",
            Variant::BPlus => "B+ tree order",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TreeConfig {
    pub variant: Variant,
    /// Minimum degree (B-tree) or order (B+ tree)
    pub fanout: usize,
    /// Event history policy, the variant default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<Retention>,
}

impl TreeConfig {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            fanout: variant.default_fanout(),
            retention: None,
        }
    }

    /// Switch to another variant. The fanout falls back to that variant's
    /// default; an explicit retention carries over.
    pub fn with_variant(mut self, variant: Variant) -> Self {
        if variant != self.variant {
            self.variant = variant;
            self.fanout = variant.default_fanout();
        }
        self
    }

    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: TreeConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TreeResult<()> {
        let minimum = self.variant.min_fanout();
        if self.fanout < minimum {
            return Err(TreeError::InvalidConfiguration {
                variant: self.variant.label(),
                value: self.fanout,
                minimum,
            });
        }
        Ok(())
    }

    pub fn retention(&self) -> Retention {
        self.retention
            .unwrap_or_else(|| self.variant.default_retention())
    }

    pub fn build_btree<K: TreeKey>(&self) -> TreeResult<BTree<K>> {
        BTree::with_retention(self.fanout, self.retention())
    }

    pub fn build_bplus<K: TreeKey>(&self) -> TreeResult<BPlusTree<K>> {
        BPlusTree::with_retention(self.fanout, self.retention())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new(Variant::BPlus)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_variant_defaults() {
        let btree = TreeConfig::new(Variant::BTree);
        assert_eq!(btree.fanout, 3);
        assert_eq!(btree.retention(), Retention::Unbounded);

        let bplus = TreeConfig::default();
        assert_eq!(bplus.variant, Variant::BPlus);
        assert_eq!(bplus.fanout, 4);
        assert_eq!(bplus.retention(), Retention::Latest(50));
    }

    #[test]
    fn test_switching_variant_keeps_retention() {
        let file = write_config(r#"{ "variant": "b_plus", "fanout": 7, "retention": "unbounded" }"#);
        let config = TreeConfig::from_json_file(file.path())
            .unwrap()
            .with_variant(Variant::BTree);

        assert_eq!(config.variant, Variant::BTree);
        assert_eq!(config.fanout, 3);
        assert_eq!(config.retention, Some(Retention::Unbounded));

        let same = TreeConfig::new(Variant::BPlus)
            .with_fanout(6)
            .with_variant(Variant::BPlus);
        assert_eq!(same.fanout, 6);
    }

    #[test]
    fn test_load_from_json() {
        let file = write_config(r#"{ "variant": "b_plus", "fanout": 5, "retention": { "latest": 10 } }"#);
        let config = TreeConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.variant, Variant::BPlus);
        assert_eq!(config.fanout, 5);
        assert_eq!(config.retention(), Retention::Latest(10));

        let tree = config.build_bplus::<i64>().unwrap();
        assert_eq!(tree.order(), 5);
        assert_eq!(tree.events().retention(), Retention::Latest(10));
    }

    #[test]
    fn test_retention_defaults_when_omitted() {
        let file = write_config(r#"{ "variant": "b_tree", "fanout": 2 }"#);
        let config = TreeConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.retention, None);
        assert_eq!(config.retention(), Retention::Unbounded);
        assert_eq!(config.build_btree::<char>().unwrap().min_degree(), 2);
    }

    #[test]
    fn test_unbounded_retention_in_json() {
        let file = write_config(r#"{ "variant": "b_plus", "fanout": 4, "retention": "unbounded" }"#);
        let config = TreeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.retention(), Retention::Unbounded);
    }

    #[test]
    fn test_rejects_small_fanout() {
        let file = write_config(r#"{ "variant": "b_plus", "fanout": 2 }"#);
        match TreeConfig::from_json_file(file.path()) {
            Err(ConfigError::Tree(TreeError::InvalidConfiguration { value, minimum, .. })) => {
                assert_eq!(value, 2);
                assert_eq!(minimum, 3);
            }
            other => panic!("expected a configuration error, got {other:?}"),
        }

        assert!(TreeConfig::new(Variant::BTree).with_fanout(1).validate().is_err());
    }

    #[test]
    fn test_malformed_and_missing_files() {
        let file = write_config("{ not json");
        assert!(matches!(
            TreeConfig::from_json_file(file.path()),
            Err(ConfigError::Parse(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TreeConfig::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = TreeConfig::new(Variant::BTree)
            .with_fanout(4)
            .with_retention(Retention::Latest(20));
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<TreeConfig>(&text).unwrap(), config);
    }
}
