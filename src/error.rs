use thiserror::Error;

use crate::arena::NodeId;

/// Errors that can occur during tree operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid {variant} configuration: {value} (must be >= {minimum})")]
    InvalidConfiguration {
        variant: &'static str,
        value: usize,
        minimum: usize,
    },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid tree state: {0}")]
    InvalidState(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TreeError::DuplicateKey("10".into()).to_string(),
            "Duplicate key: 10"
        );
        assert_eq!(
            TreeError::InvalidConfiguration {
                variant: "B+ tree order",
                value: 2,
                minimum: 3,
            }
            .to_string(),
            "Invalid B+ tree order configuration: 2 (must be >= 3)"
        );
    }
}
