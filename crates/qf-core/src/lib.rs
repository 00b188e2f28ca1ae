//! Shared primitives used across QuietFeed crates.

use thiserror::Error;

/// Result alias used across the workspace.
pub type QfResult<T> = Result<T, QfError>;

/// Workspace error: a stable dotted code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct QfError {
    pub code: &'static str,
    pub message: String,
}

impl QfError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QfError;

    #[test]
    fn display_includes_code_and_message() {
        let error = QfError::new("dom.node_missing", "node 7 does not exist");
        assert_eq!(error.to_string(), "dom.node_missing: node 7 does not exist");
    }
}
