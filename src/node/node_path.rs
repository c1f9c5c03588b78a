use derive_more::Display;
use thiserror::Error;

/// A node path in a storage hierarchy.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display("{_0}")]
pub struct NodePath(String);

/// An invalid node path.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid node path {0}")]
pub struct NodePathError(String);

impl NodePath {
    /// Create a new node path from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NodePathError`] if `path` is not valid according to [`NodePath::validate`()].
    pub fn new(path: &str) -> Result<Self, NodePathError> {
        if Self::validate(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(NodePathError(path.to_string()))
        }
    }

    /// Extracts a string slice containing the node path `String`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a path:
    /// - a path always starts with `/`,
    /// - a non-root path cannot end with `/`,
    /// - a path has no empty nodes (i.e. a `//` substring), and
    /// - a path cannot contain `@`, which separates an attribute name in an [`ElementPath`](super::ElementPath).
    #[must_use]
    pub fn validate(path: &str) -> bool {
        path.eq("/")
            || (path.starts_with('/')
                && !path.ends_with('/')
                && !path.contains("//")
                && !path.contains('@'))
    }
}

impl TryFrom<&str> for NodePath {
    type Error = NodePathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}
