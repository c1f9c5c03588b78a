use thiserror::Error;

use super::{AttributeName, AttributeNameError, NodePath, NodePathError};

/// The path of a stored element: a dataset at a node, or an attribute of a node.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ElementPath {
    node: NodePath,
    attribute: Option<AttributeName>,
}

/// An invalid element path.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ElementPathError {
    /// An invalid node path.
    #[error(transparent)]
    NodePath(#[from] NodePathError),
    /// An invalid attribute name.
    #[error(transparent)]
    AttributeName(#[from] AttributeNameError),
}

impl ElementPath {
    /// The path of the dataset at `node`.
    #[must_use]
    pub fn dataset(node: NodePath) -> Self {
        Self {
            node,
            attribute: None,
        }
    }

    /// The path of the attribute `name` of `node`.
    #[must_use]
    pub fn attribute(node: NodePath, name: AttributeName) -> Self {
        Self {
            node,
            attribute: Some(name),
        }
    }

    /// Parse an element path of the form `/node` or `/node@attribute`.
    ///
    /// # Errors
    /// Returns [`ElementPathError`] if the node path or attribute name is invalid.
    pub fn new(path: &str) -> Result<Self, ElementPathError> {
        match path.split_once('@') {
            Some((node, name)) => Ok(Self::attribute(
                NodePath::new(node)?,
                AttributeName::new(name)?,
            )),
            None => Ok(Self::dataset(NodePath::new(path)?)),
        }
    }

    /// The node path.
    #[must_use]
    pub const fn node(&self) -> &NodePath {
        &self.node
    }

    /// The attribute name, or [`None`] for a dataset.
    #[must_use]
    pub const fn attribute_name(&self) -> Option<&AttributeName> {
        self.attribute.as_ref()
    }

    /// Returns true if the path addresses an attribute.
    #[must_use]
    pub const fn is_attribute(&self) -> bool {
        self.attribute.is_some()
    }
}

impl core::fmt::Display for ElementPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.attribute {
            Some(name) => write!(f, "{}@{name}", self.node),
            None => write!(f, "{}", self.node),
        }
    }
}

impl TryFrom<&str> for ElementPath {
    type Error = ElementPathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}
