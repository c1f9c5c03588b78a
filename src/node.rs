//! Paths of stored elements.
//!
//! A stored element is either a dataset at a [`NodePath`], or an attribute with an [`AttributeName`] attached to a node.
//! An [`ElementPath`] addresses either, and is displayed as `/group/dataset` or `/group/dataset@attribute`.

mod attribute_name;
mod element_path;
mod node_path;

pub use attribute_name::{AttributeName, AttributeNameError};
pub use element_path::{ElementPath, ElementPathError};
pub use node_path::{NodePath, NodePathError};
