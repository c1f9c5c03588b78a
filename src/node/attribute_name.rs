use derive_more::Display;
use thiserror::Error;

/// The name of an attribute attached to a node.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display("{_0}")]
pub struct AttributeName(String);

/// An invalid attribute name.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid attribute name {0:?}")]
pub struct AttributeNameError(String);

impl AttributeName {
    /// Create a new attribute name from `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeNameError`] if `name` is not valid according to [`AttributeName::validate`()].
    pub fn new(name: &str) -> Result<Self, AttributeNameError> {
        if Self::validate(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(AttributeNameError(name.to_string()))
        }
    }

    /// Extracts a string slice containing the attribute name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates an attribute name: it must not be empty and must not contain `/` or `@`.
    #[must_use]
    pub fn validate(name: &str) -> bool {
        !name.is_empty() && !name.contains(['/', '@'])
    }
}

impl TryFrom<&str> for AttributeName {
    type Error = AttributeNameError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}
