//! Attributes.
//!
//! An attribute is a small stored element attached to the node of a [`Dataset`](crate::dataset::Dataset).
//! Its type is commonly unknown until it is read, so besides the statically typed operations of [`ElementHandle`] it is usually read with [`read_dynamic`](ElementHandle::read_dynamic).

use derive_more::Deref;

use crate::{dataset::ElementHandle, node::AttributeName, storage::ReadableStorageTraits};

/// An attribute.
#[derive(Debug, Deref)]
pub struct Attribute<TStorage: ?Sized + ReadableStorageTraits> {
    handle: ElementHandle<TStorage>,
}

impl<TStorage: ?Sized + ReadableStorageTraits> Attribute<TStorage> {
    pub(crate) fn new(handle: ElementHandle<TStorage>) -> Self {
        Self { handle }
    }

    /// The attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.handle
            .path()
            .attribute_name()
            .map(AttributeName::as_str)
            .unwrap_or_default()
    }
}
