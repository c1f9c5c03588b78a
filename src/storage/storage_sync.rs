use crate::{
    datatype::Datatype,
    node::{AttributeName, ElementPath, NodePath},
    physical::{PhysicalBuffer, PhysicalBytes},
};

use super::{ElementEvent, ElementInfo, StorageError};

/// Readable storage traits.
pub trait ReadableStorageTraits: Send + Sync {
    /// Return the declared datatype and shape of the element at `path`.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] if the element does not exist, or another [`StorageError`] if there is an underlying storage error.
    fn element_info(&self, path: &ElementPath) -> Result<ElementInfo, StorageError>;

    /// Read the entire element at `path` into `buffer` in a single transfer.
    ///
    /// `datatype` is the in-memory datatype of `buffer` and must match the stored datatype.
    /// Variable-length payloads referenced by the element are placed in the heap of `buffer`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the element does not exist, `datatype` or the buffer size does not match, or there is an underlying storage error.
    fn bulk_read(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        buffer: &mut PhysicalBuffer,
    ) -> Result<(), StorageError>;

    /// Return the names of the attributes attached to `node`, in name order.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn list_attributes(&self, node: &NodePath) -> Result<Vec<AttributeName>, StorageError>;

    /// Notify the storage of a lifecycle `event` of a handle to the element at `path`.
    ///
    /// The default implementation does nothing.
    fn notify(&self, path: &ElementPath, event: ElementEvent) {
        let _ = (path, event);
    }
}

/// Writable storage traits.
pub trait WritableStorageTraits: Send + Sync {
    /// Create a zero-initialised element at `path` with a declared `datatype` and `shape`.
    ///
    /// # Errors
    /// Returns [`StorageError::AlreadyExists`] if the element exists, or another [`StorageError`] if there is an underlying storage error.
    fn create_element(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        shape: &[u64],
    ) -> Result<(), StorageError>;

    /// Write the entire element at `path` from `bytes` in a single transfer.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the element does not exist, `datatype` or the buffer size does not match, or there is an underlying storage error.
    fn bulk_write(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        bytes: &PhysicalBytes,
    ) -> Result<(), StorageError>;

    /// Erase the element at `path`.
    ///
    /// Erasing a dataset also erases the attributes attached to its node.
    /// Returns true if the element existed.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase_element(&self, path: &ElementPath) -> Result<bool, StorageError>;
}

/// A supertrait of [`ReadableStorageTraits`] and [`WritableStorageTraits`].
pub trait ReadableWritableStorageTraits: ReadableStorageTraits + WritableStorageTraits {}

impl<T> ReadableWritableStorageTraits for T where T: ReadableStorageTraits + WritableStorageTraits {}

/// Check if an element exists.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying storage error.
pub fn element_exists<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &ElementPath,
) -> Result<bool, StorageError> {
    match storage.element_info(path) {
        Ok(_) => Ok(true),
        Err(StorageError::NotFound(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Erase the dataset at `node` and every attribute attached to it.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying storage error.
pub fn erase_node<TStorage: ?Sized + ReadableWritableStorageTraits>(
    storage: &TStorage,
    node: &NodePath,
) -> Result<(), StorageError> {
    for name in storage.list_attributes(node)? {
        storage.erase_element(&ElementPath::attribute(node.clone(), name))?;
    }
    storage.erase_element(&ElementPath::dataset(node.clone()))?;
    Ok(())
}
