//! Datasets.
//!
//! A dataset is a stored element at a node, with a fixed [`Datatype`] and shape declared when it is created.
//! Attributes of arbitrary, only known at read time type can be attached to the node of a dataset.
//!
//! Use [`Dataset::create`] to write a new dataset from a [`Container`], or [`Dataset::open`] to read an existing one.
//! A [`Dataset`] dereferences to an [`ElementHandle`], which carries the read and write operations.

mod element_handle;

use std::{collections::BTreeMap, sync::Arc};

use derive_more::Deref;
use thiserror::Error;

use crate::{
    attribute::Attribute,
    container::{Container, MarshalError},
    datatype::Datatype,
    dynamic::DynamicValue,
    element::Element,
    node::{
        AttributeName, AttributeNameError, ElementPath, ElementPathError, NodePath,
        NodePathError,
    },
    storage::{ReadableStorageTraits, ReadableWritableStorageTraits, StorageError},
};

pub use element_handle::ElementHandle;

/// A dataset or attribute creation error.
#[derive(Debug, Error)]
pub enum ElementCreateError {
    /// An invalid element path.
    #[error(transparent)]
    InvalidPath(#[from] ElementPathError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A marshaling error.
    #[error(transparent)]
    MarshalError(#[from] MarshalError),
}

impl From<NodePathError> for ElementCreateError {
    fn from(err: NodePathError) -> Self {
        Self::InvalidPath(err.into())
    }
}

impl From<AttributeNameError> for ElementCreateError {
    fn from(err: AttributeNameError) -> Self {
        Self::InvalidPath(err.into())
    }
}

/// A dataset.
#[derive(Debug, Deref)]
pub struct Dataset<TStorage: ?Sized + ReadableStorageTraits> {
    handle: ElementHandle<TStorage>,
}

impl<TStorage: ?Sized + ReadableStorageTraits> Dataset<TStorage> {
    /// Open the existing dataset at `path`.
    ///
    /// # Errors
    /// Returns [`ElementCreateError`] if `path` is invalid or the dataset does not exist.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, ElementCreateError> {
        let path = ElementPath::dataset(NodePath::new(path)?);
        Ok(Self {
            handle: ElementHandle::open(storage, path)?,
        })
    }

    /// The node path.
    #[must_use]
    pub const fn node_path(&self) -> &NodePath {
        self.handle.path().node()
    }

    /// Return the names of the attributes attached to the dataset, in name order.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    pub fn attribute_names(&self) -> Result<Vec<AttributeName>, StorageError> {
        self.handle.storage().list_attributes(self.node_path())
    }

    /// Open the existing attribute `name`.
    ///
    /// # Errors
    /// Returns [`ElementCreateError`] if `name` is invalid or the attribute does not exist.
    pub fn open_attribute(&self, name: &str) -> Result<Attribute<TStorage>, ElementCreateError> {
        let path = self.attribute_path(name)?;
        Ok(Attribute::new(ElementHandle::open(
            self.handle.storage().clone(),
            path,
        )?))
    }

    /// Read every attribute without a static type.
    ///
    /// # Errors
    /// Returns a [`MarshalError`] for the first attribute that cannot be read, e.g. [`MarshalError::UnsupportedType`].
    pub fn read_attributes(&self) -> Result<BTreeMap<String, DynamicValue>, MarshalError> {
        let storage = self.handle.storage();
        let mut attributes = BTreeMap::new();
        for name in self.attribute_names()? {
            let key = name.to_string();
            let path = ElementPath::attribute(self.node_path().clone(), name);
            attributes.insert(key, ElementHandle::open(storage.clone(), path)?.read_dynamic()?);
        }
        Ok(attributes)
    }

    fn attribute_path(&self, name: &str) -> Result<ElementPath, AttributeNameError> {
        Ok(ElementPath::attribute(
            self.node_path().clone(),
            AttributeName::new(name)?,
        ))
    }
}

impl<TStorage: ?Sized + ReadableWritableStorageTraits> Dataset<TStorage> {
    /// Create a dataset at `path` with the datatype and shape of `container` and write `container` to it.
    ///
    /// If the write fails, the new dataset is erased.
    ///
    /// # Errors
    /// Returns [`ElementCreateError`] if `path` is invalid, the dataset already exists, or the write fails.
    pub fn create<C: Container>(
        storage: Arc<TStorage>,
        path: &str,
        container: &C,
    ) -> Result<Self, ElementCreateError> {
        let dataset = Self::create_empty(
            storage,
            path,
            C::element_datatype()?,
            container.physical_shape(),
        )?;
        if let Err(err) = dataset.write(container) {
            dataset.erase()?;
            return Err(err.into());
        }
        Ok(dataset)
    }

    /// Create a zero-initialised dataset at `path` with `datatype` and `shape`.
    ///
    /// # Errors
    /// Returns [`ElementCreateError`] if `path` is invalid or the dataset already exists.
    pub fn create_empty(
        storage: Arc<TStorage>,
        path: &str,
        datatype: Datatype,
        shape: Vec<u64>,
    ) -> Result<Self, ElementCreateError> {
        let path = ElementPath::dataset(NodePath::new(path)?);
        Ok(Self {
            handle: ElementHandle::create(storage, path, datatype, shape)?,
        })
    }

    /// Create the attribute `name` with the datatype and shape of `container` and write `container` to it.
    ///
    /// If the write fails, the new attribute is erased.
    ///
    /// # Errors
    /// Returns [`ElementCreateError`] if `name` is invalid, the attribute already exists, or the write fails.
    pub fn create_attribute<C: Container>(
        &self,
        name: &str,
        container: &C,
    ) -> Result<Attribute<TStorage>, ElementCreateError> {
        let handle = ElementHandle::create(
            self.handle.storage().clone(),
            self.attribute_path(name)?,
            C::element_datatype()?,
            container.physical_shape(),
        )?;
        Self::commit_attribute(handle, |handle| handle.write(container))
    }

    /// Create the scalar attribute `name` and write `value` to it.
    ///
    /// # Errors
    /// Returns [`ElementCreateError`] if `name` is invalid, the attribute already exists, or the write fails.
    pub fn create_scalar_attribute<T: Element>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<Attribute<TStorage>, ElementCreateError> {
        let handle = ElementHandle::create(
            self.handle.storage().clone(),
            self.attribute_path(name)?,
            T::descriptor().datatype().clone(),
            vec![],
        )?;
        Self::commit_attribute(handle, |handle| handle.write_scalar(value))
    }

    fn commit_attribute(
        handle: ElementHandle<TStorage>,
        write: impl FnOnce(&ElementHandle<TStorage>) -> Result<(), MarshalError>,
    ) -> Result<Attribute<TStorage>, ElementCreateError> {
        if let Err(err) = write(&handle) {
            handle.storage().erase_element(handle.path())?;
            return Err(err.into());
        }
        Ok(Attribute::new(handle))
    }

    /// Erase the dataset and its attributes, consuming the handle.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    pub fn erase(self) -> Result<(), StorageError> {
        let storage = self.handle.storage().clone();
        let node = self.node_path().clone();
        drop(self);
        crate::storage::erase_node(&*storage, &node)
    }
}
