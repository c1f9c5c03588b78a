//! The storage collaborator: a hierarchy of typed, fixed-shape elements.
//!
//! A storage holds datasets and attributes, each addressed by an [`ElementPath`] and declaring a [`Datatype`] and a shape.
//! Elements are transferred in bulk: a [`PhysicalBuffer`](crate::physical::PhysicalBuffer) moves to or from the storage in a single call.
//!
//! This module defines the abstract storage interfaces, an in-memory [store], and a [usage log adapter](storage_adapter).

pub mod storage_adapter;
mod storage_sync;
pub mod store;

use std::sync::Arc;

use derive_more::Display;
use thiserror::Error;

use crate::{datatype::Datatype, node::ElementPath, physical::OutOfMemoryError};

pub use self::storage_sync::{
    element_exists, erase_node, ReadableStorageTraits, ReadableWritableStorageTraits,
    WritableStorageTraits,
};

/// [`Arc`] wrapped readable storage.
pub type ReadableStorage = Arc<dyn ReadableStorageTraits>;

/// [`Arc`] wrapped writable storage.
pub type WritableStorage = Arc<dyn WritableStorageTraits>;

/// [`Arc`] wrapped readable and writable storage.
pub type ReadableWritableStorage = Arc<dyn ReadableWritableStorageTraits>;

/// The declared datatype and shape of a stored element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementInfo {
    datatype: Datatype,
    shape: Vec<u64>,
}

impl ElementInfo {
    /// Create a new [`ElementInfo`].
    #[must_use]
    pub const fn new(datatype: Datatype, shape: Vec<u64>) -> Self {
        Self { datatype, shape }
    }

    /// The declared datatype.
    #[must_use]
    pub const fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// The declared shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The rank (number of dimensions).
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// The number of elements, or [`None`] if it overflows [`u64`].
    #[must_use]
    pub fn num_elements(&self) -> Option<u64> {
        self.shape
            .iter()
            .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
    }
}

/// A lifecycle event of an element handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum ElementEvent {
    /// A new element was created.
    #[display("created")]
    Created,
    /// An existing element was opened.
    #[display("opened")]
    Opened,
    /// An element handle is about to be destroyed.
    #[display("closing")]
    Closing,
}

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The element does not exist.
    #[error("element {0} not found")]
    NotFound(ElementPath),
    /// The element already exists.
    #[error("element {0} already exists")]
    AlreadyExists(ElementPath),
    /// A buffer does not match the size of the stored element.
    #[error("buffer for {path} has {actual} bytes, expected {expected}")]
    InvalidBufferSize {
        /// The element path.
        path: ElementPath,
        /// The expected size in bytes.
        expected: usize,
        /// The actual size in bytes.
        actual: usize,
    },
    /// A transfer requested a datatype other than the stored datatype.
    #[error("cannot convert {stored} to {requested} for element {path}")]
    DatatypeConversion {
        /// The element path.
        path: ElementPath,
        /// The requested datatype.
        requested: Datatype,
        /// The stored datatype.
        stored: Datatype,
    },
    /// The stored element could not be allocated.
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemoryError),
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
