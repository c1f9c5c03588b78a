//! Container adapters.
//!
//! A [`Container`] maps a language-native container onto a stored element of a given [`Datatype`] and shape:
//!  - [`Vec`] and [`VecDeque`](std::collections::VecDeque) are rank 1 sequences,
//!  - [`BTreeMap`](std::collections::BTreeMap) and [`HashMap`](std::collections::HashMap) are rank 1 sequences of `{Key, Value}` compound entries,
//!  - [`ndarray::Array`] is an array of any rank, in C (row-major) order.
//!
//! Writes validate the container against the stored datatype and shape with [`check_compatibility`] before any data is transferred.
//! Reads validate the datatype and rank, perform one bulk transfer, and only then replace the destination container.

mod indices;
mod map;
#[cfg(feature = "ndarray")]
mod nd_array;
mod sequence;

pub use indices::{ravel_indices, unravel_index, ArrayIndices, Indices, IndicesIterator};
pub use map::entry_layout;

use thiserror::Error;

use crate::{
    config::global_config,
    datatype::{Datatype, UnsupportedTypeError},
    element::{Element, ElementError, InvalidElementValueError},
    physical::{OutOfMemoryError, PhysicalBuffer, PhysicalBytes},
    storage::StorageError,
};

/// A marshaling error.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// The element datatype does not match the stored datatype.
    #[error("element datatype {expected} does not match the stored datatype {stored}")]
    TypeMismatch {
        /// The datatype of the container elements.
        expected: Datatype,
        /// The stored datatype.
        stored: Datatype,
    },
    /// The container rank does not match the stored rank.
    #[error("container rank {container} does not match the stored rank {stored}")]
    RankMismatch {
        /// The container rank.
        container: usize,
        /// The stored rank.
        stored: usize,
    },
    /// A container dimension does not match the stored dimension.
    #[error("container dimension {dimension} has size {container}, the stored size is {stored}")]
    DimensionMismatch {
        /// The dimension index.
        dimension: usize,
        /// The container size of the dimension.
        container: u64,
        /// The stored size of the dimension.
        stored: u64,
    },
    /// A bulk transfer failed.
    #[error(transparent)]
    IOFailure(#[from] StorageError),
    /// A physical buffer could not be allocated.
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemoryError),
    /// A datatype with no supported representation.
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),
    /// A stored value with no logical representation.
    #[error(transparent)]
    InvalidElementValue(#[from] InvalidElementValueError),
    /// A dimension index beyond the rank.
    #[error("dimension {dimension} is out of range for rank {rank}")]
    DimensionOutOfRange {
        /// The requested dimension.
        dimension: usize,
        /// The rank.
        rank: usize,
    },
}

impl From<ElementError> for MarshalError {
    fn from(err: ElementError) -> Self {
        match err {
            ElementError::OutOfMemory(err) => Self::OutOfMemory(err),
            ElementError::InvalidElementValue(err) => Self::InvalidElementValue(err),
        }
    }
}

/// A container of elements that can be marshaled to and from a stored element.
pub trait Container: Sized {
    /// The datatype of one stored element of the container.
    ///
    /// # Errors
    /// Returns [`MarshalError::UnsupportedType`] if the container cannot describe its elements, e.g. a map with a compound key or value.
    fn element_datatype() -> Result<Datatype, MarshalError>;

    /// The rank of the container type, or [`None`] if it can take any rank.
    fn static_rank() -> Option<usize>;

    /// The storage shape of the container.
    fn physical_shape(&self) -> Vec<u64>;

    /// Marshal the container elements in storage order.
    ///
    /// # Errors
    /// Returns a [`MarshalError`] if an element conversion or buffer allocation fails.
    fn marshal(&self) -> Result<PhysicalBytes<'_>, MarshalError>;

    /// Unmarshal a container of `shape` from a physical buffer.
    ///
    /// # Errors
    /// Returns a [`MarshalError`] if an element conversion fails.
    fn unmarshal(shape: &[u64], buffer: &PhysicalBuffer) -> Result<Self, MarshalError>;
}

fn check_datatype(expected: &Datatype, stored: &Datatype) -> Result<(), MarshalError> {
    if expected == stored {
        Ok(())
    } else {
        Err(MarshalError::TypeMismatch {
            expected: expected.clone(),
            stored: stored.clone(),
        })
    }
}

fn check_rank(container: usize, stored: usize) -> Result<(), MarshalError> {
    if container == stored {
        Ok(())
    } else {
        Err(MarshalError::RankMismatch { container, stored })
    }
}

/// Check that a container with elements of `datatype` and `shape` is compatible with a stored element.
///
/// The datatype must match exactly, there is no implicit numeric conversion.
/// Then the rank and every dimension are compared in order.
///
/// # Errors
/// Returns the first of [`MarshalError::TypeMismatch`], [`MarshalError::RankMismatch`] or [`MarshalError::DimensionMismatch`] encountered.
pub fn check_compatibility(
    datatype: &Datatype,
    shape: &[u64],
    stored_datatype: &Datatype,
    stored_shape: &[u64],
) -> Result<(), MarshalError> {
    check_datatype(datatype, stored_datatype)?;
    check_rank(shape.len(), stored_shape.len())?;
    for (dimension, (&container, &stored)) in std::iter::zip(shape, stored_shape).enumerate() {
        if container != stored {
            return Err(MarshalError::DimensionMismatch {
                dimension,
                container,
                stored,
            });
        }
    }
    Ok(())
}

/// Check that a container of type `C` can be read from a stored element.
///
/// The destination takes the stored shape, so only the datatype and a fixed container rank are checked.
///
/// # Errors
/// Returns [`MarshalError::TypeMismatch`] or [`MarshalError::RankMismatch`].
pub fn check_read_compatibility<C: Container>(
    stored_datatype: &Datatype,
    stored_shape: &[u64],
) -> Result<Datatype, MarshalError> {
    let datatype = C::element_datatype()?;
    check_datatype(&datatype, stored_datatype)?;
    if let Some(rank) = C::static_rank() {
        check_rank(rank, stored_shape.len())?;
    }
    Ok(datatype)
}

/// The number of elements of `shape`.
///
/// # Errors
/// Returns [`OutOfMemoryError`] if the number of elements does not fit in [`usize`].
pub fn num_elements(shape: &[u64]) -> Result<usize, OutOfMemoryError> {
    shape
        .iter()
        .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(OutOfMemoryError::new(usize::MAX))
}

fn pod_fast_path<T: Element>() -> bool {
    T::descriptor().is_pod() && global_config().pod_fast_path()
}

/// Marshal `num_elements` elements element-wise through the POD bridge.
///
/// # Errors
/// Returns a [`MarshalError`] if an element conversion or buffer allocation fails.
pub fn marshal_iter<'a, T: Element + 'a>(
    num_elements: usize,
    elements: impl IntoIterator<Item = &'a T>,
) -> Result<PhysicalBuffer, MarshalError> {
    let mut buffer = PhysicalBuffer::allocate(T::descriptor().size(), num_elements)?;
    for (index, element) in elements.into_iter().take(num_elements).enumerate() {
        buffer.store(index, element.to_physical()?)?;
    }
    Ok(buffer)
}

/// Marshal a slice of elements.
///
/// POD elements lend their backing memory if the [POD fast path](crate::config::Config#pod-fast-path) is enabled.
///
/// # Errors
/// Returns a [`MarshalError`] if an element conversion or buffer allocation fails.
pub fn marshal_elements<T: Element>(elements: &[T]) -> Result<PhysicalBytes<'_>, MarshalError> {
    if pod_fast_path::<T>() {
        if let Some(bytes) = T::as_pod_bytes(elements) {
            return Ok(PhysicalBytes::Borrowed(bytes));
        }
    }
    Ok(marshal_iter(elements.len(), elements)?.into())
}

/// Unmarshal every element of a physical buffer, in order.
///
/// # Errors
/// Returns a [`MarshalError`] if an element conversion or allocation fails.
pub fn unmarshal_elements<T: Element>(buffer: &PhysicalBuffer) -> Result<Vec<T>, MarshalError> {
    if pod_fast_path::<T>() {
        if let Some(elements) = T::from_pod_bytes(buffer.bytes()) {
            return Ok(elements);
        }
    }
    let num_elements = buffer.num_elements();
    let mut elements = Vec::new();
    elements.try_reserve_exact(num_elements).map_err(|_| {
        OutOfMemoryError::new(num_elements.saturating_mul(core::mem::size_of::<T>()))
    })?;
    for index in 0..num_elements {
        let physical = buffer.load::<T::Physical>(index)?;
        elements.push(T::from_physical(&physical)?);
    }
    Ok(elements)
}
