use std::sync::Arc;

use crate::{
    container::{
        check_compatibility, check_read_compatibility, marshal_iter, num_elements, Container,
        MarshalError,
    },
    datatype::Datatype,
    dynamic::{AttributeParser, DynamicValue},
    element::Element,
    node::ElementPath,
    physical::PhysicalBuffer,
    storage::{ElementEvent, ElementInfo, ReadableStorageTraits, ReadableWritableStorageTraits},
};

/// A scoped handle to one stored element, a dataset or an attribute.
///
/// The declared datatype and shape are fetched once when the handle is opened, datasets have a fixed shape.
/// The storage is notified with [`ElementEvent::Created`] or [`ElementEvent::Opened`] when the handle is constructed, and with [`ElementEvent::Closing`] exactly once when it is dropped.
#[derive(Debug)]
pub struct ElementHandle<TStorage: ?Sized + ReadableStorageTraits> {
    storage: Arc<TStorage>,
    path: ElementPath,
    info: ElementInfo,
}

impl<TStorage: ?Sized + ReadableStorageTraits> ElementHandle<TStorage> {
    /// Open a handle to the existing element at `path`.
    ///
    /// # Errors
    /// Returns a [`StorageError`](crate::storage::StorageError) if the element does not exist or there is an underlying storage error.
    pub fn open(
        storage: Arc<TStorage>,
        path: ElementPath,
    ) -> Result<Self, crate::storage::StorageError> {
        let info = storage.element_info(&path)?;
        storage.notify(&path, ElementEvent::Opened);
        Ok(Self {
            storage,
            path,
            info,
        })
    }

    /// The storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<TStorage> {
        &self.storage
    }

    /// The element path.
    #[must_use]
    pub const fn path(&self) -> &ElementPath {
        &self.path
    }

    /// The declared datatype.
    #[must_use]
    pub const fn datatype(&self) -> &Datatype {
        self.info.datatype()
    }

    /// The declared shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.info.shape()
    }

    /// The rank (number of dimensions).
    #[must_use]
    pub fn rank(&self) -> usize {
        self.info.rank()
    }

    /// The size of dimension `dimension`.
    ///
    /// # Errors
    /// Returns [`MarshalError::DimensionOutOfRange`] if `dimension` is not less than the rank.
    pub fn dimension(&self, dimension: usize) -> Result<u64, MarshalError> {
        self.shape()
            .get(dimension)
            .copied()
            .ok_or(MarshalError::DimensionOutOfRange {
                dimension,
                rank: self.rank(),
            })
    }

    /// Read the element into `container`.
    ///
    /// `container` takes the stored shape and is only replaced once the whole element has been read and converted.
    /// On error, `container` is unchanged.
    ///
    /// # Errors
    /// Returns [`MarshalError::TypeMismatch`] or [`MarshalError::RankMismatch`] before any transfer if the container cannot hold the element, or another [`MarshalError`] if the transfer or a conversion fails.
    pub fn read<C: Container>(&self, container: &mut C) -> Result<(), MarshalError> {
        *container = self.retrieve()?;
        Ok(())
    }

    /// Read the element into a new container.
    ///
    /// # Errors
    /// See [`read`](ElementHandle::read).
    pub fn retrieve<C: Container>(&self) -> Result<C, MarshalError> {
        let datatype = check_read_compatibility::<C>(self.datatype(), self.shape())?;
        let mut buffer = PhysicalBuffer::allocate(datatype.size(), num_elements(self.shape())?)?;
        self.storage.bulk_read(&self.path, &datatype, &mut buffer)?;
        C::unmarshal(self.shape(), &buffer)
    }

    /// Read a rank 0 element.
    ///
    /// # Errors
    /// Returns [`MarshalError::TypeMismatch`] or [`MarshalError::RankMismatch`] before any transfer if the element is not a scalar of `T`, or another [`MarshalError`] if the transfer or the conversion fails.
    pub fn read_scalar<T: Element>(&self) -> Result<T, MarshalError> {
        let datatype = T::descriptor().datatype();
        check_compatibility(datatype, &[], self.datatype(), self.shape())?;
        let mut buffer = PhysicalBuffer::allocate(datatype.size(), 1)?;
        self.storage.bulk_read(&self.path, datatype, &mut buffer)?;
        let physical = buffer.load::<T::Physical>(0)?;
        Ok(T::from_physical(&physical)?)
    }

    /// Read the element without a static type.
    ///
    /// # Errors
    /// Returns [`MarshalError::UnsupportedType`] before any transfer if the element has no dynamic representation, or another [`MarshalError`] if the transfer or a conversion fails.
    pub fn read_dynamic(&self) -> Result<DynamicValue, MarshalError> {
        AttributeParser::new(&self.info)?.read(&*self.storage, &self.path)
    }
}

impl<TStorage: ?Sized + ReadableWritableStorageTraits> ElementHandle<TStorage> {
    /// Create the element at `path` and return a handle to it.
    ///
    /// # Errors
    /// Returns a [`StorageError`](crate::storage::StorageError) if the element already exists or there is an underlying storage error.
    pub fn create(
        storage: Arc<TStorage>,
        path: ElementPath,
        datatype: Datatype,
        shape: Vec<u64>,
    ) -> Result<Self, crate::storage::StorageError> {
        storage.create_element(&path, &datatype, &shape)?;
        storage.notify(&path, ElementEvent::Created);
        Ok(Self {
            storage,
            path,
            info: ElementInfo::new(datatype, shape),
        })
    }

    /// Write `container` to the element with a single bulk transfer.
    ///
    /// # Errors
    /// Returns [`MarshalError::TypeMismatch`], [`MarshalError::RankMismatch`] or [`MarshalError::DimensionMismatch`] before any transfer if `container` does not match the element, or another [`MarshalError`] if a conversion or the transfer fails.
    pub fn write<C: Container>(&self, container: &C) -> Result<(), MarshalError> {
        let datatype = C::element_datatype()?;
        check_compatibility(
            &datatype,
            &container.physical_shape(),
            self.datatype(),
            self.shape(),
        )?;
        let bytes = container.marshal()?;
        self.storage.bulk_write(&self.path, &datatype, &bytes)?;
        Ok(())
    }

    /// Write a rank 0 element.
    ///
    /// # Errors
    /// Returns [`MarshalError::TypeMismatch`] or [`MarshalError::RankMismatch`] before any transfer if the element is not a scalar of `T`, or another [`MarshalError`] if the conversion or the transfer fails.
    pub fn write_scalar<T: Element>(&self, value: &T) -> Result<(), MarshalError> {
        let datatype = T::descriptor().datatype();
        check_compatibility(datatype, &[], self.datatype(), self.shape())?;
        let buffer = marshal_iter(1, [value])?;
        self.storage
            .bulk_write(&self.path, datatype, &buffer.into())?;
        Ok(())
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> Drop for ElementHandle<TStorage> {
    fn drop(&mut self) {
        self.storage.notify(&self.path, ElementEvent::Closing);
    }
}
