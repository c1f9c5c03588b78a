//! An in-memory store.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};

use crate::{
    datatype::Datatype,
    node::{AttributeName, ElementPath, NodePath},
    physical::{try_alloc_zeroed, PhysicalBuffer, PhysicalBytes, VlenHeap},
    storage::{
        ElementEvent, ElementInfo, ReadableStorageTraits, StorageError, WritableStorageTraits,
    },
};

#[derive(Debug)]
struct StoredElement {
    info: ElementInfo,
    bytes: Vec<u8>,
    heap: VlenHeap,
}

/// An in-memory store.
///
/// Transfers require the exact stored datatype and an exactly sized buffer.
/// The store also counts the open handles of each element, see [`MemoryStore::open_handle_count`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    elements: RwLock<BTreeMap<ElementPath, StoredElement>>,
    open_handles: Mutex<BTreeMap<ElementPath, usize>>,
}

impl MemoryStore {
    /// Create a new, empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of open handles to the element at `path`.
    #[must_use]
    pub fn open_handle_count(&self, path: &ElementPath) -> usize {
        self.open_handles.lock().get(path).copied().unwrap_or_default()
    }

    /// Return the paths of all stored elements, in path order.
    #[must_use]
    pub fn element_paths(&self) -> Vec<ElementPath> {
        self.elements.read().keys().cloned().collect()
    }

    fn check_transfer(
        path: &ElementPath,
        element: &StoredElement,
        datatype: &Datatype,
        size: usize,
    ) -> Result<(), StorageError> {
        if element.info.datatype() != datatype {
            return Err(StorageError::DatatypeConversion {
                path: path.clone(),
                requested: datatype.clone(),
                stored: element.info.datatype().clone(),
            });
        }
        if element.bytes.len() != size {
            return Err(StorageError::InvalidBufferSize {
                path: path.clone(),
                expected: element.bytes.len(),
                actual: size,
            });
        }
        Ok(())
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn element_info(&self, path: &ElementPath) -> Result<ElementInfo, StorageError> {
        self.elements
            .read()
            .get(path)
            .map(|element| element.info.clone())
            .ok_or_else(|| StorageError::NotFound(path.clone()))
    }

    fn bulk_read(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        buffer: &mut PhysicalBuffer,
    ) -> Result<(), StorageError> {
        let elements = self.elements.read();
        let element = elements
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.clone()))?;
        Self::check_transfer(path, element, datatype, buffer.bytes().len())?;
        let (bytes, heap) = buffer.parts_mut();
        bytes.copy_from_slice(&element.bytes);
        heap.clone_from(&element.heap);
        Ok(())
    }

    fn list_attributes(&self, node: &NodePath) -> Result<Vec<AttributeName>, StorageError> {
        Ok(self
            .elements
            .read()
            .keys()
            .filter(|path| path.node() == node)
            .filter_map(ElementPath::attribute_name)
            .cloned()
            .collect())
    }

    fn notify(&self, path: &ElementPath, event: ElementEvent) {
        let mut open_handles = self.open_handles.lock();
        match event {
            ElementEvent::Created | ElementEvent::Opened => {
                *open_handles.entry(path.clone()).or_default() += 1;
            }
            ElementEvent::Closing => {
                if let Some(count) = open_handles.get_mut(path) {
                    *count -= 1;
                    if *count == 0 {
                        open_handles.remove(path);
                    }
                }
            }
        }
    }
}

impl WritableStorageTraits for MemoryStore {
    fn create_element(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        shape: &[u64],
    ) -> Result<(), StorageError> {
        let info = ElementInfo::new(datatype.clone(), shape.to_vec());
        let size = info
            .num_elements()
            .and_then(|num_elements| usize::try_from(num_elements).ok())
            .and_then(|num_elements| num_elements.checked_mul(datatype.size()))
            .ok_or_else(|| StorageError::Other(format!("element {path} is too large")))?;

        let mut elements = self.elements.write();
        if elements.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.clone()));
        }
        let bytes = try_alloc_zeroed(size)?;
        elements.insert(
            path.clone(),
            StoredElement {
                info,
                bytes,
                heap: VlenHeap::new(),
            },
        );
        Ok(())
    }

    fn bulk_write(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        bytes: &PhysicalBytes,
    ) -> Result<(), StorageError> {
        let mut elements = self.elements.write();
        let element = elements
            .get_mut(path)
            .ok_or_else(|| StorageError::NotFound(path.clone()))?;
        Self::check_transfer(path, element, datatype, bytes.bytes().len())?;
        element.bytes.copy_from_slice(bytes.bytes());
        element.heap.clone_from(bytes.heap());
        Ok(())
    }

    fn erase_element(&self, path: &ElementPath) -> Result<bool, StorageError> {
        let mut elements = self.elements.write();
        let existed = elements.remove(path).is_some();
        if !path.is_attribute() {
            elements.retain(|other, _| other.node() != path.node());
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use crate::{container::marshal_iter, storage::element_exists};

    use super::*;

    fn path(path: &str) -> ElementPath {
        ElementPath::new(path).unwrap()
    }

    #[test]
    fn memory_store_create_write_read() {
        let store = MemoryStore::new();
        let values = path("/values");
        store
            .create_element(&values, &Datatype::INT32, &[3])
            .unwrap();
        assert!(matches!(
            store.create_element(&values, &Datatype::INT32, &[3]),
            Err(StorageError::AlreadyExists(_))
        ));

        let info = store.element_info(&values).unwrap();
        assert_eq!(info.datatype(), &Datatype::INT32);
        assert_eq!(info.shape(), &[3]);

        let mut buffer = PhysicalBuffer::allocate(4, 3).unwrap();
        store
            .bulk_read(&values, &Datatype::INT32, &mut buffer)
            .unwrap();
        assert_eq!(buffer.bytes(), &[0u8; 12]);

        let written = marshal_iter(3, &[1i32, 2, 3]).unwrap();
        store
            .bulk_write(&values, &Datatype::INT32, &written.clone().into())
            .unwrap();
        store
            .bulk_read(&values, &Datatype::INT32, &mut buffer)
            .unwrap();
        assert_eq!(buffer, written);
    }

    #[test]
    fn memory_store_transfer_checks() {
        let store = MemoryStore::new();
        let values = path("/values");
        assert!(matches!(
            store.bulk_write(&values, &Datatype::INT32, &PhysicalBytes::Borrowed(&[])),
            Err(StorageError::NotFound(_))
        ));
        store
            .create_element(&values, &Datatype::INT32, &[2])
            .unwrap();
        let bytes = [0u8; 8];
        assert!(matches!(
            store.bulk_write(&values, &Datatype::UINT32, &PhysicalBytes::Borrowed(&bytes)),
            Err(StorageError::DatatypeConversion { .. })
        ));
        assert!(matches!(
            store.bulk_write(&values, &Datatype::INT32, &PhysicalBytes::Borrowed(&bytes[..4])),
            Err(StorageError::InvalidBufferSize {
                expected: 8,
                actual: 4,
                ..
            })
        ));
        let mut buffer = PhysicalBuffer::allocate(4, 3).unwrap();
        assert!(matches!(
            store.bulk_read(&values, &Datatype::INT32, &mut buffer),
            Err(StorageError::InvalidBufferSize { .. })
        ));
    }

    #[test]
    fn memory_store_vlen_heap() {
        let store = MemoryStore::new();
        let names = path("/names");
        store
            .create_element(&names, &Datatype::VLEN_STRING, &[2])
            .unwrap();
        let written = marshal_iter(2, &["a".to_string(), "bc".to_string()]).unwrap();
        store
            .bulk_write(&names, &Datatype::VLEN_STRING, &written.clone().into())
            .unwrap();
        let mut buffer = PhysicalBuffer::allocate(Datatype::VLEN_STRING.size(), 2).unwrap();
        store
            .bulk_read(&names, &Datatype::VLEN_STRING, &mut buffer)
            .unwrap();
        assert_eq!(buffer.heap(), written.heap());
        assert_eq!(buffer.heap().len(), 2);
    }

    #[test]
    fn memory_store_attributes_and_erase() {
        let store = MemoryStore::new();
        let dataset = path("/group/values");
        store
            .create_element(&dataset, &Datatype::FLOAT64, &[1])
            .unwrap();
        store
            .create_element(&path("/group/values@units"), &Datatype::VLEN_STRING, &[])
            .unwrap();
        store
            .create_element(&path("/group/values@scale"), &Datatype::FLOAT32, &[])
            .unwrap();
        store
            .create_element(&path("/group@title"), &Datatype::VLEN_STRING, &[])
            .unwrap();

        let names = store.list_attributes(dataset.node()).unwrap();
        let names: Vec<&str> = names.iter().map(AttributeName::as_str).collect();
        assert_eq!(names, vec!["scale", "units"]);

        assert!(store.erase_element(&dataset).unwrap());
        assert!(!store.erase_element(&dataset).unwrap());
        assert!(!element_exists(&store, &path("/group/values@units")).unwrap());
        assert!(element_exists(&store, &path("/group@title")).unwrap());
        assert_eq!(store.element_paths(), vec![path("/group@title")]);
    }

    #[test]
    fn memory_store_open_handles() {
        let store = MemoryStore::new();
        let values = path("/values");
        store.notify(&values, ElementEvent::Created);
        store.notify(&values, ElementEvent::Opened);
        assert_eq!(store.open_handle_count(&values), 2);
        store.notify(&values, ElementEvent::Closing);
        store.notify(&values, ElementEvent::Closing);
        store.notify(&values, ElementEvent::Closing);
        assert_eq!(store.open_handle_count(&values), 0);
    }
}
