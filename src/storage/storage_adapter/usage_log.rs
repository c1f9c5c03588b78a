//! A storage adapter which logs storage calls.

use std::{io::Write, sync::Arc};

use itertools::Itertools;
use parking_lot::Mutex;

use crate::{
    datatype::Datatype,
    node::{AttributeName, ElementPath, NodePath},
    physical::{PhysicalBuffer, PhysicalBytes},
    storage::{
        ElementEvent, ElementInfo, ReadableStorageTraits, StorageError, WritableStorageTraits,
    },
};

/// The usage log storage adapter. Logs storage method calls.
///
/// It is intended to aid in debugging by revealing the bulk transfers and handle lifecycle events of marshaling calls.
///
/// ### Example (log to stdout)
/// ```rust
/// # use std::sync::Arc;
/// # use parking_lot::Mutex;
/// # use h5bridge::storage::store::MemoryStore;
/// # use h5bridge::storage::storage_adapter::usage_log::UsageLogStorageAdapter;
/// let store = Arc::new(MemoryStore::new());
/// let log_writer = Arc::new(Mutex::new(std::io::stdout()));
/// let store = Arc::new(UsageLogStorageAdapter::new(store, log_writer, || {
///     "[h5bridge] ".to_string()
/// }));
/// ```
///
/// Writing and reading back a [`Vec<f64>`] with the above [`UsageLogStorageAdapter`] prints outputs like:
/// ```text
/// [h5bridge] create_element(/values, float64, [10]) -> Ok(())
/// [h5bridge] notify(/values, created)
/// [h5bridge] bulk_write(/values, float64, len=80, vlen=0) -> Ok(())
/// [h5bridge] notify(/values, closing)
/// [h5bridge] element_info(/values) -> Ok(float64 [10])
/// [h5bridge] notify(/values, opened)
/// [h5bridge] bulk_read(/values, float64, len=80) -> Ok(())
/// [h5bridge] notify(/values, closing)
/// ```
pub struct UsageLogStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    handle: Arc<Mutex<dyn Write + Send + Sync>>,
    prefix_func: fn() -> String,
}

impl<TStorage: ?Sized> core::fmt::Debug for UsageLogStorageAdapter<TStorage> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        writeln!(f, "usage log")
    }
}

impl<TStorage: ?Sized> UsageLogStorageAdapter<TStorage> {
    /// Create a new usage log storage adapter.
    pub fn new(
        storage: Arc<TStorage>,
        handle: Arc<Mutex<dyn Write + Send + Sync>>,
        prefix_func: fn() -> String,
    ) -> Self {
        Self {
            storage,
            handle,
            prefix_func,
        }
    }
}

fn format_result<T>(result: &Result<T, StorageError>, f: impl Fn(&T) -> String) -> String {
    match result {
        Ok(value) => format!("Ok({})", f(value)),
        Err(err) => format!("Err({err})"),
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> ReadableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn element_info(&self, path: &ElementPath) -> Result<ElementInfo, StorageError> {
        let result = self.storage.element_info(path);
        writeln!(
            self.handle.lock(),
            "{}element_info({path}) -> {}",
            (self.prefix_func)(),
            format_result(&result, |info| format!(
                "{} [{}]",
                info.datatype(),
                info.shape().iter().format(", ")
            ))
        )?;
        result
    }

    fn bulk_read(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        buffer: &mut PhysicalBuffer,
    ) -> Result<(), StorageError> {
        let result = self.storage.bulk_read(path, datatype, buffer);
        writeln!(
            self.handle.lock(),
            "{}bulk_read({path}, {datatype}, len={}) -> {}",
            (self.prefix_func)(),
            buffer.bytes().len(),
            format_result(&result, |()| "()".to_string())
        )?;
        result
    }

    fn list_attributes(&self, node: &NodePath) -> Result<Vec<AttributeName>, StorageError> {
        let result = self.storage.list_attributes(node);
        writeln!(
            self.handle.lock(),
            "{}list_attributes({node}) -> {}",
            (self.prefix_func)(),
            format_result(&result, |names| format!("[{}]", names.iter().format(", ")))
        )?;
        result
    }

    fn notify(&self, path: &ElementPath, event: ElementEvent) {
        self.storage.notify(path, event);
        // a failed log write cannot be reported from a handle drop
        let _ = writeln!(
            self.handle.lock(),
            "{}notify({path}, {event})",
            (self.prefix_func)()
        );
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> WritableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn create_element(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        shape: &[u64],
    ) -> Result<(), StorageError> {
        let result = self.storage.create_element(path, datatype, shape);
        writeln!(
            self.handle.lock(),
            "{}create_element({path}, {datatype}, [{}]) -> {}",
            (self.prefix_func)(),
            shape.iter().format(", "),
            format_result(&result, |()| "()".to_string())
        )?;
        result
    }

    fn bulk_write(
        &self,
        path: &ElementPath,
        datatype: &Datatype,
        bytes: &PhysicalBytes,
    ) -> Result<(), StorageError> {
        let result = self.storage.bulk_write(path, datatype, bytes);
        writeln!(
            self.handle.lock(),
            "{}bulk_write({path}, {datatype}, len={}, vlen={}) -> {}",
            (self.prefix_func)(),
            bytes.bytes().len(),
            bytes.heap().payload_size(),
            format_result(&result, |()| "()".to_string())
        )?;
        result
    }

    fn erase_element(&self, path: &ElementPath) -> Result<bool, StorageError> {
        let result = self.storage.erase_element(path);
        writeln!(
            self.handle.lock(),
            "{}erase_element({path}) -> {}",
            (self.prefix_func)(),
            format_result(&result, ToString::to_string)
        )?;
        result
    }
}
