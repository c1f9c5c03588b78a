//! h5bridge global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the h5bridge crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// # Marshaling Configuration Options
///
/// ## POD Fast Path
///  > default: [`true`]
///
/// If enabled, containers with contiguous storage of POD elements (e.g. [`Vec<f64>`]) are written with a single block transfer of their backing memory and read without a per-element conversion.
/// Otherwise, every element passes through the [POD bridge](crate::element::Element).
///
/// ## Buffer Size Limit
///  > default: [`usize::MAX`]
///
/// The largest physical buffer (in bytes) that a single marshal or unmarshal call may allocate.
/// Requests above the limit fail with [`MarshalError::OutOfMemory`](crate::MarshalError::OutOfMemory) before any allocation is attempted.
#[derive(Debug)]
pub struct Config {
    pod_fast_path: bool,
    buffer_size_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pod_fast_path: true,
            buffer_size_limit: usize::MAX,
        }
    }
}

impl Config {
    /// Get the [POD fast path](#pod-fast-path) configuration.
    #[must_use]
    pub fn pod_fast_path(&self) -> bool {
        self.pod_fast_path
    }

    /// Set the [POD fast path](#pod-fast-path) configuration.
    pub fn set_pod_fast_path(&mut self, pod_fast_path: bool) {
        self.pod_fast_path = pod_fast_path;
    }

    /// Get the [buffer size limit](#buffer-size-limit) configuration.
    #[must_use]
    pub fn buffer_size_limit(&self) -> usize {
        self.buffer_size_limit
    }

    /// Set the [buffer size limit](#buffer-size-limit) configuration.
    pub fn set_buffer_size_limit(&mut self, buffer_size_limit: usize) {
        self.buffer_size_limit = buffer_size_limit;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global h5bridge configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global h5bridge configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}
