//! Storage adapters.
//!
//! A storage adapter wraps a storage and has the same interface.

pub mod usage_log;
