//! A rust library for marshaling strongly-typed containers to and from self-describing binary array storage.
//!
//! Stored datasets carry an explicit element [`Datatype`](datatype::Datatype) and shape.
//! Stored attributes carry a type that is only known at read time, and can be parsed without any compile-time knowledge into a [`DynamicValue`](dynamic::DynamicValue).
//!
//! ## Getting Started
//! - [`element::Element`] describes how a logical type maps to its flat physical (POD) representation.
//!   It is implemented for the integer and floating point primitives, [`bool`], [`String`], and a few registered types such as [`element::Vector3`].
//! - [`container::Container`] is implemented for [`Vec`], [`VecDeque`](std::collections::VecDeque), [`BTreeMap`](std::collections::BTreeMap), [`HashMap`](std::collections::HashMap) and [`ndarray::Array`].
//! - [`dataset::Dataset`] and [`attribute::Attribute`] are handles to stored elements in any [`storage`] implementation.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use h5bridge::{dataset::Dataset, storage::store::MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let values: Vec<f64> = (0..10).map(f64::from).collect();
//! let dataset = Dataset::create(store.clone(), "/group/values", &values)?;
//! assert_eq!(dataset.rank(), 1);
//! assert_eq!(dataset.dimension(0)?, 10);
//!
//! let mut values_out: Vec<f64> = Vec::new();
//! dataset.read(&mut values_out)?;
//! assert_eq!(values, values_out);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `ndarray`: a [`Container`](container::Container) adapter for [`ndarray::Array`].
//!
//! ## Licence
//! `h5bridge` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod attribute;
pub mod config;
pub mod container;
pub mod dataset;
pub mod datatype;
pub mod dynamic;
pub mod element;
pub mod node;
pub mod physical;
pub mod storage;

pub use container::MarshalError;
