//! Logical element types and their physical representation.
//!
//! The [`Element`] trait is the registration point of a logical type: it supplies a static [`TypeDescriptor`] and the conversions to and from the type's [`Physical`] representation.
//! A type without an [`Element`] implementation cannot be marshaled, there is no default mapping.
//!
//! ## Registering a struct type
//! A struct with a flat, fixed size layout implements [`bytemuck::Pod`], uses itself as its physical type, and describes its members with a [`CompoundLayout`](crate::datatype::CompoundLayout).
//! See [`Vector3`] for an example.

mod fixed_string;
mod long_double;
mod vector3;

use std::{any::TypeId, collections::BTreeMap};

use parking_lot::RwLock;
use thiserror::Error;

pub use fixed_string::FixedString;
pub use long_double::LongDouble;
pub use vector3::Vector3;

use crate::{
    datatype::Datatype,
    physical::{decode_pod, OutOfMemoryError, Physical, VlenString},
};

/// The classification of a logical type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A single number or boolean.
    Scalar,
    /// Text.
    String,
    /// A struct of named members.
    Compound,
}

/// Static metadata of a logical element type.
///
/// There is exactly one descriptor per logical type, it is never mutated.
#[derive(Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: &'static str,
    datatype: Datatype,
    kind: TypeKind,
    pod: bool,
}

static REGISTRY: RwLock<BTreeMap<TypeId, &'static TypeDescriptor>> =
    parking_lot::const_rwlock(BTreeMap::new());

impl TypeDescriptor {
    /// Create a new type descriptor.
    ///
    /// `pod` must only be true if the in-memory layout of the type is already a legal physical layout for `datatype`.
    #[must_use]
    pub const fn new(name: &'static str, datatype: Datatype, kind: TypeKind, pod: bool) -> Self {
        Self {
            name,
            datatype,
            kind,
            pod,
        }
    }

    /// Returns the registered descriptor of `T`, creating it with `init` on first use.
    ///
    /// This suits types whose descriptor cannot be a `static` item, such as generic types or types with a [`CompoundLayout`](crate::datatype::CompoundLayout).
    pub fn registered<T: 'static>(init: impl FnOnce() -> Self) -> &'static Self {
        let type_id = TypeId::of::<T>();
        if let Some(descriptor) = REGISTRY.read().get(&type_id).copied() {
            return descriptor;
        }
        // `init` may look up the descriptors of member types, so it runs without the lock held.
        // A descriptor built by a losing thread of a race is leaked.
        let descriptor = init();
        *REGISTRY
            .write()
            .entry(type_id)
            .or_insert_with(|| &*Box::leak(Box::new(descriptor)))
    }

    /// The logical type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The storage datatype.
    #[must_use]
    pub const fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// The classification.
    #[must_use]
    pub const fn kind(&self) -> TypeKind {
        self.kind
    }

    /// The physical size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.datatype.size()
    }

    /// Returns true for string and compound types.
    #[must_use]
    pub fn is_struct_type(&self) -> bool {
        self.kind != TypeKind::Scalar
    }

    /// Returns true if the in-memory layout is already the physical layout.
    #[must_use]
    pub const fn is_pod(&self) -> bool {
        self.pod
    }

    /// Returns true if values must pass through the POD bridge to reach their physical layout.
    #[must_use]
    pub fn requires_translation(&self) -> bool {
        self.is_struct_type() && !self.is_pod()
    }
}

/// An invalid element value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid element value: {0}")]
pub struct InvalidElementValueError(String);

impl InvalidElementValueError {
    /// Create a new invalid element value error.
    #[must_use]
    pub fn new(reason: String) -> Self {
        Self(reason)
    }
}

/// An element conversion error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ElementError {
    /// An allocation failed.
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemoryError),
    /// A value with no logical or physical representation.
    #[error(transparent)]
    InvalidElementValue(#[from] InvalidElementValueError),
}

/// A logical element type.
pub trait Element: Sized {
    /// The physical (POD) representation.
    type Physical: Physical;

    /// The static type descriptor.
    fn descriptor() -> &'static TypeDescriptor;

    /// Produce the physical representation.
    ///
    /// Ownership of any allocation made for the physical value passes to the caller.
    ///
    /// # Errors
    /// Returns an [`ElementError`] if an allocation fails or the value has no physical representation.
    fn to_physical(&self) -> Result<Self::Physical, ElementError>;

    /// Reconstruct a logical value from its physical representation.
    ///
    /// # Errors
    /// Returns an [`ElementError`] if the physical value is invalid for this type.
    fn from_physical(physical: &Self::Physical) -> Result<Self, ElementError>;

    /// Release a physical value produced by [`to_physical`](Element::to_physical) that was not handed to a buffer.
    fn release_physical(physical: Self::Physical) {
        drop(physical);
    }

    /// Returns the backing memory of `elements` if it is already a legal physical layout.
    fn as_pod_bytes(elements: &[Self]) -> Option<&[u8]> {
        let _ = elements;
        None
    }

    /// Reinterpret a physical block as elements without passing through the POD bridge.
    ///
    /// Returns [`None`] if the type is not POD or any value in `bytes` is invalid.
    fn from_pod_bytes(bytes: &[u8]) -> Option<Vec<Self>> {
        let _ = bytes;
        None
    }

    /// Copy a single element out of a physical slot without passing through the POD bridge.
    ///
    /// Returns [`None`] if the type is not POD or the slot is invalid.
    fn copy_from_pod(slot: &[u8]) -> Option<Self> {
        let _ = slot;
        None
    }
}

fn pod_vec_from_bytes<T: bytemuck::Pod>(bytes: &[u8]) -> Option<Vec<T>> {
    (bytes.len() % core::mem::size_of::<T>() == 0).then(|| bytemuck::pod_collect_to_vec(bytes))
}

macro_rules! impl_element_pod {
    ($raw_type:ty, $name:literal, $datatype:expr) => {
        impl Element for $raw_type {
            type Physical = Self;

            fn descriptor() -> &'static TypeDescriptor {
                static DESCRIPTOR: TypeDescriptor =
                    TypeDescriptor::new($name, $datatype, TypeKind::Scalar, true);
                &DESCRIPTOR
            }

            fn to_physical(&self) -> Result<Self, ElementError> {
                Ok(*self)
            }

            fn from_physical(physical: &Self) -> Result<Self, ElementError> {
                Ok(*physical)
            }

            fn as_pod_bytes(elements: &[Self]) -> Option<&[u8]> {
                Some(bytemuck::must_cast_slice(elements))
            }

            fn from_pod_bytes(bytes: &[u8]) -> Option<Vec<Self>> {
                pod_vec_from_bytes(bytes)
            }

            fn copy_from_pod(slot: &[u8]) -> Option<Self> {
                decode_pod(slot).ok()
            }
        }
    };
}

impl_element_pod!(i8, "i8", Datatype::INT8);
impl_element_pod!(i16, "i16", Datatype::INT16);
impl_element_pod!(i32, "i32", Datatype::INT32);
impl_element_pod!(i64, "i64", Datatype::INT64);
impl_element_pod!(u8, "u8", Datatype::UINT8);
impl_element_pod!(u16, "u16", Datatype::UINT16);
impl_element_pod!(u32, "u32", Datatype::UINT32);
impl_element_pod!(u64, "u64", Datatype::UINT64);
impl_element_pod!(f32, "f32", Datatype::FLOAT32);
impl_element_pod!(f64, "f64", Datatype::FLOAT64);

impl Element for bool {
    type Physical = Self;

    fn descriptor() -> &'static TypeDescriptor {
        static DESCRIPTOR: TypeDescriptor =
            TypeDescriptor::new("bool", Datatype::BOOL, TypeKind::Scalar, true);
        &DESCRIPTOR
    }

    fn to_physical(&self) -> Result<Self, ElementError> {
        Ok(*self)
    }

    fn from_physical(physical: &Self) -> Result<Self, ElementError> {
        Ok(*physical)
    }

    fn as_pod_bytes(elements: &[Self]) -> Option<&[u8]> {
        Some(bytemuck::cast_slice(elements))
    }

    fn from_pod_bytes(bytes: &[u8]) -> Option<Vec<Self>> {
        bytes
            .iter()
            .all(|&byte| byte <= 1)
            .then(|| bytes.iter().map(|&byte| byte == 1).collect())
    }

    fn copy_from_pod(slot: &[u8]) -> Option<Self> {
        match slot {
            [0] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }
}

impl Element for String {
    type Physical = VlenString;

    fn descriptor() -> &'static TypeDescriptor {
        static DESCRIPTOR: TypeDescriptor =
            TypeDescriptor::new("string", Datatype::VLEN_STRING, TypeKind::String, false);
        &DESCRIPTOR
    }

    fn to_physical(&self) -> Result<VlenString, ElementError> {
        Ok(VlenString::new(self)?)
    }

    fn from_physical(physical: &VlenString) -> Result<Self, ElementError> {
        Ok(physical.to_str()?.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use crate::physical::{PhysicalBuffer, VLEN_SLOT_SIZE};

    use super::*;

    fn round_trip<T: Element>(value: &T) -> T {
        let descriptor = T::descriptor();
        let mut buffer = PhysicalBuffer::allocate(descriptor.size(), 1).unwrap();
        buffer.store(0, value.to_physical().unwrap()).unwrap();
        let physical = buffer.load::<T::Physical>(0).unwrap();
        T::from_physical(&physical).unwrap()
    }

    #[test]
    fn element_descriptors() {
        assert_eq!(i32::descriptor().datatype(), &Datatype::INT32);
        assert_eq!(u64::descriptor().size(), 8);
        assert_eq!(f32::descriptor().name(), "f32");
        assert!(f64::descriptor().is_pod());
        assert!(!f64::descriptor().is_struct_type());
        assert_eq!(String::descriptor().size(), VLEN_SLOT_SIZE);
        assert_eq!(String::descriptor().kind(), TypeKind::String);
        assert!(String::descriptor().requires_translation());
        assert!(!bool::descriptor().requires_translation());
        assert!(core::ptr::eq(i8::descriptor(), i8::descriptor()));
    }

    #[test]
    fn element_round_trip_extremes() {
        assert_eq!(round_trip(&i8::MIN), i8::MIN);
        assert_eq!(round_trip(&i64::MIN), i64::MIN);
        assert_eq!(round_trip(&i64::MAX), i64::MAX);
        assert_eq!(round_trip(&u64::MAX), u64::MAX);
        assert_eq!(round_trip(&u16::MAX), u16::MAX);
        assert_eq!(round_trip(&f32::MIN_POSITIVE).to_bits(), f32::MIN_POSITIVE.to_bits());
        assert_eq!(round_trip(&f64::MAX).to_bits(), f64::MAX.to_bits());
        assert_eq!(round_trip(&-0.0f64).to_bits(), (-0.0f64).to_bits());
        assert!(round_trip(&true));
        assert!(!round_trip(&false));
    }

    #[test]
    fn element_round_trip_string() {
        assert_eq!(round_trip(&String::new()), "");
        assert_eq!(round_trip(&"grüße".to_string()), "grüße");
        let long = "x".repeat(10_000);
        assert_eq!(round_trip(&long), long);
    }

    #[test]
    fn element_pod_bytes() {
        let values = [1u16, 2, 3];
        let bytes = u16::as_pod_bytes(&values).unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(u16::from_pod_bytes(bytes).unwrap(), values);
        assert!(u16::from_pod_bytes(&bytes[..5]).is_none());
        assert!(String::as_pod_bytes(&[String::new()]).is_none());
        assert_eq!(bool::from_pod_bytes(&[0, 1]), Some(vec![false, true]));
        assert_eq!(bool::from_pod_bytes(&[0, 2]), None);
        assert_eq!(i32::copy_from_pod(&7i32.to_ne_bytes()), Some(7));
    }

    #[test]
    fn element_registered_descriptor() {
        struct Local;
        let first = TypeDescriptor::registered::<Local>(|| {
            TypeDescriptor::new("local", Datatype::UINT8, TypeKind::Scalar, true)
        });
        let second = TypeDescriptor::registered::<Local>(|| unreachable!());
        assert!(core::ptr::eq(first, second));
        assert_eq!(second.name(), "local");
    }

    #[test]
    fn element_registered_descriptor_from_registered_members() {
        struct Tagged;
        let descriptor = TypeDescriptor::registered::<Tagged>(|| {
            let layout = crate::datatype::CompoundLayout::builder()
                .member("id", u32::descriptor().datatype().clone())
                .member("tag", FixedString::<4>::descriptor().datatype().clone())
                .member("origin", Vector3::descriptor().datatype().clone())
                .allow_nested()
                .build()
                .unwrap();
            TypeDescriptor::new("tagged", layout.into(), TypeKind::Compound, true)
        });
        assert_eq!(descriptor.name(), "tagged");
        assert_eq!(descriptor.size(), 32);
        assert!(core::ptr::eq(
            descriptor,
            TypeDescriptor::registered::<Tagged>(|| unreachable!())
        ));
    }
}
