use crate::{
    datatype::{CompoundLayout, Datatype},
    physical::{decode_pod, encode_pod, OutOfMemoryError, Physical, VlenHeap},
};

use super::{Element, ElementError, TypeDescriptor, TypeKind};

/// A three component vector, stored as the compound `{X: float64, Y: float64, Z: float64}`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Vector3 {
    /// The `X` component.
    pub x: f64,
    /// The `Y` component.
    pub y: f64,
    /// The `Z` component.
    pub z: f64,
}

// SAFETY: `repr(C)` with three `f64` members and no padding.
unsafe impl bytemuck::Zeroable for Vector3 {}
// SAFETY: `repr(C)` with three `f64` members and no padding.
unsafe impl bytemuck::Pod for Vector3 {}

impl Vector3 {
    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl Physical for Vector3 {
    fn encode(self, slot: &mut [u8], _heap: &mut VlenHeap) -> Result<(), OutOfMemoryError> {
        encode_pod(&self, slot);
        Ok(())
    }

    fn decode(slot: &[u8], _heap: &VlenHeap) -> Result<Self, ElementError> {
        Ok(decode_pod(slot)?)
    }
}

impl Element for Vector3 {
    type Physical = Self;

    /// # Panics
    /// Never panics, the member offsets come from the `repr(C)` field layout.
    fn descriptor() -> &'static TypeDescriptor {
        TypeDescriptor::registered::<Self>(|| {
            let layout = CompoundLayout::builder()
                .member_at("X", core::mem::offset_of!(Self, x), Datatype::FLOAT64)
                .member_at("Y", core::mem::offset_of!(Self, y), Datatype::FLOAT64)
                .member_at("Z", core::mem::offset_of!(Self, z), Datatype::FLOAT64)
                .size(core::mem::size_of::<Self>())
                .build()
                .expect("the Vector3 layout is valid");
            TypeDescriptor::new("vector3", layout.into(), TypeKind::Compound, true)
        })
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
        super::pod_vec_from_bytes(bytes)
    }

    fn copy_from_pod(slot: &[u8]) -> Option<Self> {
        decode_pod(slot).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector3_descriptor() {
        let descriptor = Vector3::descriptor();
        assert_eq!(descriptor.size(), 24);
        assert!(descriptor.is_struct_type());
        assert!(descriptor.is_pod());
        assert!(!descriptor.requires_translation());
        let Datatype::Compound(layout) = descriptor.datatype() else {
            panic!("Vector3 is a compound")
        };
        let names: Vec<_> = layout.members().iter().map(|m| m.name()).collect();
        assert_eq!(names, ["X", "Y", "Z"]);
        assert_eq!(layout.member("Z").unwrap().offset(), 16);
    }

    #[test]
    fn vector3_pod_bytes() {
        let values = [Vector3::new(1.0, 2.0, 3.0), Vector3::from([4.0, 5.0, 6.0])];
        let bytes = Vector3::as_pod_bytes(&values).unwrap();
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[8..16], &2.0f64.to_ne_bytes());
        assert_eq!(Vector3::from_pod_bytes(bytes).unwrap(), values);
    }
}
