use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
    ops::Range,
};

use crate::{
    datatype::{CompoundLayout, Datatype, UnsupportedTypeError},
    element::Element,
    physical::{Physical, PhysicalBuffer, PhysicalBytes, VlenHeap},
};

use super::{Container, MarshalError};

/// The `{Key, Value}` compound layout of a map entry with keys `K` and values `V`.
///
/// # Errors
/// Returns [`MarshalError::UnsupportedType`] if `K` or `V` is a compound, nested compounds are not supported.
pub fn entry_layout<K: Element, V: Element>() -> Result<CompoundLayout, MarshalError> {
    Ok(CompoundLayout::builder()
        .member("Key", K::descriptor().datatype().clone())
        .member("Value", V::descriptor().datatype().clone())
        .build()
        .map_err(UnsupportedTypeError::from)?)
}

fn member_ranges(layout: &CompoundLayout) -> (Range<usize>, Range<usize>) {
    let members = layout.members();
    (members[0].byte_range(), members[1].byte_range())
}

fn marshal_entries<'a, K: Element + 'a, V: Element + 'a>(
    num_entries: usize,
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Result<PhysicalBuffer, MarshalError> {
    let layout = entry_layout::<K, V>()?;
    let (key_range, value_range) = member_ranges(&layout);
    let mut buffer = PhysicalBuffer::allocate(layout.size(), num_entries)?;
    for (index, (key, value)) in entries.take(num_entries).enumerate() {
        let key_physical = key.to_physical()?;
        let value_physical = match value.to_physical() {
            Ok(value_physical) => value_physical,
            Err(err) => {
                K::release_physical(key_physical);
                return Err(err.into());
            }
        };
        let (slot, heap) = buffer.slot_mut(index);
        key_physical.encode(&mut slot[key_range.clone()], heap)?;
        value_physical.encode(&mut slot[value_range.clone()], heap)?;
    }
    Ok(buffer)
}

/// Read one member of an entry, copying it directly unless it requires translation through the POD bridge.
fn unmarshal_member<T: Element>(bytes: &[u8], heap: &VlenHeap) -> Result<T, MarshalError> {
    if !T::descriptor().requires_translation() {
        if let Some(value) = T::copy_from_pod(bytes) {
            return Ok(value);
        }
    }
    let physical = T::Physical::decode(bytes, heap)?;
    Ok(T::from_physical(&physical)?)
}

fn unmarshal_entries<K: Element, V: Element>(
    buffer: &PhysicalBuffer,
    mut insert: impl FnMut(K, V),
) -> Result<(), MarshalError> {
    let layout = entry_layout::<K, V>()?;
    let (key_range, value_range) = member_ranges(&layout);
    for index in 0..buffer.num_elements() {
        let slot = buffer.slot(index);
        let key = unmarshal_member::<K>(&slot[key_range.clone()], buffer.heap())?;
        let value = unmarshal_member::<V>(&slot[value_range.clone()], buffer.heap())?;
        insert(key, value);
    }
    Ok(())
}

impl<K: Element + Ord, V: Element> Container for BTreeMap<K, V> {
    fn element_datatype() -> Result<Datatype, MarshalError> {
        entry_layout::<K, V>().map(Datatype::Compound)
    }

    fn static_rank() -> Option<usize> {
        Some(1)
    }

    fn physical_shape(&self) -> Vec<u64> {
        vec![self.len() as u64]
    }

    fn marshal(&self) -> Result<PhysicalBytes<'_>, MarshalError> {
        Ok(marshal_entries(self.len(), self.iter())?.into())
    }

    fn unmarshal(_shape: &[u64], buffer: &PhysicalBuffer) -> Result<Self, MarshalError> {
        let mut map = Self::new();
        unmarshal_entries(buffer, |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}

impl<K: Element + Eq + Hash, V: Element, S: BuildHasher + Default> Container for HashMap<K, V, S> {
    fn element_datatype() -> Result<Datatype, MarshalError> {
        entry_layout::<K, V>().map(Datatype::Compound)
    }

    fn static_rank() -> Option<usize> {
        Some(1)
    }

    fn physical_shape(&self) -> Vec<u64> {
        vec![self.len() as u64]
    }

    fn marshal(&self) -> Result<PhysicalBytes<'_>, MarshalError> {
        Ok(marshal_entries(self.len(), self.iter())?.into())
    }

    fn unmarshal(_shape: &[u64], buffer: &PhysicalBuffer) -> Result<Self, MarshalError> {
        let mut map = Self::with_capacity_and_hasher(buffer.num_elements(), S::default());
        unmarshal_entries(buffer, |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}
