//! The physical (POD) representation of stored elements.
//!
//! A [`PhysicalBuffer`] is a contiguous block of `element_size * num_elements` bytes, one fixed size slot per element.
//! Variable length payloads (text) do not fit a fixed size slot, so each buffer owns a [`VlenHeap`] of out of line payloads and the slot holds a handle into it.
//! A variable length slot is [`VLEN_SLOT_SIZE`] bytes: a native endian `u64` heap handle (`0` is null) followed by a native endian `u64` payload length.
//!
//! Buffers and their heaps are released by [`Drop`], on every exit path.

use thiserror::Error;

use crate::{
    config::global_config,
    element::{ElementError, InvalidElementValueError},
};

/// The size of a variable length slot in bytes.
pub const VLEN_SLOT_SIZE: usize = 16;

/// A physical buffer allocation failure.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("failed to allocate a physical buffer of {0} bytes")]
pub struct OutOfMemoryError(usize);

impl OutOfMemoryError {
    /// Create a new out of memory error for a request of `size` bytes.
    #[must_use]
    pub const fn new(size: usize) -> Self {
        Self(size)
    }

    /// The number of bytes requested.
    #[must_use]
    pub const fn requested(&self) -> usize {
        self.0
    }
}

/// Allocate `size` zeroed bytes, failing instead of aborting if the allocation cannot be satisfied.
///
/// # Errors
/// Returns [`OutOfMemoryError`] if `size` exceeds the [buffer size limit](crate::config::Config#buffer-size-limit) or the allocator fails.
pub fn try_alloc_zeroed(size: usize) -> Result<Vec<u8>, OutOfMemoryError> {
    let limit = global_config().buffer_size_limit();
    if size > limit {
        return Err(OutOfMemoryError(size));
    }
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(size)
        .map_err(|_| OutOfMemoryError(size))?;
    bytes.resize(size, 0);
    Ok(bytes)
}

/// Out of line variable length payloads owned by a [`PhysicalBuffer`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VlenHeap {
    payloads: Vec<Box<[u8]>>,
}

static EMPTY_HEAP: VlenHeap = VlenHeap {
    payloads: Vec::new(),
};

impl VlenHeap {
    /// Create an empty heap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            payloads: Vec::new(),
        }
    }

    /// Take ownership of `payload` and return its non-null handle.
    ///
    /// # Errors
    /// Returns [`OutOfMemoryError`] if the heap cannot grow.
    pub fn push(&mut self, payload: Box<[u8]>) -> Result<u64, OutOfMemoryError> {
        self.payloads
            .try_reserve(1)
            .map_err(|_| OutOfMemoryError(core::mem::size_of::<Box<[u8]>>()))?;
        self.payloads.push(payload);
        Ok(self.payloads.len() as u64)
    }

    /// Returns the payload with `handle`, or [`None`] for a null or dangling handle.
    #[must_use]
    pub fn get(&self, handle: u64) -> Option<&[u8]> {
        let index = usize::try_from(handle.checked_sub(1)?).ok()?;
        self.payloads.get(index).map(AsRef::as_ref)
    }

    /// The number of payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Returns true if the heap holds no payloads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// The total size of all payloads in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payloads.iter().map(|payload| payload.len()).sum()
    }
}

/// Write a variable length slot.
///
/// # Panics
/// Panics if `slot` is not [`VLEN_SLOT_SIZE`] bytes.
pub fn write_vlen_slot(slot: &mut [u8], handle: u64, len: u64) {
    slot[..8].copy_from_slice(&handle.to_ne_bytes());
    slot[8..VLEN_SLOT_SIZE].copy_from_slice(&len.to_ne_bytes());
}

/// Read the `(handle, length)` of a variable length slot.
///
/// # Errors
/// Returns [`InvalidElementValueError`] if `slot` is not [`VLEN_SLOT_SIZE`] bytes.
pub fn read_vlen_slot(slot: &[u8]) -> Result<(u64, u64), InvalidElementValueError> {
    let [handle, len] = decode_pod::<[u64; 2]>(slot)?;
    Ok((handle, len))
}

/// Resolve the payload referenced by a variable length slot.
///
/// A null handle resolves to an empty payload.
///
/// # Errors
/// Returns [`InvalidElementValueError`] if the slot is malformed, the handle is dangling, or the recorded length exceeds the payload.
pub fn resolve_vlen<'h>(slot: &[u8], heap: &'h VlenHeap) -> Result<&'h [u8], ElementError> {
    let (handle, len) = read_vlen_slot(slot)?;
    if handle == 0 {
        return Ok(&[]);
    }
    let payload = heap.get(handle).ok_or_else(|| {
        InvalidElementValueError::new(format!("dangling variable length handle {handle}"))
    })?;
    usize::try_from(len)
        .ok()
        .and_then(|len| payload.get(..len))
        .ok_or_else(|| {
            InvalidElementValueError::new(format!(
                "variable length {len} exceeds the payload of {} bytes",
                payload.len()
            ))
            .into()
        })
}

/// A null terminated, owned text buffer: the physical representation of a variable length string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VlenString(Box<[u8]>);

impl VlenString {
    /// Copy `text` into a new buffer of `text.len() + 1` bytes, the last of which is the null terminator.
    ///
    /// # Errors
    /// Returns [`OutOfMemoryError`] if the allocation fails.
    pub fn new(text: &str) -> Result<Self, OutOfMemoryError> {
        Self::from_bytes(text.as_bytes())
    }

    /// Copy `bytes` into a new null terminated buffer.
    ///
    /// # Errors
    /// Returns [`OutOfMemoryError`] if the allocation fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OutOfMemoryError> {
        let size = bytes.len() + 1;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| OutOfMemoryError(size))?;
        buffer.extend_from_slice(bytes);
        buffer.push(0);
        Ok(Self(buffer.into_boxed_slice()))
    }

    /// The text bytes, excluding the null terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..self.0.len() - 1]
    }

    /// The text bytes, including the null terminator.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.0
    }

    /// The text as a [`str`].
    ///
    /// # Errors
    /// Returns [`InvalidElementValueError`] if the text is not valid UTF-8.
    pub fn to_str(&self) -> Result<&str, InvalidElementValueError> {
        std::str::from_utf8(self.as_bytes())
            .map_err(|err| InvalidElementValueError::new(format!("text is not UTF-8: {err}")))
    }
}

/// The codec between a physical value and its fixed size slot in a [`PhysicalBuffer`].
pub trait Physical: Sized {
    /// Encode `self` into `slot`, moving any out of line payload into `heap`.
    ///
    /// # Errors
    /// Returns [`OutOfMemoryError`] if `heap` cannot take ownership of a payload.
    fn encode(self, slot: &mut [u8], heap: &mut VlenHeap) -> Result<(), OutOfMemoryError>;

    /// Decode a value from `slot`, copying any out of line payload from `heap`.
    ///
    /// # Errors
    /// Returns an [`ElementError`] if the slot does not hold a valid value or an allocation fails.
    fn decode(slot: &[u8], heap: &VlenHeap) -> Result<Self, ElementError>;
}

/// Encode a [`bytemuck::Pod`] value into `slot`.
///
/// # Panics
/// Panics if `slot` is not `size_of::<T>()` bytes.
pub fn encode_pod<T: bytemuck::Pod>(value: &T, slot: &mut [u8]) {
    slot.copy_from_slice(bytemuck::bytes_of(value));
}

/// Decode a [`bytemuck::Pod`] value from `slot`.
///
/// # Errors
/// Returns [`InvalidElementValueError`] if `slot` is not `size_of::<T>()` bytes.
pub fn decode_pod<T: bytemuck::Pod>(slot: &[u8]) -> Result<T, InvalidElementValueError> {
    bytemuck::try_pod_read_unaligned(slot).map_err(|err| {
        InvalidElementValueError::new(format!(
            "a slot of {} bytes cannot hold a {}: {err}",
            slot.len(),
            core::any::type_name::<T>()
        ))
    })
}

macro_rules! impl_physical_pod {
    ($($raw_type:ty),*) => {
        $(
            impl Physical for $raw_type {
                fn encode(self, slot: &mut [u8], _heap: &mut VlenHeap) -> Result<(), OutOfMemoryError> {
                    encode_pod(&self, slot);
                    Ok(())
                }

                fn decode(slot: &[u8], _heap: &VlenHeap) -> Result<Self, ElementError> {
                    Ok(decode_pod(slot)?)
                }
            }
        )*
    };
}

impl_physical_pod!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl<const N: usize> Physical for [u8; N] {
    fn encode(self, slot: &mut [u8], _heap: &mut VlenHeap) -> Result<(), OutOfMemoryError> {
        slot.copy_from_slice(&self);
        Ok(())
    }

    fn decode(slot: &[u8], _heap: &VlenHeap) -> Result<Self, ElementError> {
        Ok(decode_pod(slot)?)
    }
}

impl Physical for bool {
    fn encode(self, slot: &mut [u8], _heap: &mut VlenHeap) -> Result<(), OutOfMemoryError> {
        slot[0] = u8::from(self);
        Ok(())
    }

    fn decode(slot: &[u8], _heap: &VlenHeap) -> Result<Self, ElementError> {
        match slot {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(InvalidElementValueError::new(format!(
                "{slot:?} is not a valid boolean, expected [0] or [1]"
            ))
            .into()),
        }
    }
}

impl Physical for VlenString {
    fn encode(self, slot: &mut [u8], heap: &mut VlenHeap) -> Result<(), OutOfMemoryError> {
        let len = self.as_bytes().len() as u64;
        let handle = heap.push(self.0)?;
        write_vlen_slot(slot, handle, len);
        Ok(())
    }

    fn decode(slot: &[u8], heap: &VlenHeap) -> Result<Self, ElementError> {
        Ok(Self::from_bytes(resolve_vlen(slot, heap)?)?)
    }
}

/// A physical buffer of fixed size element slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhysicalBuffer {
    bytes: Vec<u8>,
    element_size: usize,
    num_elements: usize,
    heap: VlenHeap,
}

impl PhysicalBuffer {
    /// Allocate a zeroed buffer of exactly `element_size * num_elements` bytes.
    ///
    /// # Errors
    /// Returns [`OutOfMemoryError`] if the size overflows, exceeds the configured limit, or cannot be allocated.
    pub fn allocate(element_size: usize, num_elements: usize) -> Result<Self, OutOfMemoryError> {
        let size = element_size
            .checked_mul(num_elements)
            .ok_or(OutOfMemoryError(usize::MAX))?;
        Ok(Self {
            bytes: try_alloc_zeroed(size)?,
            element_size,
            num_elements,
            heap: VlenHeap::new(),
        })
    }

    /// Create a buffer from existing `bytes` and `heap`.
    ///
    /// Returns [`None`] if the length of `bytes` is not a multiple of a non-zero `element_size`.
    #[must_use]
    pub fn from_parts(bytes: Vec<u8>, element_size: usize, heap: VlenHeap) -> Option<Self> {
        let num_elements = if element_size == 0 {
            bytes.is_empty().then_some(0)?
        } else {
            (bytes.len() % element_size == 0).then_some(bytes.len() / element_size)?
        };
        Some(Self {
            bytes,
            element_size,
            num_elements,
            heap,
        })
    }

    /// The size of one element slot in bytes.
    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.element_size
    }

    /// The number of element slots.
    #[must_use]
    pub const fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// The buffer bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The variable length heap.
    #[must_use]
    pub const fn heap(&self) -> &VlenHeap {
        &self.heap
    }

    /// Mutable access to the bytes and the variable length heap, for a bulk read.
    pub fn parts_mut(&mut self) -> (&mut [u8], &mut VlenHeap) {
        (&mut self.bytes, &mut self.heap)
    }

    /// Consume the buffer, returning its bytes and variable length heap.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, VlenHeap) {
        (self.bytes, self.heap)
    }

    /// The bytes of slot `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn slot(&self, index: usize) -> &[u8] {
        &self.bytes[index * self.element_size..(index + 1) * self.element_size]
    }

    /// Mutable access to slot `index` and the variable length heap.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn slot_mut(&mut self, index: usize) -> (&mut [u8], &mut VlenHeap) {
        let range = index * self.element_size..(index + 1) * self.element_size;
        (&mut self.bytes[range], &mut self.heap)
    }

    /// Encode `value` into slot `index`.
    ///
    /// # Errors
    /// Returns [`OutOfMemoryError`] if an out of line payload cannot be stored.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn store<P: Physical>(&mut self, index: usize, value: P) -> Result<(), OutOfMemoryError> {
        let (slot, heap) = self.slot_mut(index);
        value.encode(slot, heap)
    }

    /// Decode the value in slot `index`.
    ///
    /// # Errors
    /// Returns an [`ElementError`] if the slot does not hold a valid value.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn load<P: Physical>(&self, index: usize) -> Result<P, ElementError> {
        P::decode(self.slot(index), &self.heap)
    }
}

/// Physical bytes handed to a bulk write.
///
/// Contiguous POD containers lend their backing memory directly, everything else is marshaled into an owned [`PhysicalBuffer`].
#[derive(Debug)]
pub enum PhysicalBytes<'a> {
    /// Borrowed backing memory of a POD container. It never holds variable length handles.
    Borrowed(&'a [u8]),
    /// An owned, marshaled buffer.
    Owned(PhysicalBuffer),
}

impl PhysicalBytes<'_> {
    /// The bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Borrowed(bytes) => bytes,
            Self::Owned(buffer) => buffer.bytes(),
        }
    }

    /// The variable length heap.
    #[must_use]
    pub fn heap(&self) -> &VlenHeap {
        match self {
            Self::Borrowed(_) => &EMPTY_HEAP,
            Self::Owned(buffer) => buffer.heap(),
        }
    }

    /// Returns true if the bytes are borrowed from the container.
    #[must_use]
    pub const fn is_borrowed(&self) -> bool {
        matches!(self, Self::Borrowed(_))
    }
}

impl From<PhysicalBuffer> for PhysicalBytes<'_> {
    fn from(buffer: PhysicalBuffer) -> Self {
        Self::Owned(buffer)
    }
}

impl<'a> From<&'a [u8]> for PhysicalBytes<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Borrowed(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_buffer_allocate() {
        let buffer = PhysicalBuffer::allocate(8, 10).unwrap();
        assert_eq!(buffer.bytes().len(), 80);
        assert_eq!(buffer.num_elements(), 10);
        assert!(buffer.bytes().iter().all(|&b| b == 0));
        assert_eq!(
            PhysicalBuffer::allocate(usize::MAX, 2),
            Err(OutOfMemoryError(usize::MAX))
        );
        assert!(PhysicalBuffer::allocate(1, usize::MAX).is_err());
    }

    #[test]
    fn physical_buffer_store_load() {
        let mut buffer = PhysicalBuffer::allocate(8, 3).unwrap();
        buffer.store(1, -1.5f64).unwrap();
        assert_eq!(buffer.load::<f64>(0).unwrap(), 0.0);
        assert_eq!(buffer.load::<f64>(1).unwrap(), -1.5);
        assert!(buffer.load::<u32>(1).is_err());
    }

    #[test]
    fn physical_bool() {
        let heap = VlenHeap::new();
        assert!(bool::decode(&[1], &heap).unwrap());
        assert!(!bool::decode(&[0], &heap).unwrap());
        assert!(matches!(
            bool::decode(&[2], &heap),
            Err(ElementError::InvalidElementValue(_))
        ));
    }

    #[test]
    fn vlen_string() {
        let text = VlenString::new("hello").unwrap();
        assert_eq!(text.as_bytes_with_nul(), b"hello\0");
        assert_eq!(text.to_str().unwrap(), "hello");
        let empty = VlenString::new("").unwrap();
        assert_eq!(empty.as_bytes_with_nul(), b"\0");

        let mut buffer = PhysicalBuffer::allocate(VLEN_SLOT_SIZE, 2).unwrap();
        buffer.store(0, text.clone()).unwrap();
        buffer.store(1, empty.clone()).unwrap();
        assert_eq!(buffer.heap().len(), 2);
        assert_eq!(buffer.heap().payload_size(), 7);
        assert_eq!(buffer.load::<VlenString>(0).unwrap(), text);
        assert_eq!(buffer.load::<VlenString>(1).unwrap(), empty);
    }

    #[test]
    fn vlen_null_and_dangling() {
        let heap = VlenHeap::new();
        let mut slot = [0u8; VLEN_SLOT_SIZE];
        assert_eq!(resolve_vlen(&slot, &heap).unwrap(), b"");
        write_vlen_slot(&mut slot, 3, 1);
        assert!(resolve_vlen(&slot, &heap).is_err());
        assert!(read_vlen_slot(&slot[..8]).is_err());
    }

    #[test]
    fn physical_buffer_from_parts() {
        assert!(PhysicalBuffer::from_parts(vec![0; 12], 4, VlenHeap::new()).is_some());
        assert!(PhysicalBuffer::from_parts(vec![0; 13], 4, VlenHeap::new()).is_none());
        assert!(PhysicalBuffer::from_parts(vec![], 0, VlenHeap::new()).is_some());
    }
}
