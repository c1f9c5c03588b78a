use crate::{
    datatype::{Datatype, StringSize},
    physical::decode_pod,
};

use super::{Element, ElementError, InvalidElementValueError, TypeDescriptor, TypeKind};

/// Fixed length text of `N` bytes, null padded.
///
/// Unlike [`String`], a fixed length string is POD: its in-memory layout is its physical layout.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FixedString<const N: usize>([u8; N]);

// SAFETY: a transparent wrapper of `[u8; N]`.
unsafe impl<const N: usize> bytemuck::Zeroable for FixedString<N> {}
// SAFETY: a transparent wrapper of `[u8; N]`.
unsafe impl<const N: usize> bytemuck::Pod for FixedString<N> {}

impl<const N: usize> FixedString<N> {
    /// Create a fixed length string from `text`, padding with null bytes.
    ///
    /// # Errors
    /// Returns [`InvalidElementValueError`] if `text` is longer than `N` bytes or contains a null byte.
    pub fn new(text: &str) -> Result<Self, InvalidElementValueError> {
        if text.len() > N {
            return Err(InvalidElementValueError::new(format!(
                "{text:?} is {} bytes, longer than the fixed length {N}",
                text.len()
            )));
        }
        if text.contains('\0') {
            return Err(InvalidElementValueError::new(format!(
                "{text:?} contains a null byte"
            )));
        }
        let mut bytes = [0; N];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Self(bytes))
    }

    /// The text bytes, up to the first null byte.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&byte| byte == 0).unwrap_or(N);
        &self.0[..len]
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

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> core::fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl<const N: usize> core::fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl<const N: usize> TryFrom<&str> for FixedString<N> {
    type Error = InvalidElementValueError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}

impl<const N: usize> Element for FixedString<N> {
    type Physical = [u8; N];

    fn descriptor() -> &'static TypeDescriptor {
        TypeDescriptor::registered::<Self>(|| {
            TypeDescriptor::new(
                "fixed_string",
                Datatype::String(StringSize::Fixed(N)),
                TypeKind::String,
                true,
            )
        })
    }

    fn to_physical(&self) -> Result<[u8; N], ElementError> {
        Ok(self.0)
    }

    fn from_physical(physical: &[u8; N]) -> Result<Self, ElementError> {
        Ok(Self(*physical))
    }

    fn as_pod_bytes(elements: &[Self]) -> Option<&[u8]> {
        Some(bytemuck::cast_slice(elements))
    }

    fn from_pod_bytes(bytes: &[u8]) -> Option<Vec<Self>> {
        if N == 0 {
            return bytes.is_empty().then(Vec::new);
        }
        (bytes.len() % N == 0).then(|| bytemuck::pod_collect_to_vec(bytes))
    }

    fn copy_from_pod(slot: &[u8]) -> Option<Self> {
        decode_pod(slot).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_string_new() {
        let text = FixedString::<8>::new("abc").unwrap();
        assert_eq!(text.as_bytes(), b"abc");
        assert_eq!(text.to_str().unwrap(), "abc");
        assert_eq!(text.to_string(), "abc");
        assert!(FixedString::<2>::new("abc").is_err());
        assert!(FixedString::<4>::new("a\0b").is_err());
        assert_eq!(FixedString::<3>::new("abc").unwrap().as_bytes(), b"abc");
    }

    #[test]
    fn fixed_string_descriptor() {
        let descriptor = FixedString::<12>::descriptor();
        assert_eq!(
            descriptor.datatype(),
            &Datatype::String(StringSize::Fixed(12))
        );
        assert!(descriptor.is_pod());
        assert!(!descriptor.requires_translation());
        assert_eq!(
            FixedString::<4>::descriptor().datatype(),
            &Datatype::String(StringSize::Fixed(4))
        );
    }

    #[test]
    fn fixed_string_pod_bytes() {
        let values = [
            FixedString::<4>::new("ab").unwrap(),
            FixedString::<4>::new("wxyz").unwrap(),
        ];
        let bytes = FixedString::as_pod_bytes(&values).unwrap();
        assert_eq!(bytes, b"ab\0\0wxyz");
        assert_eq!(FixedString::<4>::from_pod_bytes(bytes).unwrap(), values);
    }
}
