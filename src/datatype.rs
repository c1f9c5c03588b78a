//! Storage datatypes.
//!
//! A [`Datatype`] is the storage type tag of a stored element.
//! It fully determines the physical (POD) layout of one element: its size, alignment, and for a [`CompoundLayout`] the byte offset of every named member.

mod compound_layout;

use derive_more::Display;
use thiserror::Error;

pub use compound_layout::{
    CompoundLayout, CompoundLayoutBuilder, CompoundLayoutError, CompoundMember,
};

use crate::physical::VLEN_SLOT_SIZE;

/// The size of a string datatype.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StringSize {
    /// Fixed length text of the given number of bytes, null padded.
    Fixed(usize),
    /// Variable length text, stored out of line.
    Variable,
}

/// A storage datatype.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Datatype {
    /// A boolean stored in a single byte, `0` or `1`.
    Boolean,
    /// A two's complement or unsigned integer.
    Integer {
        /// The number of bits.
        precision: usize,
        /// Signedness.
        signed: bool,
    },
    /// An IEEE 754 floating point number.
    Float {
        /// The number of bits.
        precision: usize,
    },
    /// Text.
    String(StringSize),
    /// A compound of named, offset-addressed members.
    Compound(CompoundLayout),
    /// A bit field of `size` bytes.
    Bitfield {
        /// The size in bytes.
        size: usize,
    },
    /// Uninterpreted bytes.
    Opaque {
        /// The size in bytes.
        size: usize,
    },
    /// An enumeration over an integer base type.
    Enumeration {
        /// The base type.
        base: Box<Datatype>,
    },
    /// An object reference.
    Reference,
    /// A fixed size array of a base type.
    Array {
        /// The base type.
        base: Box<Datatype>,
        /// The array dimensions.
        dimensions: Vec<u64>,
    },
}

/// The class of a [`Datatype`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum TypeClass {
    /// [`Datatype::Boolean`].
    #[display("boolean")]
    Boolean,
    /// [`Datatype::Integer`].
    #[display("integer")]
    Integer,
    /// [`Datatype::Float`].
    #[display("float")]
    Float,
    /// [`Datatype::String`].
    #[display("string")]
    String,
    /// [`Datatype::Compound`].
    #[display("compound")]
    Compound,
    /// [`Datatype::Bitfield`].
    #[display("bitfield")]
    Bitfield,
    /// [`Datatype::Opaque`].
    #[display("opaque")]
    Opaque,
    /// [`Datatype::Enumeration`].
    #[display("enumeration")]
    Enumeration,
    /// [`Datatype::Reference`].
    #[display("reference")]
    Reference,
    /// [`Datatype::Array`].
    #[display("array")]
    Array,
}

/// An unsupported type error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnsupportedTypeError {
    /// A type class that has no dynamic representation.
    #[error("unsupported type class {0}")]
    Class(TypeClass),
    /// An integer or float with an unsupported number of bits.
    #[error("unsupported {class} precision of {precision} bits")]
    Precision {
        /// The type class.
        class: TypeClass,
        /// The number of bits.
        precision: usize,
    },
    /// A compound member that is itself a compound.
    #[error("compound member {0} is a compound, nested compounds are not supported")]
    NestedCompound(String),
    /// A stored rank other than 0 or 1.
    #[error("unsupported rank {0}, only scalars and rank 1 arrays are supported")]
    Rank(usize),
    /// An invalid compound layout.
    #[error(transparent)]
    Layout(CompoundLayoutError),
}

impl From<CompoundLayoutError> for UnsupportedTypeError {
    fn from(err: CompoundLayoutError) -> Self {
        match err {
            CompoundLayoutError::NestedCompound(member) => Self::NestedCompound(member),
            err => Self::Layout(err),
        }
    }
}

impl Datatype {
    /// `bool`.
    pub const BOOL: Self = Self::Boolean;
    /// 8-bit signed integer.
    pub const INT8: Self = Self::Integer {
        precision: 8,
        signed: true,
    };
    /// 16-bit signed integer.
    pub const INT16: Self = Self::Integer {
        precision: 16,
        signed: true,
    };
    /// 32-bit signed integer.
    pub const INT32: Self = Self::Integer {
        precision: 32,
        signed: true,
    };
    /// 64-bit signed integer.
    pub const INT64: Self = Self::Integer {
        precision: 64,
        signed: true,
    };
    /// 8-bit unsigned integer.
    pub const UINT8: Self = Self::Integer {
        precision: 8,
        signed: false,
    };
    /// 16-bit unsigned integer.
    pub const UINT16: Self = Self::Integer {
        precision: 16,
        signed: false,
    };
    /// 32-bit unsigned integer.
    pub const UINT32: Self = Self::Integer {
        precision: 32,
        signed: false,
    };
    /// 64-bit unsigned integer.
    pub const UINT64: Self = Self::Integer {
        precision: 64,
        signed: false,
    };
    /// IEEE 754 single-precision floating point.
    pub const FLOAT32: Self = Self::Float { precision: 32 };
    /// IEEE 754 double-precision floating point.
    pub const FLOAT64: Self = Self::Float { precision: 64 };
    /// IEEE 754 quadruple-precision floating point, the physical layout of a long double.
    pub const FLOAT128: Self = Self::Float { precision: 128 };
    /// Variable length text.
    pub const VLEN_STRING: Self = Self::String(StringSize::Variable);

    /// Returns the [`TypeClass`].
    #[must_use]
    pub const fn class(&self) -> TypeClass {
        match self {
            Self::Boolean => TypeClass::Boolean,
            Self::Integer { .. } => TypeClass::Integer,
            Self::Float { .. } => TypeClass::Float,
            Self::String(_) => TypeClass::String,
            Self::Compound(_) => TypeClass::Compound,
            Self::Bitfield { .. } => TypeClass::Bitfield,
            Self::Opaque { .. } => TypeClass::Opaque,
            Self::Enumeration { .. } => TypeClass::Enumeration,
            Self::Reference => TypeClass::Reference,
            Self::Array { .. } => TypeClass::Array,
        }
    }

    /// Returns the physical size of one element in bytes.
    ///
    /// Variable length text occupies a fixed size slot, its payload is stored out of line.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Boolean => 1,
            Self::Integer { precision, .. } | Self::Float { precision } => precision.div_ceil(8),
            Self::String(StringSize::Fixed(size))
            | Self::Bitfield { size }
            | Self::Opaque { size } => *size,
            Self::String(StringSize::Variable) => VLEN_SLOT_SIZE,
            Self::Compound(layout) => layout.size(),
            Self::Enumeration { base } => base.size(),
            Self::Reference => 8,
            Self::Array { base, dimensions } => {
                let num_elements = dimensions.iter().product::<u64>();
                usize::try_from(num_elements)
                    .map_or(usize::MAX, |n| n.saturating_mul(base.size()))
            }
        }
    }

    /// Returns the alignment of one element in bytes, following C struct layout rules.
    #[must_use]
    pub fn alignment(&self) -> usize {
        match self {
            Self::Integer { .. } | Self::Float { .. } => self.size().next_power_of_two().min(16),
            Self::String(StringSize::Variable) | Self::Reference => 8,
            Self::Compound(layout) => layout.alignment(),
            Self::Enumeration { base } | Self::Array { base, .. } => base.alignment(),
            Self::Boolean
            | Self::String(StringSize::Fixed(_))
            | Self::Bitfield { .. }
            | Self::Opaque { .. } => 1,
        }
    }

    /// Returns true if the datatype is a compound.
    #[must_use]
    pub const fn is_compound(&self) -> bool {
        matches!(self, Self::Compound(_))
    }

    /// Returns true if the physical representation holds out of line variable length data.
    #[must_use]
    pub fn has_vlen(&self) -> bool {
        match self {
            Self::String(StringSize::Variable) => true,
            Self::Compound(layout) => layout
                .members()
                .iter()
                .any(|member| member.datatype().has_vlen()),
            Self::Array { base, .. } | Self::Enumeration { base } => base.has_vlen(),
            _ => false,
        }
    }
}

impl core::fmt::Display for Datatype {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Boolean => write!(f, "bool"),
            Self::Integer { precision, signed } => {
                write!(f, "{}int{precision}", if *signed { "" } else { "u" })
            }
            Self::Float { precision } => write!(f, "float{precision}"),
            Self::String(StringSize::Variable) => write!(f, "string"),
            Self::String(StringSize::Fixed(size)) => write!(f, "string[{size}]"),
            Self::Compound(layout) => write!(f, "{layout}"),
            Self::Bitfield { size } => write!(f, "bitfield[{size}]"),
            Self::Opaque { size } => write!(f, "opaque[{size}]"),
            Self::Enumeration { base } => write!(f, "enum<{base}>"),
            Self::Reference => write!(f, "reference"),
            Self::Array { base, dimensions } => {
                write!(f, "array<{base}>{dimensions:?}")
            }
        }
    }
}

impl From<CompoundLayout> for Datatype {
    fn from(layout: CompoundLayout) -> Self {
        Self::Compound(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datatype_sizes() {
        assert_eq!(Datatype::BOOL.size(), 1);
        assert_eq!(Datatype::INT8.size(), 1);
        assert_eq!(Datatype::UINT16.size(), 2);
        assert_eq!(Datatype::INT32.size(), 4);
        assert_eq!(Datatype::UINT64.size(), 8);
        assert_eq!(Datatype::FLOAT32.size(), 4);
        assert_eq!(Datatype::FLOAT64.size(), 8);
        assert_eq!(Datatype::FLOAT128.size(), 16);
        assert_eq!(Datatype::VLEN_STRING.size(), VLEN_SLOT_SIZE);
        assert_eq!(Datatype::String(StringSize::Fixed(12)).size(), 12);
        assert_eq!(
            Datatype::Array {
                base: Box::new(Datatype::FLOAT32),
                dimensions: vec![2, 3]
            }
            .size(),
            24
        );
    }

    #[test]
    fn datatype_alignment() {
        assert_eq!(Datatype::INT8.alignment(), 1);
        assert_eq!(Datatype::FLOAT64.alignment(), 8);
        assert_eq!(Datatype::FLOAT128.alignment(), 16);
        assert_eq!(Datatype::VLEN_STRING.alignment(), 8);
        assert_eq!(Datatype::String(StringSize::Fixed(5)).alignment(), 1);
    }

    #[test]
    fn datatype_display() {
        assert_eq!(Datatype::INT16.to_string(), "int16");
        assert_eq!(Datatype::UINT64.to_string(), "uint64");
        assert_eq!(Datatype::FLOAT32.to_string(), "float32");
        assert_eq!(Datatype::VLEN_STRING.to_string(), "string");
        assert_eq!(Datatype::String(StringSize::Fixed(3)).to_string(), "string[3]");
        assert_eq!(TypeClass::Bitfield.to_string(), "bitfield");
    }

    #[test]
    fn datatype_equality_is_exact() {
        assert_ne!(Datatype::INT32, Datatype::UINT32);
        assert_ne!(Datatype::INT32, Datatype::INT64);
        assert_ne!(Datatype::FLOAT32, Datatype::INT32);
        assert_eq!(Datatype::FLOAT64.class(), TypeClass::Float);
    }

    #[test]
    fn datatype_has_vlen() {
        assert!(Datatype::VLEN_STRING.has_vlen());
        assert!(!Datatype::String(StringSize::Fixed(4)).has_vlen());
        let layout = CompoundLayout::builder()
            .member("Key", Datatype::INT32)
            .member("Value", Datatype::VLEN_STRING)
            .build()
            .unwrap();
        assert!(Datatype::from(layout).has_vlen());
    }
}
