//! Dynamically typed values.
//!
//! A [`DynamicValue`] is the result of reading a stored element whose type is only known at read time, typically an attribute.
//! The [`AttributeParser`] inspects the stored [`Datatype`](crate::datatype::Datatype) and shape, and reconstructs the value without any compile-time knowledge of what is stored:
//!  - a rank 0 element produces a leaf (a number, a boolean, text, or a [`CompoundValue`]),
//!  - a rank 1 element produces a [`DynamicValue::Sequence`] of leaves.

mod parser;

use derive_more::From;
use itertools::Itertools;
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::element::LongDouble;

pub use parser::{AttributeParser, MemberPlan, ValuePlan};

/// A dynamically typed value.
#[derive(Clone, Debug, PartialEq, From)]
pub enum DynamicValue {
    /// A boolean.
    Bool(bool),
    /// An 8-bit signed integer.
    Int8(i8),
    /// A 16-bit signed integer.
    Int16(i16),
    /// A 32-bit signed integer.
    Int32(i32),
    /// A 64-bit signed integer.
    Int64(i64),
    /// An 8-bit unsigned integer.
    UInt8(u8),
    /// A 16-bit unsigned integer.
    UInt16(u16),
    /// A 32-bit unsigned integer.
    UInt32(u32),
    /// A 64-bit unsigned integer.
    UInt64(u64),
    /// A single precision float.
    Float32(f32),
    /// A double precision float.
    Float64(f64),
    /// An extended precision float.
    LongDouble(LongDouble),
    /// Text.
    String(String),
    /// A sequence of values, in element order.
    Sequence(Vec<DynamicValue>),
    /// A compound of named values.
    Compound(CompoundValue),
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl DynamicValue {
    /// Returns the value if it is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        if let Self::Bool(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Returns the value as an [`i64`] if it is an integer that fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int8(value) => Some(value.into()),
            Self::Int16(value) => Some(value.into()),
            Self::Int32(value) => Some(value.into()),
            Self::Int64(value) => Some(value),
            Self::UInt8(value) => Some(value.into()),
            Self::UInt16(value) => Some(value.into()),
            Self::UInt32(value) => Some(value.into()),
            Self::UInt64(value) => i64::try_from(value).ok(),
            _ => None,
        }
    }

    /// Returns the value as a [`u64`] if it is a non-negative integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::UInt64(value) => Some(value),
            _ => self.as_i64().and_then(|value| u64::try_from(value).ok()),
        }
    }

    /// Returns the value as an [`f64`] if it is a float.
    ///
    /// A [`LongDouble`] is rounded to the nearest [`f64`].
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float32(value) => Some(value.into()),
            Self::Float64(value) => Some(value),
            Self::LongDouble(value) => Some(value.to_f64()),
            _ => None,
        }
    }

    /// Returns the text if the value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if let Self::String(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Returns the elements if the value is a sequence.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[DynamicValue]> {
        if let Self::Sequence(values) = self {
            Some(values.as_slice())
        } else {
            None
        }
    }

    /// Returns the members if the value is a compound.
    #[must_use]
    pub const fn as_compound(&self) -> Option<&CompoundValue> {
        if let Self::Compound(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Convert the value to JSON.
    ///
    /// A [`LongDouble`] is rounded to the nearest [`f64`], and a non-finite float becomes `null`.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if serialisation fails.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl core::fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int8(value) => write!(f, "{value}"),
            Self::Int16(value) => write!(f, "{value}"),
            Self::Int32(value) => write!(f, "{value}"),
            Self::Int64(value) => write!(f, "{value}"),
            Self::UInt8(value) => write!(f, "{value}"),
            Self::UInt16(value) => write!(f, "{value}"),
            Self::UInt32(value) => write!(f, "{value}"),
            Self::UInt64(value) => write!(f, "{value}"),
            Self::Float32(value) => write!(f, "{value}"),
            Self::Float64(value) => write!(f, "{value}"),
            Self::LongDouble(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Sequence(values) => write!(f, "[{}]", values.iter().format(", ")),
            Self::Compound(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for DynamicValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int8(value) => serializer.serialize_i8(*value),
            Self::Int16(value) => serializer.serialize_i16(*value),
            Self::Int32(value) => serializer.serialize_i32(*value),
            Self::Int64(value) => serializer.serialize_i64(*value),
            Self::UInt8(value) => serializer.serialize_u8(*value),
            Self::UInt16(value) => serializer.serialize_u16(*value),
            Self::UInt32(value) => serializer.serialize_u32(*value),
            Self::UInt64(value) => serializer.serialize_u64(*value),
            Self::Float32(value) => serializer.serialize_f32(*value),
            Self::Float64(value) => serializer.serialize_f64(*value),
            Self::LongDouble(value) => serializer.serialize_f64(value.to_f64()),
            Self::String(value) => serializer.serialize_str(value),
            Self::Sequence(values) => serializer.collect_seq(values),
            Self::Compound(value) => value.serialize(serializer),
        }
    }
}

/// The named member values of a compound, in declaration order.
///
/// Lookup is by name, the order is informational.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompoundValue(Vec<(String, DynamicValue)>);

impl CompoundValue {
    /// Create an empty compound value.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a member.
    pub fn push(&mut self, name: String, value: DynamicValue) {
        self.0.push((name, value));
    }

    /// Returns the value of the member `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DynamicValue> {
        self.0
            .iter()
            .find_map(|(member, value)| (member == name).then_some(value))
    }

    /// Iterate over the members in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DynamicValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the member names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// The number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the compound has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, DynamicValue)> for CompoundValue {
    fn from_iter<I: IntoIterator<Item = (S, DynamicValue)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }
}

impl core::fmt::Display for CompoundValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.iter()
                .format_with(", ", |(name, value), f| f(&format_args!("{name}: {value}")))
        )
    }
}

impl Serialize for CompoundValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
