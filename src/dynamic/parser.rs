use crate::{
    container::{num_elements, MarshalError},
    datatype::{Datatype, StringSize, TypeClass, UnsupportedTypeError},
    element::{ElementError, InvalidElementValueError, LongDouble},
    node::ElementPath,
    physical::{Physical, PhysicalBuffer, VlenHeap, VlenString},
    storage::{ElementInfo, ReadableStorageTraits},
};

use super::{CompoundValue, DynamicValue};

/// How to reconstruct one stored value of a classified [`Datatype`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValuePlan {
    /// A boolean.
    Bool,
    /// An 8-bit signed integer.
    Int8,
    /// A 16-bit signed integer.
    Int16,
    /// A 32-bit signed integer.
    Int32,
    /// A 64-bit signed integer.
    Int64,
    /// An 8-bit unsigned integer.
    UInt8,
    /// A 16-bit unsigned integer.
    UInt16,
    /// A 32-bit unsigned integer.
    UInt32,
    /// A 64-bit unsigned integer.
    UInt64,
    /// A single precision float.
    Float32,
    /// A double precision float.
    Float64,
    /// A quadruple precision float.
    LongDouble,
    /// Null padded text of a fixed number of bytes.
    FixedString(usize),
    /// Variable length text.
    VlenString,
    /// A compound of flat members.
    Compound(Vec<MemberPlan>),
}

/// A compound member of a [`ValuePlan::Compound`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberPlan {
    name: String,
    offset: usize,
    size: usize,
    plan: ValuePlan,
}

impl MemberPlan {
    /// The member name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The byte offset of the member within the compound.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The member plan.
    #[must_use]
    pub const fn plan(&self) -> &ValuePlan {
        &self.plan
    }
}

fn integer_plan(precision: usize, signed: bool) -> Result<ValuePlan, UnsupportedTypeError> {
    match (precision, signed) {
        (8, true) => Ok(ValuePlan::Int8),
        (16, true) => Ok(ValuePlan::Int16),
        (32, true) => Ok(ValuePlan::Int32),
        (64, true) => Ok(ValuePlan::Int64),
        (8, false) => Ok(ValuePlan::UInt8),
        (16, false) => Ok(ValuePlan::UInt16),
        (32, false) => Ok(ValuePlan::UInt32),
        (64, false) => Ok(ValuePlan::UInt64),
        (precision, _) => Err(UnsupportedTypeError::Precision {
            class: TypeClass::Integer,
            precision,
        }),
    }
}

fn float_plan(precision: usize) -> Result<ValuePlan, UnsupportedTypeError> {
    match precision {
        32 => Ok(ValuePlan::Float32),
        64 => Ok(ValuePlan::Float64),
        128 => Ok(ValuePlan::LongDouble),
        precision => Err(UnsupportedTypeError::Precision {
            class: TypeClass::Float,
            precision,
        }),
    }
}

impl ValuePlan {
    /// Classify a stored datatype.
    ///
    /// # Errors
    /// Returns [`UnsupportedTypeError`] for a type class with no dynamic representation (bitfield, opaque, enumeration, reference, array), an unsupported integer or float precision, or a compound member that is itself a compound.
    pub fn classify(datatype: &Datatype) -> Result<Self, UnsupportedTypeError> {
        match datatype {
            Datatype::Boolean => Ok(Self::Bool),
            Datatype::Integer { precision, signed } => integer_plan(*precision, *signed),
            Datatype::Float { precision } => float_plan(*precision),
            Datatype::String(StringSize::Fixed(size)) => Ok(Self::FixedString(*size)),
            Datatype::String(StringSize::Variable) => Ok(Self::VlenString),
            Datatype::Compound(layout) => {
                let members = layout
                    .members()
                    .iter()
                    .map(|member| {
                        if member.datatype().is_compound() {
                            return Err(UnsupportedTypeError::NestedCompound(
                                member.name().to_string(),
                            ));
                        }
                        Ok(MemberPlan {
                            name: member.name().to_string(),
                            offset: member.offset(),
                            size: member.datatype().size(),
                            plan: Self::classify(member.datatype())?,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Compound(members))
            }
            datatype => Err(UnsupportedTypeError::Class(datatype.class())),
        }
    }

    /// Evaluate the plan on the bytes of one stored value.
    ///
    /// Variable length text is copied out of `heap` into an independent buffer, which is released once converted.
    ///
    /// # Errors
    /// Returns an [`ElementError`] if `slot` does not hold a valid value.
    pub fn evaluate(&self, slot: &[u8], heap: &VlenHeap) -> Result<DynamicValue, ElementError> {
        Ok(match self {
            Self::Bool => bool::decode(slot, heap)?.into(),
            Self::Int8 => i8::decode(slot, heap)?.into(),
            Self::Int16 => i16::decode(slot, heap)?.into(),
            Self::Int32 => i32::decode(slot, heap)?.into(),
            Self::Int64 => i64::decode(slot, heap)?.into(),
            Self::UInt8 => u8::decode(slot, heap)?.into(),
            Self::UInt16 => u16::decode(slot, heap)?.into(),
            Self::UInt32 => u32::decode(slot, heap)?.into(),
            Self::UInt64 => u64::decode(slot, heap)?.into(),
            Self::Float32 => f32::decode(slot, heap)?.into(),
            Self::Float64 => f64::decode(slot, heap)?.into(),
            Self::LongDouble => LongDouble::decode(slot, heap)?.into(),
            Self::FixedString(size) => {
                let bytes = slot.get(..*size).ok_or_else(|| {
                    InvalidElementValueError::new(format!(
                        "fixed length text of {size} bytes in a slot of {} bytes",
                        slot.len()
                    ))
                })?;
                let len = bytes.iter().position(|&byte| byte == 0).unwrap_or(*size);
                std::str::from_utf8(&bytes[..len])
                    .map_err(|err| {
                        InvalidElementValueError::new(format!("text is not UTF-8: {err}"))
                    })?
                    .into()
            }
            Self::VlenString => VlenString::decode(slot, heap)?.to_str()?.into(),
            Self::Compound(members) => {
                let mut value = CompoundValue::new();
                for member in members {
                    let bytes = member
                        .offset
                        .checked_add(member.size)
                        .and_then(|end| slot.get(member.offset..end))
                        .ok_or_else(|| {
                            InvalidElementValueError::new(format!(
                                "compound member {} is outside a slot of {} bytes",
                                member.name,
                                slot.len()
                            ))
                        })?;
                    value.push(member.name.clone(), member.plan.evaluate(bytes, heap)?);
                }
                value.into()
            }
        })
    }
}

/// The dynamic attribute parser.
///
/// A parser is created from the declared datatype and shape of a stored element.
/// Classification happens up front, so an unsupported element is rejected before any data is transferred.
#[derive(Clone, Debug)]
pub struct AttributeParser {
    datatype: Datatype,
    shape: Vec<u64>,
    plan: ValuePlan,
}

impl AttributeParser {
    /// Create a parser for an element with `info`.
    ///
    /// # Errors
    /// Returns [`UnsupportedTypeError`] if the datatype cannot be classified or the rank is 2 or more.
    pub fn new(info: &ElementInfo) -> Result<Self, UnsupportedTypeError> {
        let plan = ValuePlan::classify(info.datatype())?;
        if info.rank() > 1 {
            return Err(UnsupportedTypeError::Rank(info.rank()));
        }
        Ok(Self {
            datatype: info.datatype().clone(),
            shape: info.shape().to_vec(),
            plan,
        })
    }

    /// The value plan.
    #[must_use]
    pub const fn plan(&self) -> &ValuePlan {
        &self.plan
    }

    /// Read the element at `path` with a single bulk transfer and parse it.
    ///
    /// # Errors
    /// Returns a [`MarshalError`] if the buffer cannot be allocated, the transfer fails, or a stored value is invalid.
    pub fn read<TStorage: ?Sized + ReadableStorageTraits>(
        &self,
        storage: &TStorage,
        path: &ElementPath,
    ) -> Result<DynamicValue, MarshalError> {
        let mut buffer =
            PhysicalBuffer::allocate(self.datatype.size(), num_elements(&self.shape)?)?;
        storage.bulk_read(path, &self.datatype, &mut buffer)?;
        self.parse(&buffer)
    }

    /// Parse a physical buffer holding the element.
    ///
    /// A scalar produces a leaf value, a rank 1 element produces a [`DynamicValue::Sequence`].
    ///
    /// # Errors
    /// Returns [`MarshalError::InvalidElementValue`] if the buffer does not match the element or holds an invalid value.
    pub fn parse(&self, buffer: &PhysicalBuffer) -> Result<DynamicValue, MarshalError> {
        let expected = num_elements(&self.shape)?;
        if buffer.element_size() != self.datatype.size() || buffer.num_elements() != expected {
            return Err(InvalidElementValueError::new(format!(
                "a buffer of {} elements of {} bytes does not hold {expected} elements of {}",
                buffer.num_elements(),
                buffer.element_size(),
                self.datatype
            ))
            .into());
        }
        if self.shape.is_empty() {
            Ok(self.plan.evaluate(buffer.slot(0), buffer.heap())?)
        } else {
            let values = (0..expected)
                .map(|index| self.plan.evaluate(buffer.slot(index), buffer.heap()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynamicValue::Sequence(values))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        container::marshal_iter,
        datatype::CompoundLayout,
        element::{Element, FixedString, Vector3},
    };

    use super::*;

    fn parser(datatype: Datatype, shape: Vec<u64>) -> Result<AttributeParser, UnsupportedTypeError> {
        AttributeParser::new(&ElementInfo::new(datatype, shape))
    }

    #[test]
    fn classify_scalars() {
        assert_eq!(ValuePlan::classify(&Datatype::BOOL), Ok(ValuePlan::Bool));
        assert_eq!(ValuePlan::classify(&Datatype::INT16), Ok(ValuePlan::Int16));
        assert_eq!(ValuePlan::classify(&Datatype::UINT16), Ok(ValuePlan::UInt16));
        assert_eq!(
            ValuePlan::classify(&Datatype::FLOAT128),
            Ok(ValuePlan::LongDouble)
        );
        assert_eq!(
            ValuePlan::classify(&Datatype::String(StringSize::Fixed(4))),
            Ok(ValuePlan::FixedString(4))
        );
        assert_eq!(
            ValuePlan::classify(&Datatype::Integer {
                precision: 24,
                signed: true
            }),
            Err(UnsupportedTypeError::Precision {
                class: TypeClass::Integer,
                precision: 24
            })
        );
        assert_eq!(
            ValuePlan::classify(&Datatype::Float { precision: 16 }),
            Err(UnsupportedTypeError::Precision {
                class: TypeClass::Float,
                precision: 16
            })
        );
    }

    #[test]
    fn classify_unsupported_classes() {
        for (datatype, class) in [
            (Datatype::Bitfield { size: 1 }, TypeClass::Bitfield),
            (Datatype::Opaque { size: 4 }, TypeClass::Opaque),
            (
                Datatype::Enumeration {
                    base: Box::new(Datatype::INT32),
                },
                TypeClass::Enumeration,
            ),
            (Datatype::Reference, TypeClass::Reference),
            (
                Datatype::Array {
                    base: Box::new(Datatype::FLOAT64),
                    dimensions: vec![3],
                },
                TypeClass::Array,
            ),
        ] {
            assert_eq!(
                ValuePlan::classify(&datatype),
                Err(UnsupportedTypeError::Class(class))
            );
        }
    }

    #[test]
    fn classify_compound() {
        let plan = ValuePlan::classify(Vector3::descriptor().datatype()).unwrap();
        let ValuePlan::Compound(members) = plan else {
            panic!("not a compound plan")
        };
        assert_eq!(
            members
                .iter()
                .map(|member| (member.name(), member.offset()))
                .collect::<Vec<_>>(),
            vec![("X", 0), ("Y", 8), ("Z", 16)]
        );
        assert!(members
            .iter()
            .all(|member| member.plan() == &ValuePlan::Float64));

        let nested = CompoundLayout::builder()
            .member("id", Datatype::UINT32)
            .member("position", Vector3::descriptor().datatype().clone())
            .allow_nested()
            .build()
            .unwrap();
        assert_eq!(
            ValuePlan::classify(&nested.into()),
            Err(UnsupportedTypeError::NestedCompound("position".to_string()))
        );

        let with_bitfield = CompoundLayout::builder()
            .member("flags", Datatype::Bitfield { size: 2 })
            .build()
            .unwrap();
        assert_eq!(
            ValuePlan::classify(&with_bitfield.into()),
            Err(UnsupportedTypeError::Class(TypeClass::Bitfield))
        );
    }

    #[test]
    fn parse_compound_scalar() {
        let datatype = Vector3::descriptor().datatype().clone();
        let parser = parser(datatype, vec![]).unwrap();
        let buffer = marshal_iter(1, &[Vector3::new(1.0, 2.0, 3.0)]).unwrap();
        let value = parser.parse(&buffer).unwrap();
        let compound = value.as_compound().unwrap();
        assert_eq!(compound.len(), 3);
        assert_eq!(compound.get("X"), Some(&DynamicValue::Float64(1.0)));
        assert_eq!(compound.get("Y"), Some(&DynamicValue::Float64(2.0)));
        assert_eq!(compound.get("Z"), Some(&DynamicValue::Float64(3.0)));
    }

    #[test]
    fn parse_sequences() {
        let parser_i16 = parser(Datatype::INT16, vec![3]).unwrap();
        let buffer = marshal_iter(3, &[-1i16, 0, 1]).unwrap();
        assert_eq!(
            parser_i16.parse(&buffer).unwrap(),
            DynamicValue::Sequence(vec![(-1i16).into(), 0i16.into(), 1i16.into()])
        );

        let parser_text = parser(Datatype::VLEN_STRING, vec![2]).unwrap();
        let buffer = marshal_iter(2, &["a".to_string(), String::new()]).unwrap();
        assert_eq!(
            parser_text.parse(&buffer).unwrap(),
            DynamicValue::Sequence(vec!["a".into(), "".into()])
        );

        let parser_empty = parser(Datatype::FLOAT64, vec![0]).unwrap();
        let buffer = PhysicalBuffer::allocate(8, 0).unwrap();
        assert_eq!(
            parser_empty.parse(&buffer).unwrap(),
            DynamicValue::Sequence(vec![])
        );
    }

    #[test]
    fn parse_fixed_string() {
        let text = FixedString::<8>::new("units").unwrap();
        let parser = parser(FixedString::<8>::descriptor().datatype().clone(), vec![]).unwrap();
        let buffer = marshal_iter(1, &[text]).unwrap();
        assert_eq!(parser.parse(&buffer).unwrap(), DynamicValue::from("units"));

        let full = FixedString::<5>::new("units").unwrap();
        let parser = self::parser(FixedString::<5>::descriptor().datatype().clone(), vec![]).unwrap();
        let buffer = marshal_iter(1, &[full]).unwrap();
        assert_eq!(parser.parse(&buffer).unwrap(), DynamicValue::from("units"));
    }

    #[test]
    fn parse_rejects() {
        assert_eq!(
            parser(Datatype::FLOAT64, vec![2, 2]).unwrap_err(),
            UnsupportedTypeError::Rank(2)
        );
        let parser_bool = parser(Datatype::BOOL, vec![]).unwrap();
        let buffer = PhysicalBuffer::from_parts(vec![2], 1, VlenHeap::new()).unwrap();
        assert!(matches!(
            parser_bool.parse(&buffer),
            Err(MarshalError::InvalidElementValue(_))
        ));
        let buffer = PhysicalBuffer::allocate(1, 2).unwrap();
        assert!(matches!(
            parser_bool.parse(&buffer),
            Err(MarshalError::InvalidElementValue(_))
        ));
    }
}
