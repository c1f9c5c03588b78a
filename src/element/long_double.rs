use crate::{
    datatype::Datatype,
    physical::{decode_pod, encode_pod, OutOfMemoryError, Physical, VlenHeap},
};

use super::{Element, ElementError, TypeDescriptor, TypeKind};

const F64_EXPONENT_BIAS: i32 = 1023;
const F128_EXPONENT_BIAS: i32 = 16383;
const F128_EXPONENT_MAX: u128 = 0x7FFF;
const F128_MANTISSA_BITS: u32 = 112;
const F128_MANTISSA_MASK: u128 = (1 << F128_MANTISSA_BITS) - 1;
const MANTISSA_SHIFT: u32 = F128_MANTISSA_BITS - 52;

/// An extended precision floating point number, stored as an IEEE 754 binary128 (quadruple precision) value.
///
/// Every [`f64`] converts to a [`LongDouble`] exactly.
/// Arithmetic is out of scope: a [`LongDouble`] is a storage value converted to and from [`f64`].
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LongDouble([u8; 16]);

// SAFETY: a transparent wrapper of `[u8; 16]`.
unsafe impl bytemuck::Zeroable for LongDouble {}
// SAFETY: a transparent wrapper of `[u8; 16]`.
unsafe impl bytemuck::Pod for LongDouble {}

impl LongDouble {
    /// Create a [`LongDouble`] from its binary128 bit pattern.
    #[must_use]
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits.to_ne_bytes())
    }

    /// The binary128 bit pattern.
    #[must_use]
    pub const fn to_bits(self) -> u128 {
        u128::from_ne_bytes(self.0)
    }

    /// Convert an [`f64`] exactly.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let sign = u128::from(bits >> 63) << 127;
        let exponent = ((bits >> 52) & 0x7FF) as i32;
        let mantissa = u128::from(bits & ((1 << 52) - 1));

        let bits = if exponent == 0x7FF {
            // infinity or NaN, keeping the NaN payload
            sign | (F128_EXPONENT_MAX << F128_MANTISSA_BITS) | (mantissa << MANTISSA_SHIFT)
        } else if exponent == 0 && mantissa == 0 {
            sign
        } else if exponent == 0 {
            // subnormal f64 values are normal in binary128
            let msb = 127 - mantissa.leading_zeros();
            let exponent = (msb as i32 - 1074 + F128_EXPONENT_BIAS) as u128;
            let mantissa = (mantissa & ((1 << msb) - 1)) << (F128_MANTISSA_BITS - msb);
            sign | (exponent << F128_MANTISSA_BITS) | mantissa
        } else {
            let exponent = (exponent - F64_EXPONENT_BIAS + F128_EXPONENT_BIAS) as u128;
            sign | (exponent << F128_MANTISSA_BITS) | (mantissa << MANTISSA_SHIFT)
        };
        Self::from_bits(bits)
    }

    /// Convert to the nearest [`f64`], rounding ties to even.
    ///
    /// Values beyond the [`f64`] range become infinite, values below it become zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn to_f64(self) -> f64 {
        let bits = self.to_bits();
        let sign = ((bits >> 127) as u64) << 63;
        let exponent = ((bits >> F128_MANTISSA_BITS) & F128_EXPONENT_MAX) as i32;
        let mantissa = bits & F128_MANTISSA_MASK;

        if exponent == F128_EXPONENT_MAX as i32 {
            if mantissa == 0 {
                return f64::from_bits(sign | f64::INFINITY.to_bits());
            }
            let payload = (mantissa >> MANTISSA_SHIFT) as u64 | (1 << 51);
            return f64::from_bits(sign | (0x7FF << 52) | payload);
        }
        if exponent == 0 {
            // zero, or a binary128 subnormal far below the f64 range
            return f64::from_bits(sign);
        }

        let unbiased = exponent - F128_EXPONENT_BIAS;
        if unbiased > F64_EXPONENT_BIAS {
            return f64::from_bits(sign | f64::INFINITY.to_bits());
        }

        if unbiased >= 1 - F64_EXPONENT_BIAS {
            let mut exponent = unbiased + F64_EXPONENT_BIAS;
            let mut mantissa = round_shift_right(mantissa, MANTISSA_SHIFT);
            if mantissa == 1 << 52 {
                mantissa = 0;
                exponent += 1;
                if exponent >= 0x7FF {
                    return f64::from_bits(sign | f64::INFINITY.to_bits());
                }
            }
            f64::from_bits(sign | ((exponent as u64) << 52) | mantissa as u64)
        } else {
            // subnormal f64, a carry into bit 52 yields the smallest normal
            let shift = (-962 - unbiased) as u32;
            if shift > F128_MANTISSA_BITS + 1 {
                return f64::from_bits(sign);
            }
            let significand = (1 << F128_MANTISSA_BITS) | mantissa;
            f64::from_bits(sign | round_shift_right(significand, shift) as u64)
        }
    }
}

/// Shift right by `shift` bits, rounding to nearest with ties to even.
fn round_shift_right(value: u128, shift: u32) -> u128 {
    let truncated = value >> shift;
    let remainder = value & ((1 << shift) - 1);
    let half = 1 << (shift - 1);
    if remainder > half || (remainder == half && truncated & 1 == 1) {
        truncated + 1
    } else {
        truncated
    }
}

impl From<f64> for LongDouble {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl core::fmt::Debug for LongDouble {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "LongDouble({:?})", self.to_f64())
    }
}

impl core::fmt::Display for LongDouble {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl Physical for LongDouble {
    fn encode(self, slot: &mut [u8], _heap: &mut VlenHeap) -> Result<(), OutOfMemoryError> {
        encode_pod(&self, slot);
        Ok(())
    }

    fn decode(slot: &[u8], _heap: &VlenHeap) -> Result<Self, ElementError> {
        Ok(decode_pod(slot)?)
    }
}

impl Element for LongDouble {
    type Physical = Self;

    fn descriptor() -> &'static TypeDescriptor {
        static DESCRIPTOR: TypeDescriptor =
            TypeDescriptor::new("long_double", Datatype::FLOAT128, TypeKind::Scalar, true);
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
        super::pod_vec_from_bytes(bytes)
    }

    fn copy_from_pod(slot: &[u8]) -> Option<Self> {
        decode_pod(slot).ok()
    }
}
