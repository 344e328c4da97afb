use half::f16;
use spvexec_asm::{SpecConstant, SpecValue};

use crate::buffer::{Element, ScalarType};
use crate::error::SpecError;

/// Type of one specialization entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecType {
    Bool,
    Scalar(ScalarType),
}

impl SpecType {
    pub const fn width(self) -> usize {
        match self {
            SpecType::Bool => 4,
            SpecType::Scalar(s) => s.size(),
        }
    }
}

/// Values accepted by [`SpecializationBlock::append`].
pub trait SpecScalar: Copy {
    const TYPE: SpecType;

    fn write_le(&self, out: &mut Vec<u8>);
}

impl SpecScalar for bool {
    const TYPE: SpecType = SpecType::Bool;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u32::from(*self).to_le_bytes());
    }
}

macro_rules! spec_scalar {
    ($($ty:ty),*) => {$(
        impl SpecScalar for $ty {
            const TYPE: SpecType = SpecType::Scalar(<$ty as Element>::TYPE.scalar);

            fn write_le(&self, out: &mut Vec<u8>) {
                Element::write_le(self, out);
            }
        }
    )*};
}

spec_scalar!(i8, u8, i16, u16, i32, u32, i64, u64, f16, f32, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecEntry {
    pub offset: usize,
    pub width: usize,
    pub ty: SpecType,
}

/// Append-only blob of specialization constant values.
///
/// Entry `i` specializes the constant decorated `SpecId i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecializationBlock {
    bytes: Vec<u8>,
    entries: Vec<SpecEntry>,
}

impl SpecializationBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` and returns its ordinal.
    pub fn append<T: SpecScalar>(&mut self, value: T) -> u32 {
        let offset = self.bytes.len();
        value.write_le(&mut self.bytes);
        self.entries.push(SpecEntry {
            offset,
            width: T::TYPE.width(),
            ty: T::TYPE,
        });
        (self.entries.len() - 1) as u32
    }

    /// Appends a dynamically typed value, as produced by the manifest loader.
    pub fn append_raw(&mut self, ty: SpecType, bytes: &[u8]) -> Result<u32, SpecError> {
        if bytes.len() != ty.width() {
            return Err(SpecError::SpecializationLength {
                expected: ty.width(),
                actual: bytes.len(),
            });
        }
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(bytes);
        self.entries.push(SpecEntry {
            offset,
            width: ty.width(),
            ty,
        });
        Ok((self.entries.len() - 1) as u32)
    }

    pub fn entries(&self) -> &[SpecEntry] {
        &self.entries
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that the blob is exactly the concatenation of its entries.
    pub fn validate(&self) -> Result<(), SpecError> {
        let mut expected = 0;
        for entry in &self.entries {
            if entry.offset != expected || entry.width != entry.ty.width() {
                return Err(SpecError::SpecializationLength {
                    expected,
                    actual: entry.offset,
                });
            }
            expected += entry.width;
        }
        if expected != self.bytes.len() {
            return Err(SpecError::SpecializationLength {
                expected,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    /// Converts the entries to literal words for binary patching.
    ///
    /// Values narrower than 32 bits occupy one word; signed integers are sign-extended to fill it.
    pub fn to_spec_constants(&self) -> Vec<SpecConstant> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let raw = &self.bytes[entry.offset..entry.offset + entry.width];
                SpecConstant {
                    spec_id: i as u32,
                    value: spec_value(entry.ty, raw),
                }
            })
            .collect()
    }
}

fn spec_value(ty: SpecType, raw: &[u8]) -> SpecValue {
    let word = |bytes: &[u8]| {
        let mut w = [0u8; 4];
        w[..bytes.len()].copy_from_slice(bytes);
        u32::from_le_bytes(w)
    };
    let scalar = match ty {
        SpecType::Bool => return SpecValue::Bool(word(raw) != 0),
        SpecType::Scalar(scalar) => scalar,
    };
    match scalar {
        ScalarType::I8 => SpecValue::Words(vec![i32::from(raw[0] as i8) as u32]),
        ScalarType::I16 => {
            SpecValue::Words(vec![i32::from(i16::from_le_bytes([raw[0], raw[1]])) as u32])
        }
        ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => {
            SpecValue::Words(vec![word(&raw[..4]), word(&raw[4..8])])
        }
        _ => SpecValue::Words(vec![word(raw)]),
    }
}
