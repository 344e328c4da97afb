//! Typed byte buffers for shader inputs, expected outputs and push constants.
//!
//! A [`TypedBuffer`] is a homogeneous run of scalars or small vectors serialized little-endian.
//! The element type travels with the bytes so mismatches can be reported as decoded values
//! instead of raw offsets.

use std::fmt;
use std::str::FromStr;

use half::f16;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F16,
    F32,
    F64,
}

impl ScalarType {
    pub const fn size(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 | ScalarType::F16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ScalarType::F16 | ScalarType::F32 | ScalarType::F64)
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::I8 => "i8",
            ScalarType::U8 => "u8",
            ScalarType::I16 => "i16",
            ScalarType::U16 => "u16",
            ScalarType::I32 => "i32",
            ScalarType::U32 => "u32",
            ScalarType::I64 => "i64",
            ScalarType::U64 => "u64",
            ScalarType::F16 => "f16",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    /// Decodes one little-endian scalar. `bytes` must hold at least [`ScalarType::size`] bytes.
    pub fn decode(self, bytes: &[u8]) -> ScalarValue {
        let mut raw = [0u8; 8];
        raw[..self.size()].copy_from_slice(&bytes[..self.size()]);
        match self {
            ScalarType::I8 => ScalarValue::Int(i8::from_le_bytes([raw[0]]).into()),
            ScalarType::U8 => ScalarValue::UInt(raw[0].into()),
            ScalarType::I16 => ScalarValue::Int(i16::from_le_bytes([raw[0], raw[1]]).into()),
            ScalarType::U16 => ScalarValue::UInt(u16::from_le_bytes([raw[0], raw[1]]).into()),
            ScalarType::I32 => {
                ScalarValue::Int(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]).into())
            }
            ScalarType::U32 => {
                ScalarValue::UInt(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]).into())
            }
            ScalarType::I64 => ScalarValue::Int(i64::from_le_bytes(raw)),
            ScalarType::U64 => ScalarValue::UInt(u64::from_le_bytes(raw)),
            ScalarType::F16 => ScalarValue::Float(f16::from_le_bytes([raw[0], raw[1]]).to_f64()),
            ScalarType::F32 => ScalarValue::Float(
                f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]).into(),
            ),
            ScalarType::F64 => ScalarValue::Float(f64::from_le_bytes(raw)),
        }
    }

    /// Encodes `value` as this scalar type, rejecting values the type cannot represent.
    pub fn encode(self, value: ScalarValue, out: &mut Vec<u8>) -> Result<(), BufferError> {
        let out_of_range = || BufferError::OutOfRange {
            value: value.to_string(),
            scalar: self,
        };
        macro_rules! int {
            ($ty:ty) => {{
                let v: $ty = match value {
                    ScalarValue::Int(v) => <$ty>::try_from(v).map_err(|_| out_of_range())?,
                    ScalarValue::UInt(v) | ScalarValue::Bits(v) => {
                        <$ty>::try_from(v).map_err(|_| out_of_range())?
                    }
                    ScalarValue::Float(_) => return Err(out_of_range()),
                };
                out.extend_from_slice(&v.to_le_bytes());
            }};
        }
        match self {
            ScalarType::I8 => int!(i8),
            ScalarType::U8 => int!(u8),
            ScalarType::I16 => int!(i16),
            ScalarType::U16 => int!(u16),
            ScalarType::I32 => int!(i32),
            ScalarType::U32 => int!(u32),
            ScalarType::I64 => int!(i64),
            ScalarType::U64 => int!(u64),
            ScalarType::F16 => match value {
                ScalarValue::Bits(v) => {
                    let bits = u16::try_from(v).map_err(|_| out_of_range())?;
                    out.extend_from_slice(&bits.to_le_bytes());
                }
                _ => out.extend_from_slice(&f16::from_f64(value.as_f64()).to_le_bytes()),
            },
            ScalarType::F32 => match value {
                ScalarValue::Bits(v) => {
                    let bits = u32::try_from(v).map_err(|_| out_of_range())?;
                    out.extend_from_slice(&bits.to_le_bytes());
                }
                _ => out.extend_from_slice(&(value.as_f64() as f32).to_le_bytes()),
            },
            ScalarType::F64 => match value {
                ScalarValue::Bits(v) => out.extend_from_slice(&v.to_le_bytes()),
                _ => out.extend_from_slice(&value.as_f64().to_le_bytes()),
            },
        }
        Ok(())
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = BufferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "i8" => ScalarType::I8,
            "u8" => ScalarType::U8,
            "i16" => ScalarType::I16,
            "u16" => ScalarType::U16,
            "i32" => ScalarType::I32,
            "u32" => ScalarType::U32,
            "i64" => ScalarType::I64,
            "u64" => ScalarType::U64,
            "f16" => ScalarType::F16,
            "f32" => ScalarType::F32,
            "f64" => ScalarType::F64,
            _ => return Err(BufferError::UnknownType(s.to_string())),
        };
        Ok(ty)
    }
}

/// Scalar type plus vector width (1 for scalars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementType {
    pub scalar: ScalarType,
    pub components: u8,
}

impl ElementType {
    pub const fn scalar(scalar: ScalarType) -> Self {
        Self {
            scalar,
            components: 1,
        }
    }

    pub fn vector(scalar: ScalarType, components: u8) -> Result<Self, BufferError> {
        if !(1..=4).contains(&components) {
            return Err(BufferError::InvalidComponents(components));
        }
        Ok(Self { scalar, components })
    }

    pub const fn size(self) -> usize {
        self.scalar.size() * self.components as usize
    }

    fn decode(self, bytes: &[u8]) -> ElementValue {
        let size = self.scalar.size();
        ElementValue(
            (0..self.components as usize)
                .map(|c| self.scalar.decode(&bytes[c * size..]))
                .collect(),
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components == 1 {
            write!(f, "{}", self.scalar)
        } else {
            write!(f, "{}x{}", self.scalar, self.components)
        }
    }
}

/// A type that can be stored in a [`TypedBuffer`].
pub trait Element: Copy + 'static {
    const TYPE: ElementType;

    fn write_le(&self, out: &mut Vec<u8>);

    /// Reads one element from the front of `bytes`, which holds at least `TYPE.size()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

/// Scalar element types; the building blocks of the vector impls.
pub trait ScalarElement: Element {}

macro_rules! scalar_element {
    ($($ty:ty => $scalar:ident),* $(,)?) => {$(
        impl Element for $ty {
            const TYPE: ElementType = ElementType::scalar(ScalarType::$scalar);

            fn write_le(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                <$ty>::from_le_bytes(raw)
            }
        }

        impl ScalarElement for $ty {}
    )*};
}

scalar_element! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f16 => F16,
    f32 => F32,
    f64 => F64,
}

macro_rules! vector_element {
    ($($n:literal),*) => {$(
        impl<T: ScalarElement> Element for [T; $n] {
            const TYPE: ElementType = ElementType {
                scalar: T::TYPE.scalar,
                components: $n,
            };

            fn write_le(&self, out: &mut Vec<u8>) {
                for v in self {
                    v.write_le(out);
                }
            }

            fn read_le(bytes: &[u8]) -> Self {
                let size = T::TYPE.size();
                std::array::from_fn(|i| T::read_le(&bytes[i * size..]))
            }
        }
    )*};
}

vector_element!(2, 3, 4);

/// A decoded scalar, widened for display and comparison in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    /// A raw bit pattern. Float types take it verbatim, so NaN payloads survive; integer types
    /// treat it like [`ScalarValue::UInt`].
    Bits(u64),
}

impl ScalarValue {
    pub fn as_f64(self) -> f64 {
        match self {
            ScalarValue::Int(v) => v as f64,
            ScalarValue::UInt(v) | ScalarValue::Bits(v) => v as f64,
            ScalarValue::Float(v) => v,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::UInt(v) => write!(f, "{v}"),
            ScalarValue::Float(v) => write!(f, "{v:?}"),
            ScalarValue::Bits(v) => write!(f, "{v:#x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValue(pub Vec<ScalarValue>);

impl fmt::Display for ElementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{single}"),
            components => {
                f.write_str("(")?;
                for (i, c) in components.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("buffer holds {actual} elements but {expected} was requested")]
    TypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },
    #[error("stride {stride} is smaller than the element size {size}")]
    StrideTooSmall { stride: usize, size: usize },
    #[error("{len} scalars do not divide into {components}-component elements")]
    ComponentCount { len: usize, components: u8 },
    #[error("vector width {0} is outside 1..=4")]
    InvalidComponents(u8),
    #[error("{value} does not fit in {scalar}")]
    OutOfRange { value: String, scalar: ScalarType },
    #[error("unknown scalar type `{0}`")]
    UnknownType(String),
}

/// Homogeneous, little-endian serialized data with its element layout.
///
/// With a stride larger than the element size each element is followed by zero padding, which
/// matches std140-style array layouts. The byte length is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedBuffer {
    element: ElementType,
    stride: usize,
    count: usize,
    bytes: Vec<u8>,
}

impl TypedBuffer {
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * T::TYPE.size());
        for v in values {
            v.write_le(&mut bytes);
        }
        Self {
            element: T::TYPE,
            stride: T::TYPE.size(),
            count: values.len(),
            bytes,
        }
    }

    pub fn with_stride<T: Element>(values: &[T], stride: usize) -> Result<Self, BufferError> {
        let size = T::TYPE.size();
        if stride < size {
            return Err(BufferError::StrideTooSmall { stride, size });
        }
        let mut bytes = Vec::with_capacity(values.len() * stride);
        for v in values {
            v.write_le(&mut bytes);
            bytes.resize(bytes.len() + stride - size, 0);
        }
        Ok(Self {
            element: T::TYPE,
            stride,
            count: values.len(),
            bytes,
        })
    }

    /// Builds a buffer from dynamically typed scalars, `element.components` per element.
    pub fn from_scalars(
        element: ElementType,
        values: &[ScalarValue],
        stride: Option<usize>,
    ) -> Result<Self, BufferError> {
        let components = usize::from(element.components);
        if components == 0 || values.len() % components != 0 {
            return Err(BufferError::ComponentCount {
                len: values.len(),
                components: element.components,
            });
        }
        let size = element.size();
        let stride = stride.unwrap_or(size);
        if stride < size {
            return Err(BufferError::StrideTooSmall { stride, size });
        }

        let count = values.len() / components;
        let mut bytes = Vec::with_capacity(count * stride);
        for chunk in values.chunks(components) {
            for v in chunk {
                element.scalar.encode(*v, &mut bytes)?;
            }
            bytes.resize(bytes.len() + stride - size, 0);
        }
        Ok(Self {
            element,
            stride,
            count,
            bytes,
        })
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn element(&self, index: usize) -> Option<ElementValue> {
        self.element_in(&self.bytes, index)
    }

    /// Decodes element `index` of `bytes` using this buffer's layout. Used to show what a
    /// read-back buffer holds where it differs from the expected contents.
    pub fn element_in(&self, bytes: &[u8], index: usize) -> Option<ElementValue> {
        let start = index.checked_mul(self.stride)?;
        let end = start.checked_add(self.element.size())?;
        let slice = bytes.get(start..end)?;
        Some(self.element.decode(slice))
    }

    /// Index of the element whose slot covers byte `offset`, including its padding.
    pub fn element_index(&self, offset: usize) -> Option<usize> {
        if self.stride == 0 {
            return None;
        }
        let index = offset / self.stride;
        (index < self.count).then_some(index)
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, BufferError> {
        if T::TYPE != self.element {
            return Err(BufferError::TypeMismatch {
                expected: T::TYPE,
                actual: self.element,
            });
        }
        Ok((0..self.count)
            .map(|i| T::read_le(&self.bytes[i * self.stride..]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalars_serialize_little_endian() {
        let buf = TypedBuffer::from_slice(&[1u32, 0x0102_0304]);
        assert_eq!(buf.bytes(), &[1, 0, 0, 0, 4, 3, 2, 1]);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.element_type(), ElementType::scalar(ScalarType::U32));

        let buf = TypedBuffer::from_slice(&[-1i16]);
        assert_eq!(buf.bytes(), &[0xff, 0xff]);

        let buf = TypedBuffer::from_slice(&[f16::from_f32(1.0)]);
        assert_eq!(buf.bytes(), &[0x00, 0x3c]);
    }

    #[test]
    fn vectors_round_trip_through_to_vec() {
        let values = [[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let buf = TypedBuffer::from_slice(&values);
        assert_eq!(buf.byte_len(), 24);
        assert_eq!(buf.element_type().to_string(), "f32x3");
        assert_eq!(buf.to_vec::<[f32; 3]>().unwrap(), values.to_vec());
        assert!(matches!(
            buf.to_vec::<f32>(),
            Err(BufferError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn stride_pads_each_element_with_zeros() {
        let buf = TypedBuffer::with_stride(&[[1u32, 2, 3], [4, 5, 6]], 16).unwrap();
        assert_eq!(buf.byte_len(), 32);
        assert_eq!(&buf.bytes()[12..16], &[0, 0, 0, 0]);
        assert_eq!(buf.to_vec::<[u32; 3]>().unwrap(), vec![[1, 2, 3], [4, 5, 6]]);
        assert_eq!(buf.element_index(13), Some(0));
        assert_eq!(buf.element_index(16), Some(1));
        assert_eq!(buf.element_index(32), None);

        assert_eq!(
            TypedBuffer::with_stride(&[1u64], 4),
            Err(BufferError::StrideTooSmall { stride: 4, size: 8 })
        );
    }

    #[test]
    fn elements_decode_for_diagnostics() {
        let buf = TypedBuffer::from_slice(&[[-1i32, 7]]);
        assert_eq!(buf.element(0).unwrap().to_string(), "(-1, 7)");
        assert_eq!(buf.element(1), None);

        let other = [0u8, 0, 0x80, 0x3f];
        let floats = TypedBuffer::from_slice(&[0.0f32]);
        assert_eq!(floats.element_in(&other, 0).unwrap().to_string(), "1.0");
        assert_eq!(floats.element_in(&other[..2], 0), None);
    }

    #[test]
    fn dynamic_scalars_are_range_checked() {
        let element = ElementType::scalar(ScalarType::I8);
        let buf = TypedBuffer::from_scalars(
            element,
            &[ScalarValue::Int(-128), ScalarValue::UInt(127)],
            None,
        )
        .unwrap();
        assert_eq!(buf.bytes(), &[0x80, 0x7f]);

        let err = TypedBuffer::from_scalars(element, &[ScalarValue::Int(200)], None).unwrap_err();
        assert!(matches!(err, BufferError::OutOfRange { .. }), "{err}");

        let vec2 = ElementType::vector(ScalarType::F32, 2).unwrap();
        let err =
            TypedBuffer::from_scalars(vec2, &[ScalarValue::Float(1.0)], None).unwrap_err();
        assert_eq!(
            err,
            BufferError::ComponentCount {
                len: 1,
                components: 2
            }
        );
        assert_eq!(
            ElementType::vector(ScalarType::F32, 5),
            Err(BufferError::InvalidComponents(5))
        );
    }

    #[test]
    fn raw_bits_are_stored_verbatim_in_floats() {
        let mut out = Vec::new();
        ScalarType::F32
            .encode(ScalarValue::Bits(0x7fc0_0001), &mut out)
            .unwrap();
        assert_eq!(out, 0x7fc0_0001u32.to_le_bytes());

        // The numeric path would round 0x7fc00001 to 2143289344.0 instead.
        let mut numeric = Vec::new();
        ScalarType::F32
            .encode(ScalarValue::UInt(0x7fc0_0001), &mut numeric)
            .unwrap();
        assert_ne!(numeric, out);

        out.clear();
        ScalarType::F16.encode(ScalarValue::Bits(0x7e01), &mut out).unwrap();
        assert_eq!(out, [0x01, 0x7e]);
        assert!(matches!(
            ScalarType::F16.encode(ScalarValue::Bits(0x1_0000), &mut out),
            Err(BufferError::OutOfRange { .. })
        ));

        out.clear();
        ScalarType::U16.encode(ScalarValue::Bits(0xbeef), &mut out).unwrap();
        assert_eq!(out, [0xef, 0xbe]);
        assert_eq!(ScalarValue::Bits(0x7fc0_0001).to_string(), "0x7fc00001");
    }

    #[test]
    fn scalar_type_names_parse() {
        assert_eq!("F16".parse::<ScalarType>().unwrap(), ScalarType::F16);
        assert_eq!(" u64 ".parse::<ScalarType>().unwrap(), ScalarType::U64);
        assert!("vec4".parse::<ScalarType>().is_err());
    }
}
