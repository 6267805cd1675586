//! Record field type definitions

use serde::{Deserialize, Serialize};

/// Scalar wire types a record field may be declared with.
///
/// Multi-byte types are always little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "i8")]
    Int8,
    #[serde(rename = "u8")]
    UInt8,
    #[serde(rename = "i16")]
    Int16,
    #[serde(rename = "u16")]
    UInt16,
    #[serde(rename = "i32")]
    Int32,
    #[serde(rename = "u32")]
    UInt32,
    #[serde(rename = "f32")]
    Float32,
    #[serde(rename = "f64")]
    Float64,
    /// Single byte, non-zero is true
    #[serde(rename = "bool")]
    Bool,
}

impl FieldType {
    /// Returns the size in bytes of this type on the wire.
    pub const fn size(&self) -> usize {
        match self {
            FieldType::Int8 | FieldType::UInt8 | FieldType::Bool => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Int32 | FieldType::UInt32 | FieldType::Float32 => 4,
            FieldType::Float64 => 8,
        }
    }

    /// Decode a value of this type from the front of `bytes`.
    ///
    /// Returns `None` when fewer than [`size`](Self::size) bytes are available.
    pub fn read(&self, bytes: &[u8]) -> Option<Value> {
        let raw = bytes.get(..self.size())?;
        Some(match self {
            FieldType::Int8 => Value::Int8(raw[0] as i8),
            FieldType::UInt8 => Value::UInt8(raw[0]),
            FieldType::Bool => Value::Bool(raw[0] != 0),
            FieldType::Int16 => Value::Int16(i16::from_le_bytes([raw[0], raw[1]])),
            FieldType::UInt16 => Value::UInt16(u16::from_le_bytes([raw[0], raw[1]])),
            FieldType::Int32 => Value::Int32(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            FieldType::UInt32 => {
                Value::UInt32(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            FieldType::Float32 => {
                Value::Float32(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            FieldType::Float64 => Value::Float64(f64::from_le_bytes([
                raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
            ])),
        })
    }
}

/// Runtime value of a decoded record field.
///
/// Serializes untagged, so a record renders as a plain mapping of numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
    Bool(bool),
}

impl Value {
    /// The wire type this value encodes as.
    pub const fn field_type(&self) -> FieldType {
        match self {
            Value::Int8(_) => FieldType::Int8,
            Value::UInt8(_) => FieldType::UInt8,
            Value::Int16(_) => FieldType::Int16,
            Value::UInt16(_) => FieldType::UInt16,
            Value::Int32(_) => FieldType::Int32,
            Value::UInt32(_) => FieldType::UInt32,
            Value::Float32(_) => FieldType::Float32,
            Value::Float64(_) => FieldType::Float64,
            Value::Bool(_) => FieldType::Bool,
        }
    }

    /// Append the little-endian encoding of this value to `out`.
    pub fn write_le(&self, out: &mut Vec<u8>) {
        match *self {
            Value::Int8(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt8(v) => out.push(v),
            Value::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Float32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Float64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Bool(v) => out.push(u8::from(v)),
        }
    }

    /// Lossless widening to `f64`, for display and diagnostics.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int8(v) => v.into(),
            Value::UInt8(v) => v.into(),
            Value::Int16(v) => v.into(),
            Value::UInt16(v) => v.into(),
            Value::Int32(v) => v.into(),
            Value::UInt32(v) => v.into(),
            Value::Float32(v) => v.into(),
            Value::Float64(v) => v,
            Value::Bool(v) => u8::from(v).into(),
        }
    }
}
