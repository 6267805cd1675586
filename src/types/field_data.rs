//! Typed field extraction trait and implementations

use super::{FieldSpec, FieldType};
use crate::LinkError;

/// Trait for Rust types that can be read from a record field.
pub trait FieldData: Sized {
    /// The wire type this Rust type corresponds to.
    const FIELD_TYPE: FieldType;

    /// Convert raw little-endian bytes of exactly `FIELD_TYPE.size()` length.
    fn from_le(raw: &[u8]) -> Self;

    /// Parse this type from a record window at the field's offset.
    fn from_bytes(data: &[u8], spec: &FieldSpec) -> crate::Result<Self> {
        if spec.field_type != Self::FIELD_TYPE {
            return Err(LinkError::TypeConversion {
                details: format!(
                    "Field '{}' is {:?}, requested {:?}",
                    spec.name,
                    spec.field_type,
                    Self::FIELD_TYPE
                ),
            });
        }

        let size = Self::FIELD_TYPE.size();
        let raw = data.get(spec.offset..spec.offset + size).ok_or(LinkError::Decode {
            offset: spec.offset,
            needed: size,
            available: data.len().saturating_sub(spec.offset),
        })?;

        Ok(Self::from_le(raw))
    }
}

macro_rules! impl_field_data {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldData for $ty {
                const FIELD_TYPE: FieldType = FieldType::$variant;

                fn from_le(raw: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(raw);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_field_data! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
}

impl FieldData for bool {
    const FIELD_TYPE: FieldType = FieldType::Bool;

    fn from_le(raw: &[u8]) -> Self {
        raw[0] != 0
    }
}
