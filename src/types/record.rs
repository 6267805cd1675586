//! Decoded record type

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

use super::{FieldData, RecordSchema, Value};
use crate::{LinkError, Result};

/// One decoded fixed-width record from the telemetry stream.
///
/// Holds the raw window alongside the values decoded in schema order, so
/// both generic (`value`) and typed (`get`) lookups are cheap.
#[derive(Debug, Clone)]
pub struct Record {
    bytes: Arc<[u8]>,
    values: Vec<Value>,
    timestamp: u32,
    schema: Arc<RecordSchema>,
}

impl Record {
    pub(crate) fn new(
        bytes: Arc<[u8]>,
        values: Vec<Value>,
        timestamp: u32,
        schema: Arc<RecordSchema>,
    ) -> Self {
        Self { bytes, values, timestamp, schema }
    }

    /// Timestamp in milliseconds as reported by the device.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Raw wire bytes of this record.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decoded values in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Schema this record was decoded with.
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Decoded value by field name.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.schema.index_of(name).map(|idx| self.values[idx])
    }

    /// Typed lookup by field name.
    pub fn get<T: FieldData>(&self, name: &str) -> Result<T> {
        let spec = self
            .schema
            .field(name)
            .ok_or_else(|| LinkError::FieldNotFound { field: name.to_string() })?;
        T::from_bytes(&self.bytes, spec)
    }

    /// Iterate `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
        self.schema.fields().iter().map(|spec| spec.name.as_str()).zip(self.values.iter().copied())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes && self.schema == other.schema
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
