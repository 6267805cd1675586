//! Declarative record schema

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{FieldType, Record, Value};
use crate::{LinkError, Result};

/// One entry of a schema declaration: a field name and its wire type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type }
    }
}

/// A field with its resolved position inside the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name, unique within the schema
    pub name: String,
    /// Wire type
    pub field_type: FieldType,
    /// Byte offset from the start of the record
    pub offset: usize,
}

impl FieldSpec {
    /// Byte offset one past the end of this field.
    pub fn end(&self) -> usize {
        self.offset + self.field_type.size()
    }
}

const REFERENCE_FIELDS: [(&str, FieldType); 7] = [
    ("reading1", FieldType::UInt16),
    ("reading2", FieldType::UInt16),
    ("reading3", FieldType::UInt16),
    ("reading4", FieldType::UInt16),
    ("reading5", FieldType::UInt16),
    ("reading6", FieldType::UInt16),
    ("time_ms", FieldType::UInt32),
];
const REFERENCE_TIMESTAMP: usize = 6;

/// Serialized shape of a schema: the declaration, not the derived layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDefinition {
    timestamp: String,
    fields: Vec<FieldDef>,
}

/// Fixed-width record layout shared with the remote encoder.
///
/// Fields are packed in declaration order with no padding, so the record
/// width and every offset follow from the ordered list of `(name, type)`
/// pairs. One `u32` field is designated as the record timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDefinition", into = "SchemaDefinition")]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
    index: HashMap<String, usize>,
    timestamp_index: usize,
    record_width: usize,
}

impl RecordSchema {
    /// Lay out `fields` in order and validate the result.
    pub fn new(fields: Vec<FieldDef>, timestamp: &str) -> Result<Self> {
        if fields.is_empty() {
            return Err(LinkError::schema_error("schema declares no fields"));
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for (position, def) in fields.iter().enumerate() {
            if def.name.is_empty() {
                return Err(LinkError::schema_error(format!(
                    "field {position} has an empty name"
                )));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(LinkError::schema_error(format!(
                    "field '{}' is declared more than once",
                    def.name
                )));
            }
        }

        let timestamp_index = fields.iter().position(|def| def.name == timestamp).ok_or_else(|| {
            LinkError::schema_error(format!("timestamp field '{timestamp}' is not declared"))
        })?;
        if fields[timestamp_index].field_type != FieldType::UInt32 {
            return Err(LinkError::schema_error(format!(
                "timestamp field '{timestamp}' must be u32, found {:?}",
                fields[timestamp_index].field_type
            )));
        }

        Ok(Self::layout(fields, timestamp_index))
    }

    /// Pack already validated fields in declaration order.
    fn layout(fields: Vec<FieldDef>, timestamp_index: usize) -> Self {
        let mut specs = Vec::with_capacity(fields.len());
        let mut index = HashMap::with_capacity(fields.len());
        let mut offset = 0;

        for def in fields {
            index.insert(def.name.clone(), specs.len());
            let spec = FieldSpec { name: def.name, field_type: def.field_type, offset };
            offset = spec.end();
            specs.push(spec);
        }

        Self { fields: specs, index, timestamp_index, record_width: offset }
    }

    /// The reference layout: six `u16` readings followed by a `u32`
    /// millisecond timestamp, 16 bytes in total.
    pub fn reference() -> Self {
        let fields = REFERENCE_FIELDS
            .iter()
            .map(|(name, field_type)| FieldDef::new(*name, *field_type))
            .collect();
        Self::layout(fields, REFERENCE_TIMESTAMP)
    }

    /// Total size of one record in bytes.
    pub fn record_width(&self) -> usize {
        self.record_width
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Get a field by name (O(1) lookup).
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index_of(name).map(|idx| &self.fields[idx])
    }

    /// Position of a field in declaration order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// The designated timestamp field.
    pub fn timestamp_field(&self) -> &FieldSpec {
        &self.fields[self.timestamp_index]
    }

    /// Decode one record from a window of exactly one record width.
    pub fn decode(self: &Arc<Self>, window: &[u8]) -> Result<Record> {
        if window.len() != self.record_width {
            return Err(LinkError::Decode {
                offset: 0,
                needed: self.record_width,
                available: window.len(),
            });
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            let value = window.get(spec.offset..).and_then(|rest| spec.field_type.read(rest)).ok_or(
                LinkError::Decode {
                    offset: spec.offset,
                    needed: spec.field_type.size(),
                    available: window.len().saturating_sub(spec.offset),
                },
            )?;
            values.push(value);
        }

        let timestamp = match values[self.timestamp_index] {
            Value::UInt32(ts) => ts,
            other => {
                return Err(LinkError::TypeConversion {
                    details: format!("timestamp decoded as {:?}", other.field_type()),
                });
            }
        };

        Ok(Record::new(window.into(), values, timestamp, Arc::clone(self)))
    }

    /// Encode values, given in declaration order, into one record's wire bytes.
    pub fn encode(&self, values: &[Value]) -> Result<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(LinkError::schema_error(format!(
                "expected {} values, got {}",
                self.fields.len(),
                values.len()
            )));
        }

        let mut out = Vec::with_capacity(self.record_width);
        for (spec, value) in self.fields.iter().zip(values) {
            if value.field_type() != spec.field_type {
                return Err(LinkError::TypeConversion {
                    details: format!(
                        "field '{}' is {:?}, got {:?}",
                        spec.name,
                        spec.field_type,
                        value.field_type()
                    ),
                });
            }
            value.write_le(&mut out);
        }
        Ok(out)
    }
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::reference()
    }
}

impl TryFrom<SchemaDefinition> for RecordSchema {
    type Error = LinkError;

    fn try_from(def: SchemaDefinition) -> Result<Self> {
        Self::new(def.fields, &def.timestamp)
    }
}

impl From<RecordSchema> for SchemaDefinition {
    fn from(schema: RecordSchema) -> Self {
        let timestamp = schema.timestamp_field().name.clone();
        let fields = schema
            .fields
            .into_iter()
            .map(|spec| FieldDef { name: spec.name, field_type: spec.field_type })
            .collect();
        Self { timestamp, fields }
    }
}
