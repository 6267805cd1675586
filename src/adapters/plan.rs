//! Extraction plans built at subscription time

use std::collections::HashMap;

use crate::types::{FieldData, FieldSpec, Record, RecordSchema};
use crate::{LinkError, Result};

/// Pre-resolved extraction plan for a [`RecordAdapter`](super::RecordAdapter).
#[derive(Debug, Clone)]
pub struct AdapterPlan {
    /// Ordered list of field extraction operations
    pub fields: Vec<FieldExtraction>,
    index_map: HashMap<String, usize>,
}

impl AdapterPlan {
    /// Create a plan from the given extraction operations.
    pub fn new(fields: Vec<FieldExtraction>) -> Self {
        let index_map =
            fields.iter().enumerate().map(|(index, f)| (f.field_name().to_string(), index)).collect();

        Self { fields, index_map }
    }

    /// Number of planned extractions.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Lookup the plan index for a field name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_map.get(name).copied()
    }

    /// Resolve a required field of type `T`, failing fast if the schema lacks it
    /// or declares a different wire type.
    pub fn required<T: FieldData>(schema: &RecordSchema, name: &str) -> Result<FieldExtraction> {
        let spec = schema
            .field(name)
            .ok_or_else(|| LinkError::FieldNotFound { field: name.to_string() })?;

        if spec.field_type != T::FIELD_TYPE {
            return Err(LinkError::TypeConversion {
                details: format!(
                    "Field '{}' is {:?}, adapter expects {:?}",
                    name,
                    spec.field_type,
                    T::FIELD_TYPE
                ),
            });
        }

        Ok(FieldExtraction::Required { name: name.to_string(), spec: spec.clone() })
    }

    /// Resolve an optional field; a missing or mistyped field yields an empty slot.
    pub fn optional<T: FieldData>(schema: &RecordSchema, name: &str) -> FieldExtraction {
        let spec = schema.field(name).filter(|spec| spec.field_type == T::FIELD_TYPE).cloned();
        FieldExtraction::Optional { name: name.to_string(), spec }
    }

    /// Fetch a value through the plan, if the field was resolved.
    pub fn fetch<T: FieldData>(&self, record: &Record, name: &str) -> Option<T> {
        let spec = self.index_of(name).and_then(|idx| self.fields[idx].spec())?;
        T::from_bytes(record.bytes(), spec).ok()
    }

    /// Fetch a value through the plan, falling back to `T::default()`.
    pub fn fetch_or_default<T: FieldData + Default>(&self, record: &Record, name: &str) -> T {
        self.fetch(record, name).unwrap_or_default()
    }
}

/// Extraction strategy for a single adapter field.
#[derive(Debug, Clone)]
pub enum FieldExtraction {
    /// Field that must exist in the schema; subscription fails otherwise.
    Required { name: String, spec: FieldSpec },

    /// Field that may be absent from the schema.
    Optional { name: String, spec: Option<FieldSpec> },
}

impl FieldExtraction {
    pub fn field_name(&self) -> &str {
        match self {
            FieldExtraction::Required { name, .. } | FieldExtraction::Optional { name, .. } => name,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, FieldExtraction::Required { .. })
    }

    /// Resolved field layout, if available.
    pub fn spec(&self) -> Option<&FieldSpec> {
        match self {
            FieldExtraction::Required { spec, .. } => Some(spec),
            FieldExtraction::Optional { spec, .. } => spec.as_ref(),
        }
    }
}
