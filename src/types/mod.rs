//! Core types for decoded telemetry records.
//!
//! ## Architecture
//!
//! - [`RecordSchema`] is the declarative layout: an ordered list of
//!   `(name, type)` pairs from which offsets and the record width follow
//! - [`FieldType`] is a scalar wire type with its size
//! - [`Record`] is one decoded window with by-name access
//! - [`FieldData`] provides type-checked extraction into Rust scalars
//!
//! ## Usage Example
//!
//! ```rust
//! use radiolink::types::{RecordSchema, Value};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(RecordSchema::reference());
//! assert_eq!(schema.record_width(), 16);
//!
//! let mut bytes = Vec::new();
//! for reading in [10u16, 20, 30, 40, 50, 60] {
//!     bytes.extend_from_slice(&reading.to_le_bytes());
//! }
//! bytes.extend_from_slice(&1_500u32.to_le_bytes());
//!
//! let record = schema.decode(&bytes).unwrap();
//! assert_eq!(record.timestamp(), 1_500);
//! assert_eq!(record.get::<u16>("reading3").unwrap(), 30);
//! assert_eq!(record.value("reading6"), Some(Value::UInt16(60)));
//! ```

mod field_data;
mod field_type;
mod record;
mod schema;

pub use field_data::FieldData;
pub use field_type::{FieldType, Value};
pub use record::Record;
pub use schema::{FieldDef, FieldSpec, RecordSchema};
