//! Typed adapters from decoded records to application structures.
//!
//! Adapters work in two phases:
//! - **Subscription-time validation**: field names and wire types are checked
//!   against the [`RecordSchema`](crate::RecordSchema) and resolved into an
//!   [`AdapterPlan`]
//! - **Per-record extraction**: values are read through the plan
//!
//! # Example Usage
//!
//! ```rust
//! use radiolink::adapters::{AdapterPlan, RecordAdapter};
//! use radiolink::types::{Record, RecordSchema};
//!
//! struct Battery {
//!     millivolts: u16,
//! }
//!
//! impl RecordAdapter for Battery {
//!     fn validate_schema(schema: &RecordSchema) -> radiolink::Result<AdapterPlan> {
//!         Ok(AdapterPlan::new(vec![AdapterPlan::required::<u16>(schema, "reading1")?]))
//!     }
//!
//!     fn adapt(record: &Record, plan: &AdapterPlan) -> Self {
//!         Self { millivolts: plan.fetch_or_default(record, "reading1") }
//!     }
//! }
//! ```

mod plan;
mod record_adapter;
mod sample;

pub use plan::{AdapterPlan, FieldExtraction};
pub use record_adapter::RecordAdapter;
pub use sample::TelemetrySample;
