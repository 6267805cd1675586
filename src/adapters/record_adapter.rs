//! Record adapter trait for typed consumption of decoded records

use crate::types::{Record, RecordSchema};

use super::AdapterPlan;

/// Two-phase record adapter: subscription-time validation and per-record extraction.
///
/// `validate_schema()` runs once when a consumer subscribes, `adapt()` runs for
/// every emitted record using the resolved plan.
pub trait RecordAdapter: Sized {
    /// Validate the adapter against the record schema.
    ///
    /// Checks that required fields exist with the expected wire types and
    /// resolves their positions so `adapt` does no name lookups.
    fn validate_schema(schema: &RecordSchema) -> crate::Result<AdapterPlan>;

    /// Convert one decoded record using the pre-validated plan.
    fn adapt(record: &Record, plan: &AdapterPlan) -> Self;
}

impl RecordAdapter for Record {
    fn validate_schema(_schema: &RecordSchema) -> crate::Result<AdapterPlan> {
        Ok(AdapterPlan::new(Vec::new()))
    }

    fn adapt(record: &Record, _plan: &AdapterPlan) -> Self {
        record.clone()
    }
}
