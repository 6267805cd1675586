//! Typed adapter for the reference record layout

use serde::{Deserialize, Serialize};

use super::{AdapterPlan, RecordAdapter};
use crate::types::{Record, RecordSchema};

const READINGS: [&str; 6] = ["reading1", "reading2", "reading3", "reading4", "reading5", "reading6"];
const TIME: &str = "time_ms";

/// One sample of the reference layout: six scalar readings and a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub readings: [u16; 6],
    pub time_ms: u32,
}

impl RecordAdapter for TelemetrySample {
    fn validate_schema(schema: &RecordSchema) -> crate::Result<AdapterPlan> {
        let mut fields = Vec::with_capacity(READINGS.len() + 1);
        for name in READINGS {
            fields.push(AdapterPlan::required::<u16>(schema, name)?);
        }
        fields.push(AdapterPlan::required::<u32>(schema, TIME)?);
        Ok(AdapterPlan::new(fields))
    }

    fn adapt(record: &Record, plan: &AdapterPlan) -> Self {
        let mut readings = [0u16; 6];
        for (slot, name) in readings.iter_mut().zip(READINGS) {
            *slot = plan.fetch_or_default(record, name);
        }
        Self { readings, time_ms: plan.fetch_or_default(record, TIME) }
    }
}
