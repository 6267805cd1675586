//! Session options

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::reassembler::DEFAULT_MAX_ITERATIONS;
use crate::types::RecordSchema;
use crate::{LinkError, Result};

/// Tunables for a link session.
///
/// Every field has a default, so an options file only needs the keys it
/// overrides:
///
/// ```rust
/// use radiolink::LinkOptions;
///
/// let options = LinkOptions::from_yaml_str("connect_timeout_ms: 2500\n").unwrap();
/// assert_eq!(options.connect_timeout().as_millis(), 2500);
/// assert_eq!(options.schema.record_width(), 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    /// Record layout shared with the device encoder
    pub schema: RecordSchema,
    /// Iteration guard for a single delivery
    pub max_iterations: usize,
    /// Upper bound on device discovery plus connection setup
    pub connect_timeout_ms: u64,
    /// Quiet period for debounced configuration writes
    pub write_debounce_ms: u64,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            schema: RecordSchema::reference(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            connect_timeout_ms: 10_000,
            write_debounce_ms: 200,
        }
    }
}

impl LinkOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_debounce(&self) -> Duration {
        Duration::from_millis(self.write_debounce_ms)
    }

    /// Parse options from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self = serde_yaml_ng::from_str(yaml).map_err(|e| LinkError::Parse {
            context: "link options".to_string(),
            details: e.to_string(),
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(LinkError::Parse {
                context: "link options".to_string(),
                details: "max_iterations must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
