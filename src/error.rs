//! Error types for link and stream operations.
//!
//! All fallible operations in radiolink return [`LinkError`]. Errors carry
//! structured context and can report whether a retry makes sense.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: the radio capability is absent on this host
//! - **Connection Errors**: discovery, pairing or service lookup failed
//! - **Command Errors**: a start/stop or configuration request was rejected
//! - **Schema Errors**: a record schema is inconsistent
//! - **Decode Errors**: a field could not be read from a record window
//! - **Config Errors**: the device's configuration text is not a valid mapping
//!
//! Malformed stream data is never reported here. The reassembler absorbs it
//! and resynchronizes on its own.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use radiolink::LinkError;
//!
//! let error = LinkError::connection_failed("device not found");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Radio transport unavailable: {reason}")]
    TransportUnavailable { reason: String },

    #[error("Failed to connect to device: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Link is not connected (while attempting {operation})")]
    NotConnected { operation: String },

    #[error("Command '{command}' failed")]
    Command {
        command: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Schema validation failed: {reason}")]
    Schema { reason: String },

    #[error("Field '{field}' not found in record schema")]
    FieldNotFound { field: String },

    #[error("Type conversion error: {details}")]
    TypeConversion { details: String },

    #[error("Record window too short: need {needed} bytes at offset {offset}, have {available}")]
    Decode { offset: usize, needed: usize, available: usize },

    #[error("Invalid device configuration: {details}")]
    Config { details: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Options file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LinkError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Connection { .. } => true,
            LinkError::Command { .. } => true,
            LinkError::Timeout { .. } => true,
            LinkError::NotConnected { .. } => true,
            LinkError::TransportUnavailable { .. } => false,
            LinkError::Schema { .. } => false,
            LinkError::FieldNotFound { .. } => false,
            LinkError::TypeConversion { .. } => false,
            LinkError::Decode { .. } => false,
            LinkError::Config { .. } => false,
            LinkError::Parse { .. } => false,
            LinkError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LinkError::TransportUnavailable { .. } => vec![
                "Enable the Bluetooth adapter on this host",
                "Use a runtime that exposes the radio capability",
                "Check that the process is allowed to access the adapter",
            ],
            LinkError::Connection { .. } => vec![
                "Ensure the device is powered and advertising",
                "Move the device closer to the host",
                "Retry the connection",
            ],
            LinkError::NotConnected { .. } => vec![
                "Connect a new session before issuing commands",
                "Check for a disconnect notification",
            ],
            LinkError::Command { .. } => vec![
                "Verify the link is still up",
                "Retry the command once the previous request resolved",
            ],
            LinkError::Timeout { .. } => vec![
                "Increase the connect timeout",
                "Check radio signal quality",
            ],
            LinkError::Schema { .. } => vec![
                "Check field names are unique and non-empty",
                "Declare the timestamp field as u32",
                "Keep the schema identical to the device encoder",
            ],
            LinkError::FieldNotFound { .. } => vec![
                "Check field name spelling",
                "Verify the field is declared in the record schema",
            ],
            LinkError::TypeConversion { .. } => vec![
                "Request the field with the Rust type matching its declared type",
                "Inspect the schema to find the declared type",
            ],
            LinkError::Decode { .. } => vec![
                "Pass a window exactly one record width long",
                "Verify the schema width matches the device encoder",
            ],
            LinkError::Config { .. } => vec![
                "Check the device firmware produces a JSON object",
                "Verify configuration values are scalars or strings",
            ],
            LinkError::Parse { .. } => vec![
                "Check options file syntax",
                "Verify field types use the documented names",
            ],
            LinkError::File { .. } => vec![
                "Check the options file exists and is readable",
                "Check file permissions",
            ],
        }
    }

    /// Helper constructor for an absent radio capability.
    pub fn transport_unavailable(reason: impl Into<String>) -> Self {
        LinkError::TransportUnavailable { reason: reason.into() }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        LinkError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for operations attempted on a closed link.
    pub fn not_connected(operation: impl Into<String>) -> Self {
        LinkError::NotConnected { operation: operation.into() }
    }

    /// Helper constructor for failed device commands.
    pub fn command_failed(command: impl Into<String>) -> Self {
        LinkError::Command { command: command.into(), source: None }
    }

    /// Helper constructor for failed device commands with source.
    pub fn command_failed_with_source(
        command: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Command { command: command.into(), source: Some(source) }
    }

    /// Helper constructor for schema validation errors.
    pub fn schema_error(reason: impl Into<String>) -> Self {
        LinkError::Schema { reason: reason.into() }
    }

    /// Helper constructor for options file errors.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        LinkError::File { path, source }
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::Config { details: err.to_string() }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
