//! Stream reassembly and device configuration over a notification-based radio link.
//!
//! A device pushes fixed-width little-endian records over a notification
//! channel. Deliveries arrive in arbitrary sizes, so records may be split
//! across deliveries or packed several to one. Radiolink rebuilds the record
//! boundaries, suppresses repeated records, and exposes a small JSON
//! configuration channel next to the stream.
//!
//! # Features
//!
//! - **Reassembly**: records rebuilt from arbitrary delivery boundaries, with
//!   bounded memory on a corrupt stream
//! - **Declarative layouts**: record schemas built in code or loaded from YAML
//! - **Typed records**: adapters validated once against the schema
//! - **Configuration**: read the device's settings and write partial updates,
//!   debounced for slider-style input
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use radiolink::{RadioLink, TelemetrySample, Transport};
//!
//! async fn run<T: Transport>(transport: T) -> radiolink::Result<()> {
//!     let mut session = RadioLink::connect(transport).await?;
//!
//!     let config = session.read_config().await?;
//!     println!("LED intensity: {:?}", config.int("led_intensity"));
//!
//!     let mut samples = Box::pin(session.subscribe::<TelemetrySample>().await?);
//!     session.start_stream().await?;
//!     while let Some(sample) = samples.next().await {
//!         println!("{} ms: {:?}", sample.time_ms, sample.readings);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod adapters;
pub mod config;
mod error;
pub mod options;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Stream architecture
pub mod driver;
pub mod reassembler;
pub mod session;
pub mod stream;
pub mod transport;

// Core exports
pub use adapters::*;
pub use config::{ConfigPatch, ConfigSnapshot, ConfigValue};
pub use error::*;
pub use options::LinkOptions;
pub use types::*;

// Main API exports
pub use driver::LinkState;
pub use reassembler::{Reassembler, ReassemblyStats};
pub use session::LinkSession;
pub use stream::{Coalesce, CoalesceExt};
pub use transport::{ControlCommand, DeviceInfo, Transport, TransportEvent};

/// Unified entry point for radio link sessions.
///
/// # Examples
///
/// ```rust,no_run
/// use radiolink::{LinkOptions, RadioLink, Transport};
///
/// async fn open<T: Transport>(transport: T) -> radiolink::Result<()> {
///     let options = LinkOptions::from_yaml_file("link.yaml")?;
///     let session = RadioLink::connect_with(transport, options).await?;
///     println!("Connected to {}", session.device().id);
///     Ok(())
/// }
/// ```
pub struct RadioLink;

impl RadioLink {
    /// Connect using the default options and the reference record layout.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The radio is not available on this host
    /// - No device was selected
    /// - Connecting or resolving the service fails
    /// - Setup does not finish within the connect timeout
    pub async fn connect<T: Transport>(transport: T) -> Result<LinkSession<T>> {
        LinkSession::connect(transport, LinkOptions::default()).await
    }

    /// Connect with explicit options.
    pub async fn connect_with<T: Transport>(
        transport: T,
        options: LinkOptions,
    ) -> Result<LinkSession<T>> {
        LinkSession::connect(transport, options).await
    }
}
