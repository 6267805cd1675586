//! Transport trait for the radio link

use tokio::sync::mpsc;

use crate::Result;

/// Events pushed by the transport, in the order they occurred.
///
/// Data deliveries and the disconnect notification share one queue so the
/// consumer observes them strictly one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One notification payload of arbitrary length
    Data(Vec<u8>),
    /// The link dropped, for any reason
    Disconnected,
}

/// Single-byte commands on the stream control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlCommand {
    Stop = 0x00,
    Start = 0x01,
}

impl ControlCommand {
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Identity of the device chosen during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Platform identifier for the device
    pub id: String,
    /// Advertised name, if any
    pub name: Option<String>,
}

/// Trait for radio transports carrying the link.
///
/// Connection setup is split into the steps a session performs so that a
/// failure part-way through can be unwound: events attached by
/// [`attach_events`](Transport::attach_events) are detached again if
/// [`open`](Transport::open) fails.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Whether the radio capability exists on this host at all.
    fn is_available(&self) -> bool;

    /// Discover and select the device.
    async fn request_device(&mut self) -> Result<DeviceInfo>;

    /// Attach the event queue for the selected device.
    ///
    /// At most one queue is active; attaching again replaces the previous one.
    fn attach_events(&mut self) -> mpsc::UnboundedReceiver<TransportEvent>;

    /// Detach the event queue. Must be safe to call when nothing is attached.
    fn detach_events(&mut self);

    /// Connect and resolve the service and its characteristics.
    async fn open(&mut self) -> Result<()>;

    /// Close the link. The transport emits [`TransportEvent::Disconnected`].
    async fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Enable data notifications.
    async fn subscribe(&mut self) -> Result<()>;

    /// Disable data notifications.
    async fn unsubscribe(&mut self) -> Result<()>;

    /// Write one byte to the stream control channel.
    async fn send_control_byte(&mut self, value: u8) -> Result<()>;

    /// Read the configuration object as text.
    async fn read_config(&mut self) -> Result<String>;

    /// Write a configuration command as text.
    async fn write_config(&mut self, text: String) -> Result<()>;
}
