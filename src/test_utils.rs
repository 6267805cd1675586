//! Test utilities: an in-memory transport and record byte builders.
//!
//! [`MockTransport`] behaves like a device on the other end of the radio. A
//! [`MockDevice`] handle shares its state so tests can push notifications,
//! drop the link, inject failures and inspect what the session sent.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::transport::{DeviceInfo, Transport, TransportEvent};
use crate::types::{RecordSchema, Value};
use crate::{LinkError, Result};

/// Step at which the mock should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    RequestDevice,
    Open,
    Subscribe,
    Unsubscribe,
    ControlByte,
    ReadConfig,
    WriteConfig,
}

#[derive(Debug)]
struct MockState {
    available: bool,
    open: bool,
    subscribed: bool,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    attach_count: usize,
    detach_count: usize,
    control_bytes: Vec<u8>,
    config_text: String,
    config_writes: Vec<String>,
    failures: Vec<MockFailure>,
}

/// In-memory [`Transport`].
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Device-side handle to a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a transport and the handle controlling it.
    pub fn pair() -> (Self, MockDevice) {
        let state = Arc::new(Mutex::new(MockState {
            available: true,
            open: false,
            subscribed: false,
            events: None,
            attach_count: 0,
            detach_count: 0,
            control_bytes: Vec::new(),
            config_text: r#"{"led_intensity":128,"update_interval":100,"motor_enable":0,"device_label":"ESP32-Dev"}"#
                .to_string(),
            config_writes: Vec::new(),
            failures: Vec::new(),
        }));
        (Self { state: Arc::clone(&state) }, MockDevice { state })
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, step: MockFailure) -> Result<()> {
        if self.lock().failures.contains(&step) {
            return Err(LinkError::command_failed(format!("mock {step:?}")));
        }
        Ok(())
    }
}

impl MockDevice {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push one notification. Dropped, like a real radio, unless subscribed.
    pub fn notify(&self, bytes: impl Into<Vec<u8>>) {
        let state = self.lock();
        if state.subscribed {
            if let Some(tx) = &state.events {
                let _ = tx.send(TransportEvent::Data(bytes.into()));
            }
        }
    }

    /// Drop the link from the device side.
    pub fn drop_link(&self) {
        let mut state = self.lock();
        state.open = false;
        state.subscribed = false;
        if let Some(tx) = state.events.take() {
            let _ = tx.send(TransportEvent::Disconnected);
        }
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    pub fn fail_on(&self, step: MockFailure) {
        self.lock().failures.push(step);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn set_config_text(&self, text: impl Into<String>) {
        self.lock().config_text = text.into();
    }

    pub fn control_bytes(&self) -> Vec<u8> {
        self.lock().control_bytes.clone()
    }

    pub fn config_writes(&self) -> Vec<String> {
        self.lock().config_writes.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().subscribed
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Whether an event queue is currently attached.
    pub fn has_listener(&self) -> bool {
        self.lock().events.is_some()
    }

    pub fn attach_count(&self) -> usize {
        self.lock().attach_count
    }

    pub fn detach_count(&self) -> usize {
        self.lock().detach_count
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    fn is_available(&self) -> bool {
        self.lock().available
    }

    async fn request_device(&mut self) -> Result<DeviceInfo> {
        if self.lock().failures.contains(&MockFailure::RequestDevice) {
            return Err(LinkError::connection_failed("no device selected"));
        }
        Ok(DeviceInfo { id: "mock-0".to_string(), name: Some("EWB Mock".to_string()) })
    }

    fn attach_events(&mut self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.events = Some(tx);
        state.attach_count += 1;
        rx
    }

    fn detach_events(&mut self) {
        let mut state = self.lock();
        state.events = None;
        state.detach_count += 1;
    }

    async fn open(&mut self) -> Result<()> {
        if self.lock().failures.contains(&MockFailure::Open) {
            return Err(LinkError::connection_failed("service lookup failed"));
        }
        self.lock().open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.open = false;
        state.subscribed = false;
        if let Some(tx) = state.events.take() {
            let _ = tx.send(TransportEvent::Disconnected);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    async fn subscribe(&mut self) -> Result<()> {
        self.check(MockFailure::Subscribe)?;
        self.lock().subscribed = true;
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.lock().subscribed = false;
        self.check(MockFailure::Unsubscribe)
    }

    async fn send_control_byte(&mut self, value: u8) -> Result<()> {
        self.check(MockFailure::ControlByte)?;
        self.lock().control_bytes.push(value);
        Ok(())
    }

    async fn read_config(&mut self) -> Result<String> {
        self.check(MockFailure::ReadConfig)?;
        Ok(self.lock().config_text.clone())
    }

    async fn write_config(&mut self, text: String) -> Result<()> {
        self.check(MockFailure::WriteConfig)?;
        self.lock().config_writes.push(text);
        Ok(())
    }
}

/// Wire bytes for one reference-layout record.
pub fn reference_record(readings: [u16; 6], time_ms: u32) -> Vec<u8> {
    let mut values: Vec<Value> = readings.iter().map(|r| Value::UInt16(*r)).collect();
    values.push(Value::UInt32(time_ms));
    RecordSchema::reference().encode(&values).unwrap_or_default()
}

/// Concatenated wire bytes for reference records with timestamps `times`.
pub fn reference_stream(times: impl IntoIterator<Item = u32>) -> Vec<u8> {
    times
        .into_iter()
        .flat_map(|t| reference_record([t as u16; 6], t))
        .collect()
}
