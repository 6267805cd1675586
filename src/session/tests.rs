//! Session tests against the in-memory transport

use super::*;
use crate::adapters::TelemetrySample;
use crate::types::{FieldDef, FieldType, Value};
use crate::test_utils::{MockDevice, MockFailure, MockTransport, reference_record};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

async fn connected() -> (LinkSession<MockTransport>, MockDevice) {
    let _ = tracing_subscriber::fmt::try_init();
    let (transport, device) = MockTransport::pair();
    let session = LinkSession::connect(transport, LinkOptions::default())
        .await
        .expect("mock connect should succeed");
    (session, device)
}

async fn next_sample<S>(stream: &mut S) -> TelemetrySample
where
    S: Stream<Item = TelemetrySample> + Unpin,
{
    timeout(WAIT, stream.next())
        .await
        .expect("timed out waiting for a record")
        .expect("record stream ended early")
}

fn sample(time_ms: u32) -> TelemetrySample {
    TelemetrySample { readings: [time_ms as u16; 6], time_ms }
}

fn record(time_ms: u32) -> Vec<u8> {
    reference_record([time_ms as u16; 6], time_ms)
}

#[tokio::test]
async fn connect_resolves_device_and_attaches_events() {
    let (session, device) = connected().await;

    assert_eq!(session.device().id, "mock-0");
    assert_eq!(session.state(), LinkState::Connected);
    assert!(session.is_connected());
    assert_eq!(session.schema().record_width(), 16);
    assert!(device.has_listener());
    assert!(device.is_open());
}

#[tokio::test]
async fn unavailable_radio_fails_before_any_attempt() {
    let (transport, device) = MockTransport::pair();
    device.set_available(false);

    let result = LinkSession::connect(transport, LinkOptions::default()).await;

    assert!(matches!(result, Err(LinkError::TransportUnavailable { .. })));
    assert_eq!(device.attach_count(), 0);
}

#[tokio::test]
async fn failed_setup_detaches_the_event_queue() {
    let (transport, device) = MockTransport::pair();
    device.fail_on(MockFailure::Open);

    let result = LinkSession::connect(transport, LinkOptions::default()).await;

    assert!(matches!(result, Err(LinkError::Connection { .. })));
    assert_eq!(device.attach_count(), 1);
    assert_eq!(device.detach_count(), 1);
    assert!(!device.has_listener());
}

#[tokio::test]
async fn cancelled_device_selection_is_a_connection_error() {
    let (transport, device) = MockTransport::pair();
    device.fail_on(MockFailure::RequestDevice);

    let result = LinkSession::connect(transport, LinkOptions::default()).await;

    assert!(matches!(result, Err(LinkError::Connection { .. })));
    assert_eq!(device.attach_count(), 0);
}

#[tokio::test]
async fn read_config_parses_device_json() {
    let (mut session, device) = connected().await;
    device.set_config_text(r#"{"led_intensity":42,"motor_enable":1,"device_label":"Bench"}"#);

    let config = session.read_config().await.unwrap();

    assert_eq!(config.int("led_intensity"), Some(42));
    assert_eq!(config.flag("motor_enable"), Some(true));
    assert_eq!(config.text("device_label"), Some("Bench"));
}

#[tokio::test]
async fn malformed_config_is_a_config_error() {
    let (mut session, device) = connected().await;
    device.set_config_text("{not json");

    assert!(matches!(session.read_config().await, Err(LinkError::Config { .. })));
}

#[tokio::test]
async fn write_config_wraps_keys_in_set() {
    let (mut session, device) = connected().await;

    session
        .write_config(&ConfigPatch::new().set("led_intensity", 200).set("motor_enable", true))
        .await
        .unwrap();
    session.write_config(&ConfigPatch::new()).await.unwrap();

    let writes = device.config_writes();
    assert_eq!(writes.len(), 1, "empty patch must not be sent");
    let sent: serde_json::Value = serde_json::from_str(&writes[0]).unwrap();
    assert_eq!(sent, serde_json::json!({"set": {"led_intensity": 200, "motor_enable": 1}}));
}

#[tokio::test]
async fn config_requests_need_a_live_link() {
    let (mut session, device) = connected().await;
    device.drop_link();

    let result = session.write_config(&ConfigPatch::new().set("led_intensity", 1)).await;
    assert!(matches!(result, Err(LinkError::NotConnected { .. })));
    assert!(matches!(session.read_config().await, Err(LinkError::NotConnected { .. })));
    assert!(device.config_writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slider_bursts_coalesce_into_single_writes() {
    let (mut session, device) = connected().await;
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for value in [10, 20, 30] {
            tx.send(ConfigPatch::new().set("led_intensity", value)).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(ConfigPatch::new().set("device_label", "Rig")).unwrap();
    });

    let writes = session.apply_patches(UnboundedReceiverStream::new(rx)).await.unwrap();

    assert_eq!(writes, 2);
    let sent = device.config_writes();
    assert_eq!(sent[0], r#"{"set":{"led_intensity":30}}"#);
    assert_eq!(sent[1], r#"{"set":{"device_label":"Rig"}}"#);
}

#[tokio::test]
async fn start_stream_subscribes_then_sends_start() {
    let (mut session, device) = connected().await;

    session.start_stream().await.unwrap();

    assert!(device.is_subscribed());
    assert_eq!(device.control_bytes(), vec![0x01]);
    assert_eq!(session.state(), LinkState::Streaming);
}

#[tokio::test]
async fn records_split_across_deliveries_arrive_in_order() {
    let (mut session, device) = connected().await;
    let mut samples = Box::pin(session.subscribe::<TelemetrySample>().await.unwrap());
    session.start_stream().await.unwrap();

    let a = record(1000);
    let b = record(1016);
    device.notify(&a[..10]);
    let mut tail = a[10..].to_vec();
    tail.extend_from_slice(&b);
    device.notify(tail);

    assert_eq!(next_sample(&mut samples).await, sample(1000));
    assert_eq!(next_sample(&mut samples).await, sample(1016));
}

#[tokio::test]
async fn repeated_timestamps_are_suppressed() {
    let (mut session, device) = connected().await;
    let mut samples = Box::pin(session.subscribe::<TelemetrySample>().await.unwrap());
    session.start_stream().await.unwrap();

    device.notify(record(500));
    device.notify(record(500));
    device.notify(record(516));

    assert_eq!(next_sample(&mut samples).await, sample(500));
    assert_eq!(next_sample(&mut samples).await, sample(516));

    let stats = session.stats().await.unwrap();
    assert_eq!(stats.records_emitted, 2);
    assert_eq!(stats.duplicates_suppressed, 1);
}

#[tokio::test]
async fn deliveries_without_a_consumer_are_dropped() {
    let (mut session, device) = connected().await;
    session.start_stream().await.unwrap();

    device.notify(record(1));
    assert_eq!(session.stats().await.unwrap().deliveries, 0);

    let mut samples = Box::pin(session.subscribe::<TelemetrySample>().await.unwrap());
    device.notify(record(2));
    assert_eq!(next_sample(&mut samples).await, sample(2));
}

#[tokio::test]
async fn restart_clears_residue_and_duplicate_state() {
    let (mut session, device) = connected().await;
    let mut samples = Box::pin(session.subscribe::<TelemetrySample>().await.unwrap());

    session.start_stream().await.unwrap();
    let a = record(700);
    device.notify(a.clone());
    device.notify(&a[..6]);
    assert_eq!(next_sample(&mut samples).await, sample(700));
    session.stop_stream().await.unwrap();

    session.start_stream().await.unwrap();
    device.notify(a);

    // Same timestamp again: emitted because the restart forgot it, and not
    // misaligned by the six stale bytes.
    assert_eq!(next_sample(&mut samples).await, sample(700));
    assert_eq!(device.control_bytes(), vec![0x01, 0x00, 0x01]);
}

#[tokio::test]
async fn stop_stream_sends_stop_and_unsubscribes() {
    let (mut session, device) = connected().await;
    session.start_stream().await.unwrap();

    session.stop_stream().await.unwrap();

    assert_eq!(device.control_bytes(), vec![0x01, 0x00]);
    assert!(!device.is_subscribed());
    assert_eq!(session.state(), LinkState::Connected);
}

#[tokio::test]
async fn stop_stream_clears_stream_state() {
    let (mut session, device) = connected().await;
    let mut samples = Box::pin(session.subscribe::<TelemetrySample>().await.unwrap());
    session.start_stream().await.unwrap();
    let resets_at_start = session.stats().await.unwrap().resets;

    let a = record(40);
    device.notify(a.clone());
    device.notify(&a[..9]);
    assert_eq!(next_sample(&mut samples).await, sample(40));

    session.stop_stream().await.unwrap();

    assert_eq!(session.stats().await.unwrap().resets, resets_at_start + 1);
}

#[tokio::test]
async fn stop_stream_unsubscribes_even_when_stop_fails() {
    let (mut session, device) = connected().await;
    session.start_stream().await.unwrap();
    device.fail_on(MockFailure::ControlByte);

    let result = session.stop_stream().await;

    assert!(matches!(result, Err(LinkError::Command { .. })));
    assert!(!device.is_subscribed());
    assert_eq!(session.state(), LinkState::Connected);
}

#[tokio::test]
async fn failed_start_releases_the_subscription() {
    let (mut session, device) = connected().await;
    device.fail_on(MockFailure::ControlByte);

    let result = session.start_stream().await;

    assert!(matches!(result, Err(LinkError::Command { .. })));
    assert!(!device.is_subscribed());
    assert_eq!(session.state(), LinkState::Connected);

    device.clear_failures();
    session.start_stream().await.unwrap();
    assert_eq!(device.control_bytes(), vec![0x01]);
}

#[tokio::test]
async fn failed_subscribe_never_sends_start() {
    let (mut session, device) = connected().await;
    device.fail_on(MockFailure::Subscribe);

    assert!(session.start_stream().await.is_err());
    assert!(device.control_bytes().is_empty());
    assert_eq!(session.state(), LinkState::Connected);
}

#[tokio::test]
async fn link_loss_runs_cleanup_and_notifies_once() {
    let (mut session, device) = connected().await;
    let mut samples = Box::pin(session.subscribe::<TelemetrySample>().await.unwrap());
    let (tx, rx) = oneshot::channel();
    session.on_disconnect(move || { let _ = tx.send(()); }).await.unwrap();
    session.start_stream().await.unwrap();

    device.notify(record(10));
    assert_eq!(next_sample(&mut samples).await, sample(10));
    device.drop_link();

    timeout(WAIT, rx).await.expect("disconnect callback not run").unwrap();
    assert!(timeout(WAIT, samples.next()).await.unwrap().is_none(), "consumer must be dropped");
    assert_eq!(session.state(), LinkState::Disconnected);
    assert!(!session.is_connected());
    assert!(matches!(session.start_stream().await, Err(LinkError::NotConnected { .. })));
}

#[tokio::test]
async fn state_updates_follow_the_lifecycle() {
    let (mut session, device) = connected().await;
    let mut states = Box::pin(session.state_updates());

    assert_eq!(timeout(WAIT, states.next()).await.unwrap(), Some(LinkState::Connected));
    session.start_stream().await.unwrap();
    assert_eq!(timeout(WAIT, states.next()).await.unwrap(), Some(LinkState::Streaming));
    device.drop_link();
    assert_eq!(timeout(WAIT, states.next()).await.unwrap(), Some(LinkState::Disconnected));
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (mut session, device) = connected().await;
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = calls.clone();
    session
        .on_disconnect(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .await
        .unwrap();

    session.disconnect().await.unwrap();
    session.disconnect().await.unwrap();

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(!device.is_open());
    assert!(!device.has_listener());
    assert_eq!(session.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn custom_layout_streams_through_raw_callback() {
    let _ = tracing_subscriber::fmt::try_init();
    let (transport, device) = MockTransport::pair();
    let schema = RecordSchema::new(
        vec![FieldDef::new("value", FieldType::Float32), FieldDef::new("t", FieldType::UInt32)],
        "t",
    )
    .unwrap();
    let options = LinkOptions { schema: schema.clone(), ..LinkOptions::default() };
    let mut session = LinkSession::connect(transport, options).await.unwrap();

    assert!(matches!(
        session.subscribe::<TelemetrySample>().await,
        Err(LinkError::FieldNotFound { .. })
    ));

    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .set_on_record(move |record| {
            let _ = tx.send((record.timestamp(), record.get::<f32>("value").ok()));
        })
        .await
        .unwrap();
    session.start_stream().await.unwrap();

    let mut bytes = schema.encode(&[Value::Float32(1.5), Value::UInt32(9)]).unwrap();
    bytes.extend(schema.encode(&[Value::Float32(-2.0), Value::UInt32(10)]).unwrap());
    device.notify(bytes);

    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some((9, Some(1.5))));
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some((10, Some(-2.0))));
}

/// Mock transport whose discovery and setup each take `delay`.
struct SlowTransport {
    inner: MockTransport,
    delay: Duration,
}

#[async_trait::async_trait]
impl Transport for SlowTransport {
    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    async fn request_device(&mut self) -> Result<DeviceInfo> {
        tokio::time::sleep(self.delay).await;
        self.inner.request_device().await
    }

    fn attach_events(&mut self) -> mpsc::UnboundedReceiver<crate::TransportEvent> {
        self.inner.attach_events()
    }

    fn detach_events(&mut self) {
        self.inner.detach_events()
    }

    async fn open(&mut self) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.open().await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn subscribe(&mut self) -> Result<()> {
        self.inner.subscribe().await
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.inner.unsubscribe().await
    }

    async fn send_control_byte(&mut self, value: u8) -> Result<()> {
        self.inner.send_control_byte(value).await
    }

    async fn read_config(&mut self) -> Result<String> {
        self.inner.read_config().await
    }

    async fn write_config(&mut self, text: String) -> Result<()> {
        self.inner.write_config(text).await
    }
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_bounds_discovery_and_setup_together() {
    let _ = tracing_subscriber::fmt::try_init();
    let (inner, device) = MockTransport::pair();
    let transport = SlowTransport { inner, delay: Duration::from_secs(6) };
    let started = Instant::now();

    let result = LinkSession::connect(transport, LinkOptions::default()).await;

    assert!(matches!(result, Err(LinkError::Timeout { duration }) if duration == Duration::from_secs(10)));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11), "{elapsed:?}");
    assert_eq!(device.attach_count(), 1);
    assert_eq!(device.detach_count(), 1);
    assert!(!device.has_listener());
}

#[tokio::test(start_paused = true)]
async fn slow_discovery_times_out_before_attaching() {
    let (inner, device) = MockTransport::pair();
    let transport = SlowTransport { inner, delay: Duration::from_secs(11) };

    let result = LinkSession::connect(transport, LinkOptions::default()).await;

    assert!(matches!(result, Err(LinkError::Timeout { .. })));
    assert_eq!(device.attach_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn setup_within_the_deadline_connects() {
    let (inner, device) = MockTransport::pair();
    let transport = SlowTransport { inner, delay: Duration::from_secs(4) };

    let session = LinkSession::connect(transport, LinkOptions::default()).await.unwrap();

    assert!(session.is_connected());
    assert!(device.has_listener());
}
