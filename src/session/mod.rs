//! Link session: connection lifecycle, configuration and streaming

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tokio_stream::wrappers::{UnboundedReceiverStream, WatchStream};
use tracing::{debug, info, warn};

use crate::adapters::RecordAdapter;
use crate::config::{ConfigPatch, ConfigSnapshot};
use crate::driver::{Driver, DriverHandle, LinkState};
use crate::reassembler::{Reassembler, ReassemblyStats};
use crate::stream::CoalesceExt;
use crate::transport::{ControlCommand, DeviceInfo, Transport};
use crate::types::{Record, RecordSchema};
use crate::{LinkError, LinkOptions, Result};

#[cfg(test)]
mod tests;

/// One connected session with a device.
///
/// Requests (`read_config`, `write_config`, `start_stream`, `stop_stream`)
/// are awaited one at a time through `&mut self`. Stream deliveries are
/// handled by a driver task that owns the reassembler, so they never overlap
/// with a reset.
///
/// A session does not survive a disconnect: connect a new one instead.
pub struct LinkSession<T: Transport> {
    transport: T,
    device: DeviceInfo,
    schema: Arc<RecordSchema>,
    options: LinkOptions,
    driver: DriverHandle,
}

impl<T: Transport> LinkSession<T> {
    /// Discover the device, connect and resolve its service.
    ///
    /// Both steps share one deadline of `options.connect_timeout()`. Fails
    /// before any attempt if the radio is unavailable. If setup fails
    /// after the event queue was attached, it is detached again before the
    /// error is returned.
    pub async fn connect(mut transport: T, options: LinkOptions) -> Result<Self> {
        options.validate()?;

        if !transport.is_available() {
            return Err(LinkError::transport_unavailable(
                "no radio adapter is exposed to this process",
            ));
        }

        info!("Requesting device");
        let timeout = options.connect_timeout();
        let deadline = Instant::now() + timeout;
        let device = timeout_at(deadline, transport.request_device())
            .await
            .map_err(|_| LinkError::Timeout { duration: timeout })??;

        info!(device = %device.id, name = ?device.name, "Connecting to device");
        let events = transport.attach_events();

        match timeout_at(deadline, transport.open()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Connection setup failed: {}", e);
                transport.detach_events();
                return Err(match e {
                    e @ LinkError::Connection { .. } => e,
                    other => LinkError::connection_failed_with_source(
                        "service setup failed",
                        Box::new(other),
                    ),
                });
            }
            Err(_) => {
                warn!("Connection setup timed out after {:?}", timeout);
                transport.detach_events();
                return Err(LinkError::Timeout { duration: timeout });
            }
        }

        let schema = Arc::new(options.schema.clone());
        let reassembler =
            Reassembler::new(Arc::clone(&schema)).with_max_iterations(options.max_iterations);
        let driver = Driver::spawn(reassembler, events);

        info!(record_width = schema.record_width(), "Link ready");
        Ok(Self { transport, device, schema, options, driver })
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    pub fn state(&self) -> LinkState {
        self.driver.state()
    }

    /// Current state followed by every change.
    pub fn state_updates(&self) -> WatchStream<LinkState> {
        WatchStream::new(self.driver.state_receiver())
    }

    pub fn is_connected(&self) -> bool {
        self.state() != LinkState::Disconnected && self.transport.is_open()
    }

    fn ensure_connected(&self, operation: &str) -> Result<()> {
        if self.is_connected() { Ok(()) } else { Err(LinkError::not_connected(operation)) }
    }

    /// Close the link. Does nothing when already disconnected.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        info!("Disconnecting");
        let closed = self.transport.close().await;
        self.transport.detach_events();
        self.driver.detach().await?;
        closed
    }

    /// Register a callback for link loss, replacing any earlier one.
    pub async fn on_disconnect<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.driver.set_on_disconnect(Box::new(callback)).await
    }

    /// Read the live configuration from the device.
    pub async fn read_config(&mut self) -> Result<ConfigSnapshot> {
        self.ensure_connected("read_config")?;
        let text = self.transport.read_config().await?;
        debug!(bytes = text.len(), "Read configuration");
        ConfigSnapshot::from_json(&text)
    }

    /// Send the keys in `patch` to the device. Empty patches are not sent.
    pub async fn write_config(&mut self, patch: &ConfigPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.ensure_connected("write_config")?;
        let command = patch.to_command_json()?;
        debug!(keys = patch.len(), "Writing configuration");
        self.transport.write_config(command).await
    }

    /// Write patches from `patches`, coalescing bursts that arrive within
    /// the configured debounce period. Returns the number of writes issued.
    pub async fn apply_patches<S>(&mut self, patches: S) -> Result<usize>
    where
        S: Stream<Item = ConfigPatch>,
    {
        let quiet = self.options.write_debounce();
        self.apply_patches_with(patches, quiet).await
    }

    /// [`apply_patches`](Self::apply_patches) with an explicit quiet period.
    pub async fn apply_patches_with<S>(&mut self, patches: S, quiet: Duration) -> Result<usize>
    where
        S: Stream<Item = ConfigPatch>,
    {
        let mut merged = std::pin::pin!(patches.coalesce(quiet));
        let mut writes = 0;
        while let Some(patch) = merged.next().await {
            if patch.is_empty() {
                continue;
            }
            self.write_config(&patch).await?;
            writes += 1;
        }
        Ok(writes)
    }

    /// Register the record consumer, replacing any earlier one.
    ///
    /// The callback runs on the driver task, once per record, in arrival order.
    pub async fn set_on_record<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(&Record) + Send + 'static,
    {
        self.driver.set_consumer(Some(Box::new(callback))).await
    }

    /// Remove the record consumer. Deliveries are dropped until a new one is set.
    pub async fn clear_on_record(&self) -> Result<()> {
        self.driver.set_consumer(None).await
    }

    /// Register a consumer that adapts records into `A` and yields them as a stream.
    ///
    /// The adapter is validated against the schema before anything is
    /// registered. The stream ends when the link goes down or the consumer is
    /// replaced.
    pub async fn subscribe<A>(&self) -> Result<UnboundedReceiverStream<A>>
    where
        A: RecordAdapter + Send + 'static,
    {
        let plan = A::validate_schema(&self.schema)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.set_on_record(move |record| {
            let _ = tx.send(A::adapt(record, &plan));
        })
        .await?;
        Ok(UnboundedReceiverStream::new(rx))
    }

    /// Start streaming: clear stale state, open delivery, subscribe, then ask
    /// the device to start producing.
    pub async fn start_stream(&mut self) -> Result<()> {
        self.ensure_connected("start_stream")?;

        self.driver.reset().await?;
        self.driver.set_streaming(true).await?;

        if let Err(e) = self.transport.subscribe().await {
            warn!("Subscribing to stream data failed: {}", e);
            self.release_stream().await;
            return Err(e);
        }
        info!("Stream notifications started");

        if let Err(e) = self.transport.send_control_byte(ControlCommand::Start.as_byte()).await {
            warn!("Stream START command failed: {}", e);
            self.release_stream().await;
            return Err(e);
        }
        info!("Stream START command sent");
        Ok(())
    }

    /// Stop streaming: ask the device to stop, then detach delivery and clear
    /// residue and duplicate state.
    ///
    /// Both steps are attempted even if the first fails; the first error is
    /// returned.
    pub async fn stop_stream(&mut self) -> Result<()> {
        self.ensure_connected("stop_stream")?;

        let stop = self.transport.send_control_byte(ControlCommand::Stop.as_byte()).await;
        match &stop {
            Ok(()) => info!("Stream STOP command sent"),
            Err(e) => warn!("Stream STOP command failed: {}", e),
        }

        if let Err(e) = self.driver.set_streaming(false).await {
            debug!("Driver already gone while stopping stream: {}", e);
        }
        if let Err(e) = self.driver.reset().await {
            debug!("Driver already gone while clearing stream state: {}", e);
        }
        let unsubscribe = self.transport.unsubscribe().await;
        match &unsubscribe {
            Ok(()) => info!("Stream notifications stopped"),
            Err(e) => warn!("Stopping stream notifications failed: {}", e),
        }

        stop.and(unsubscribe)
    }

    async fn release_stream(&mut self) {
        if let Err(e) = self.driver.set_streaming(false).await {
            debug!("Driver already gone while releasing stream: {}", e);
        }
        if let Err(e) = self.transport.unsubscribe().await {
            warn!("Releasing stream subscription failed: {}", e);
        }
    }

    /// Reassembly counters for this session.
    pub async fn stats(&self) -> Result<ReassemblyStats> {
        self.driver.stats().await
    }
}
