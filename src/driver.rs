//! Driver task owning the stream state of one link session

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::reassembler::{Reassembler, ReassemblyStats};
use crate::transport::TransportEvent;
use crate::types::Record;
use crate::{LinkError, Result};

/// Callback invoked once per emitted record.
pub type RecordCallback = Box<dyn FnMut(&Record) + Send + 'static>;

/// Callback invoked once when the link goes down.
pub type DisconnectCallback = Box<dyn FnOnce() + Send + 'static>;

/// Observable state of a link session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Streaming,
    Disconnected,
}

enum Command {
    Reset(oneshot::Sender<()>),
    Gate(bool, oneshot::Sender<()>),
    Consumer(Option<RecordCallback>, oneshot::Sender<()>),
    OnDisconnect(DisconnectCallback, oneshot::Sender<()>),
    Detach(oneshot::Sender<()>),
    Stats(oneshot::Sender<ReassemblyStats>),
}

/// Handle for talking to a spawned driver task.
///
/// Every request is acknowledged by the task. Deliveries already queued when a
/// request is sent are processed first, and the change is in effect for all
/// deliveries that follow.
pub struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<LinkState>,
    cancel: CancellationToken,
}

impl DriverHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(build(tx)).map_err(|_| LinkError::not_connected("driver request"))?;
        rx.await.map_err(|_| LinkError::not_connected("driver request"))
    }

    /// Clear the reassembler's residue and duplicate state.
    pub async fn reset(&self) -> Result<()> {
        self.request(Command::Reset).await
    }

    /// Open or close the delivery gate.
    pub async fn set_streaming(&self, streaming: bool) -> Result<()> {
        self.request(|ack| Command::Gate(streaming, ack)).await
    }

    /// Register the record consumer, replacing any previous one.
    pub async fn set_consumer(&self, consumer: Option<RecordCallback>) -> Result<()> {
        self.request(|ack| Command::Consumer(consumer, ack)).await
    }

    pub async fn set_on_disconnect(&self, callback: DisconnectCallback) -> Result<()> {
        self.request(|ack| Command::OnDisconnect(callback, ack)).await
    }

    /// Run disconnect cleanup without waiting for the transport's notification.
    ///
    /// Succeeds when the task has already ended.
    pub async fn detach(&self) -> Result<()> {
        match self.request(Command::Detach).await {
            Ok(()) | Err(LinkError::NotConnected { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn stats(&self) -> Result<ReassemblyStats> {
        self.request(Command::Stats).await
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns the task that serializes deliveries, resets and disconnects.
pub struct Driver;

struct DriverTask {
    reassembler: Reassembler,
    consumer: Option<RecordCallback>,
    on_disconnect: Option<DisconnectCallback>,
    streaming: bool,
    state: watch::Sender<LinkState>,
}

impl Driver {
    /// Spawn the driver for a freshly opened link.
    pub fn spawn(
        reassembler: Reassembler,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> DriverHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Connected);
        let cancel = CancellationToken::new();

        let task = DriverTask {
            reassembler,
            consumer: None,
            on_disconnect: None,
            streaming: false,
            state: state_tx,
        };
        tokio::spawn(task.run(command_rx, events, cancel.clone()));

        DriverHandle { commands: command_tx, state: state_rx, cancel }
    }
}

impl DriverTask {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        cancel: CancellationToken,
    ) {
        debug!("Driver task started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Driver cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(TransportEvent::Data(bytes)) => self.deliver(&bytes),
                    Some(TransportEvent::Disconnected) | None => {
                        info!("Device disconnected");
                        self.shut_down();
                        break;
                    }
                },
                Some(command) = commands.recv() => {
                    if self.handle_command(command) {
                        break;
                    }
                }
            }
        }

        let stats = self.reassembler.stats();
        info!(
            records = stats.records_emitted,
            duplicates = stats.duplicates_suppressed,
            resyncs = stats.resyncs,
            "Driver task ended"
        );
    }

    /// Returns `true` when the task should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Reset(ack) => {
                self.reassembler.reset();
                let _ = ack.send(());
            }
            Command::Gate(open, ack) => {
                self.streaming = open;
                self.state.send_replace(if open { LinkState::Streaming } else { LinkState::Connected });
                let _ = ack.send(());
            }
            Command::Consumer(consumer, ack) => {
                self.consumer = consumer;
                let _ = ack.send(());
            }
            Command::OnDisconnect(callback, ack) => {
                self.on_disconnect = Some(callback);
                let _ = ack.send(());
            }
            Command::Detach(ack) => {
                self.shut_down();
                let _ = ack.send(());
                return true;
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.reassembler.stats());
            }
        }
        false
    }

    fn deliver(&mut self, bytes: &[u8]) {
        let Some(consumer) = self.consumer.as_mut().filter(|_| self.streaming) else {
            trace!(len = bytes.len(), "Dropping delivery outside an active stream");
            return;
        };
        trace!(len = bytes.len(), "Delivery");
        self.reassembler.on_delivery(bytes, |record| consumer(&record));
    }

    fn shut_down(&mut self) {
        self.streaming = false;
        self.consumer = None;
        self.reassembler.reset();
        self.state.send_replace(LinkState::Disconnected);
        if let Some(callback) = self.on_disconnect.take() {
            callback();
        }
    }
}
