//! # Transport Client
//!
//! Background task owning one replication connection.
//!
//! ## Features
//!
//! - **Automatic reconnect**: a lost or refused connection is retried after
//!   the [`ReconnectPolicy`] delay until attempts run out
//! - **Heartbeat**: a `heartbeat` envelope every `heartbeat_interval` while
//!   connected
//! - **Outbound buffer**: envelopes sent while disconnected wait in order
//!   and are flushed after the next successful connect. When reconnect
//!   attempts run out they are handed back as
//!   [`TransportEvent::Undelivered`]
//! - **Inbound decoding**: frames become [`TransportEvent::Inbound`]; bad
//!   frames are reported as [`TransportEvent::Error`] and skipped

use super::retry::ReconnectPolicy;
use super::{
    decode_frame, encode_frame, Connection, Connector, Envelope, TransportError, TransportEvent,
    TransportStatus, HEARTBEAT,
};
use crate::shared::config::TransportConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to a running client task
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::Sender<Envelope>,
    events: mpsc::Receiver<TransportEvent>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Queue an envelope for delivery. Buffered while disconnected.
    pub async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed)
    }

    pub fn sender(&self) -> mpsc::Sender<Envelope> {
        self.outbound.clone()
    }

    /// Next lifecycle or inbound event; `None` once the task has ended
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Split into sender, event stream and task handle
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Sender<Envelope>,
        mpsc::Receiver<TransportEvent>,
        JoinHandle<()>,
    ) {
        (self.outbound, self.events, self.task)
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Spawn the client task. Must be called inside a tokio runtime.
pub fn spawn_client(connector: Arc<dyn Connector>, config: &TransportConfig) -> TransportHandle {
    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer);
    let (events_tx, events_rx) = mpsc::channel(config.outbound_buffer);
    let client = Client {
        connector,
        policy: ReconnectPolicy::from_config(config),
        heartbeat: config.heartbeat_interval(),
        pending: VecDeque::new(),
        outbound: outbound_rx,
        events: events_tx,
    };
    let task = tokio::spawn(client.run());
    TransportHandle {
        outbound: outbound_tx,
        events: events_rx,
        task,
    }
}

/// How a connection ended
enum Ended {
    /// The peer went away; reconnect
    Lost,
    /// Every handle was dropped; stop
    Shutdown,
}

struct Client {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    heartbeat: Duration,
    pending: VecDeque<Envelope>,
    outbound: mpsc::Receiver<Envelope>,
    events: mpsc::Sender<TransportEvent>,
}

impl Client {
    async fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    async fn run(mut self) {
        if !self.emit(TransportEvent::Status(TransportStatus::Connecting)).await {
            return;
        }
        loop {
            match self.connector.connect().await {
                Ok(connection) => {
                    self.policy.reset();
                    tracing::info!("[Transport] Connected ({} buffered)", self.pending.len());
                    if !self.emit(TransportEvent::Status(TransportStatus::Connected)).await {
                        return;
                    }
                    match self.serve(connection).await {
                        Ended::Shutdown => return,
                        Ended::Lost => {
                            tracing::info!("[Transport] Connection lost");
                            if !self.emit(TransportEvent::Status(TransportStatus::Disconnected)).await {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("[Transport] {}", e);
                    if !self.emit(TransportEvent::Error(e.to_string())).await {
                        return;
                    }
                }
            }

            let Some(delay) = self.policy.next_delay() else {
                tracing::warn!("[Transport] Reconnect attempts exhausted");
                self.give_up().await;
                return;
            };
            let status = TransportStatus::Reconnecting {
                attempt: self.policy.attempt(),
            };
            if !self.emit(TransportEvent::Status(status)).await {
                return;
            }
            if let Ended::Shutdown = self.buffer_for(delay).await {
                return;
            }
        }
    }

    /// Return everything still buffered, then report failure
    async fn give_up(&mut self) {
        self.outbound.close();
        while let Ok(envelope) = self.outbound.try_recv() {
            self.pending.push_back(envelope);
        }
        let undelivered: Vec<Envelope> = self
            .pending
            .drain(..)
            .filter(|envelope| envelope.kind != HEARTBEAT)
            .collect();
        if !undelivered.is_empty() {
            tracing::warn!("[Transport] Returning {} undelivered envelopes", undelivered.len());
            if !self.emit(TransportEvent::Undelivered(undelivered)).await {
                return;
            }
        }
        self.emit(TransportEvent::Status(TransportStatus::Failed)).await;
    }

    /// Keep accepting outbound envelopes while waiting out a backoff delay
    async fn buffer_for(&mut self, delay: Duration) -> Ended {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Ended::Lost,
                envelope = self.outbound.recv() => match envelope {
                    Some(envelope) => self.pending.push_back(envelope),
                    None => return Ended::Shutdown,
                },
            }
        }
    }

    /// Send buffered envelopes in order. Stops at the first failure and
    /// keeps the unsent ones.
    async fn flush(&mut self, outgoing: &mpsc::Sender<String>) -> Result<(), Ended> {
        while let Some(envelope) = self.pending.front() {
            match encode_frame(envelope) {
                Ok(frame) => {
                    if outgoing.send(frame).await.is_err() {
                        return Err(Ended::Lost);
                    }
                }
                Err(e) => {
                    tracing::error!("[Transport] Dropping unencodable '{}' envelope: {}", envelope.kind, e);
                }
            }
            self.pending.pop_front();
        }
        Ok(())
    }

    async fn serve(&mut self, connection: Connection) -> Ended {
        let Connection {
            outgoing,
            mut incoming,
        } = connection;
        if let Err(ended) = self.flush(&outgoing).await {
            return ended;
        }

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        heartbeat.tick().await;

        loop {
            tokio::select! {
                envelope = self.outbound.recv() => match envelope {
                    Some(envelope) => self.pending.push_back(envelope),
                    None => return Ended::Shutdown,
                },
                frame = incoming.recv() => match frame {
                    Some(frame) => {
                        let event = match decode_frame(&frame) {
                            Ok(envelope) => TransportEvent::Inbound(envelope),
                            Err(e) => {
                                tracing::warn!("[Transport] Skipping bad frame: {}", e);
                                TransportEvent::Error(e.to_string())
                            }
                        };
                        if !self.emit(event).await {
                            return Ended::Shutdown;
                        }
                        continue;
                    }
                    None => return Ended::Lost,
                },
                _ = heartbeat.tick() => {
                    tracing::trace!("[Transport] Heartbeat");
                    self.pending.push_back(Envelope::heartbeat());
                }
            }
            if let Err(ended) = self.flush(&outgoing).await {
                return ended;
            }
        }
    }
}
