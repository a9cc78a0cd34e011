//! # Engine Runtime
//!
//! Runs an [`Engine`] on its own tokio task.
//!
//! The task owns the engine outright, so surface state still has exactly one
//! mutator. Callers talk to it through a cloneable [`EngineHandle`] that
//! sends commands over an mpsc channel and awaits a oneshot reply.
//!
//! ## Loop
//!
//! - a frame interval ticks the engine every `frame_budget`; residual queue
//!   work ticks again immediately
//! - commands from handles are served between ticks
//! - transport events update the connection status, start a `sync` on
//!   connect, and feed inbound envelopes back into the queue
//! - outbound envelopes stay in the engine until the transport has room;
//!   the loop never waits on a full transport channel, so it keeps draining
//!   transport events
//! - envelopes a failed transport hands back are kept and go out first once
//!   a new transport is attached with [`EngineHandle::attach_transport`]
//!
//! [`RunningEngine::stop`] ends the loop and hands the engine back.

use super::{Engine, MetricsSnapshot, SurfaceState};
use crate::realtime::{EventBus, Subscription};
use crate::shared::change::{Change, Payload};
use crate::shared::error::SyncError;
use crate::transport::{Envelope, TransportEvent, TransportHandle, TransportStatus};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::OwnedPermit;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

const COMMAND_BUFFER: usize = 64;

enum Command {
    Submit {
        change: Change,
        reply: oneshot::Sender<Result<(), SyncError>>,
    },
    Create {
        surface: String,
        payload: Payload,
        reply: oneshot::Sender<Result<Uuid, SyncError>>,
    },
    Undo {
        reply: oneshot::Sender<Result<bool, SyncError>>,
    },
    Redo {
        reply: oneshot::Sender<Result<bool, SyncError>>,
    },
    Metrics {
        reply: oneshot::Sender<MetricsSnapshot>,
    },
    Surface {
        name: String,
        reply: oneshot::Sender<Option<SurfaceState>>,
    },
    TakeDirty {
        reply: oneshot::Sender<Vec<String>>,
    },
    Attach {
        transport: TransportHandle,
        reply: oneshot::Sender<Result<(), SyncError>>,
    },
    Stop,
}

/// Cloneable handle to a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    events: EventBus,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SyncError::EngineStopped)?;
        response.await.map_err(|_| SyncError::EngineStopped)
    }

    /// Queue a fully formed change
    pub async fn submit(&self, change: Change) -> Result<(), SyncError> {
        self.request(|reply| Command::Submit { change, reply }).await?
    }

    /// Queue a local change on `surface`, stamped by the engine's site
    pub async fn create(&self, surface: impl Into<String>, payload: Payload) -> Result<Uuid, SyncError> {
        let surface = surface.into();
        self.request(|reply| Command::Create {
            surface,
            payload,
            reply,
        })
        .await?
    }

    pub async fn undo(&self) -> Result<bool, SyncError> {
        self.request(|reply| Command::Undo { reply }).await?
    }

    pub async fn redo(&self) -> Result<bool, SyncError> {
        self.request(|reply| Command::Redo { reply }).await?
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot, SyncError> {
        self.request(|reply| Command::Metrics { reply }).await
    }

    /// Copy of one surface's current state
    pub async fn surface(&self, name: impl Into<String>) -> Result<Option<SurfaceState>, SyncError> {
        let name = name.into();
        self.request(|reply| Command::Surface { name, reply }).await
    }

    /// Dirty regions accumulated since the last call; clears them
    pub async fn take_dirty_regions(&self) -> Result<Vec<String>, SyncError> {
        self.request(|reply| Command::TakeDirty { reply }).await
    }

    /// Replicate through `transport`. Refused while another transport is
    /// still running.
    pub async fn attach_transport(&self, transport: TransportHandle) -> Result<(), SyncError> {
        self.request(|reply| Command::Attach { transport, reply }).await?
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// An engine moved onto its frame-loop task
#[derive(Debug)]
pub struct RunningEngine {
    handle: EngineHandle,
    task: JoinHandle<Engine>,
}

impl RunningEngine {
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the frame loop and take the engine back
    pub async fn stop(self) -> Result<Engine, SyncError> {
        // A closed channel means the loop already ended
        let _ = self.handle.commands.send(Command::Stop).await;
        self.task.await.map_err(|e| {
            tracing::error!("[Runtime] Engine task failed: {}", e);
            SyncError::EngineStopped
        })
    }
}

impl Engine {
    /// Move the engine onto a tokio task. Must be called inside a runtime.
    pub fn start(self) -> RunningEngine {
        spawn(self, None)
    }

    /// Like [`Engine::start`], replicating through `transport`
    pub fn start_with_transport(self, transport: TransportHandle) -> RunningEngine {
        spawn(self, Some(transport))
    }
}

fn spawn(engine: Engine, transport: Option<TransportHandle>) -> RunningEngine {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = EngineHandle {
        commands: commands_tx,
        events: engine.events().clone(),
    };
    let task = tokio::spawn(run(engine, commands_rx, transport));
    RunningEngine { handle, task }
}

/// The transport a running engine replicates through
struct Link {
    outbound: Option<mpsc::Sender<Envelope>>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    task: Option<JoinHandle<()>>,
    /// Set once any transport was attached; until then outbound work is
    /// discarded
    replicating: bool,
}

impl Link {
    fn new(transport: Option<TransportHandle>) -> Self {
        let mut link = Self {
            outbound: None,
            events: None,
            task: None,
            replicating: false,
        };
        if let Some(transport) = transport {
            link.attach(transport);
        }
        link
    }

    fn attach(&mut self, transport: TransportHandle) {
        let (outbound, events, task) = transport.into_parts();
        self.outbound = Some(outbound);
        self.events = Some(events);
        self.task = Some(task);
        self.replicating = true;
    }

    fn is_live(&self) -> bool {
        self.events.is_some()
    }

    fn close(&mut self) {
        self.outbound = None;
        self.events = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    mut engine: Engine,
    mut commands: mpsc::Receiver<Command>,
    transport: Option<TransportHandle>,
) -> Engine {
    let mut link = Link::new(transport);

    engine.scheduler_mut().start();
    let mut frames = tokio::time::interval(engine.config().frame_budget());
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("[Runtime] Engine {} started", engine.site_id());

    loop {
        let immediate = engine.needs_immediate_tick();
        let sending = link.outbound.clone().filter(|_| engine.has_outbound());
        tokio::select! {
            _ = frames.tick() => {
                engine.tick();
                flush(&mut engine, &mut link, None);
            }
            _ = std::future::ready(()), if immediate => {
                engine.tick();
                flush(&mut engine, &mut link, None);
            }
            permit = reserve(sending.clone()), if sending.is_some() => {
                match permit {
                    Some(permit) => flush(&mut engine, &mut link, Some(permit)),
                    None => link.outbound = None,
                }
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Stop) | None => break,
                    Some(Command::Attach { transport, reply }) => {
                        let result = if link.is_live() {
                            transport.shutdown();
                            Err(SyncError::transport("a transport is already attached"))
                        } else {
                            tracing::info!("[Runtime] Transport attached");
                            link.attach(transport);
                            Ok(())
                        };
                        let _ = reply.send(result);
                    }
                    Some(command) => serve(&mut engine, command),
                }
            }
            event = recv_transport(&mut link.events), if link.is_live() => {
                match event {
                    Some(event) => {
                        on_transport_event(&mut engine, event);
                        flush(&mut engine, &mut link, None);
                    }
                    None => {
                        tracing::warn!("[Runtime] Transport task ended");
                        link.close();
                        engine.set_transport_status(TransportStatus::Failed);
                    }
                }
            }
        }
    }

    engine.scheduler_mut().stop();
    link.close();
    tracing::info!("[Runtime] Engine {} stopped", engine.site_id());
    engine
}

async fn recv_transport(events: &mut Option<mpsc::Receiver<TransportEvent>>) -> Option<TransportEvent> {
    match events.as_mut() {
        Some(events) => events.recv().await,
        None => None,
    }
}

/// Wait for room in the transport channel; `None` once it is closed
async fn reserve(outbound: Option<mpsc::Sender<Envelope>>) -> Option<OwnedPermit<Envelope>> {
    match outbound {
        Some(outbound) => outbound.reserve_owned().await.ok(),
        None => std::future::pending().await,
    }
}

/// Move outbound envelopes into the transport channel without waiting.
/// Whatever does not fit stays in the engine for the next permit.
fn flush(engine: &mut Engine, link: &mut Link, permit: Option<OwnedPermit<Envelope>>) {
    if !link.replicating {
        let discarded = engine.take_outbound().len();
        if discarded > 0 {
            tracing::trace!("[Runtime] No transport, {} envelopes discarded", discarded);
        }
        return;
    }
    let Some(outbound) = link.outbound.as_ref() else {
        return;
    };

    let mut envelopes = engine.take_outbound().into_iter();
    if let Some(permit) = permit {
        match envelopes.next() {
            Some(envelope) => {
                permit.send(envelope);
            }
            None => return,
        }
    }
    while let Some(envelope) = envelopes.next() {
        match outbound.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => {
                engine.return_outbound(std::iter::once(envelope).chain(envelopes));
                return;
            }
            Err(TrySendError::Closed(envelope)) => {
                tracing::warn!("[Runtime] Transport closed, keeping outbound envelopes");
                engine.return_outbound(std::iter::once(envelope).chain(envelopes));
                link.outbound = None;
                return;
            }
        }
    }
}

fn on_transport_event(engine: &mut Engine, event: TransportEvent) {
    match event {
        TransportEvent::Status(status) => {
            engine.set_transport_status(status);
            if status == TransportStatus::Connected {
                match Envelope::sync(engine.vector_clock()) {
                    Ok(sync) => engine.queue_envelope(sync),
                    Err(e) => tracing::warn!("[Runtime] Could not encode sync request: {}", e),
                }
            }
        }
        TransportEvent::Inbound(envelope) => {
            for reply in engine.handle_envelope(&envelope) {
                engine.queue_envelope(reply);
            }
        }
        TransportEvent::Undelivered(envelopes) => {
            tracing::warn!("[Runtime] Transport gave up on {} envelopes", envelopes.len());
            engine.return_outbound(envelopes);
        }
        TransportEvent::Error(message) => {
            tracing::warn!("[Runtime] Transport error: {}", message);
        }
    }
}

fn serve(engine: &mut Engine, command: Command) {
    // A dropped reply receiver only means the caller stopped waiting
    match command {
        Command::Submit { change, reply } => {
            let _ = reply.send(engine.submit(change));
        }
        Command::Create {
            surface,
            payload,
            reply,
        } => {
            let change = engine.change(&surface, payload);
            let id = change.id;
            let _ = reply.send(engine.submit(change).map(|_| id));
        }
        Command::Undo { reply } => {
            let _ = reply.send(engine.undo());
        }
        Command::Redo { reply } => {
            let _ = reply.send(engine.redo());
        }
        Command::Metrics { reply } => {
            let _ = reply.send(engine.metrics());
        }
        Command::Surface { name, reply } => {
            let _ = reply.send(engine.surface(&name).cloned());
        }
        Command::TakeDirty { reply } => {
            let regions = engine.dirty_regions();
            engine.clear_dirty_regions();
            let _ = reply.send(regions);
        }
        // Handled by the loop
        Command::Attach { .. } | Command::Stop => {}
    }
}
