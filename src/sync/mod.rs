//! # Synchronization Engine
//!
//! The scheduler that owns every surface's state and is its only mutator.
//!
//! ## Features
//!
//! - **Change queue**: validated submissions ordered by priority then logical
//!   time, bounded with low-priority eviction
//! - **Frame ticks**: each [`Engine::tick`] drains up to `batch_size` changes,
//!   plans them through the merge pipeline and applies the result
//! - **Loop guard**: bounds translator echo cycles per `(surface, label)`
//! - **Translators**: applied local changes fan out to other surfaces by
//!   re-entering the queue
//! - **History**: every tick's local changes form one undoable batch
//! - **Replication**: applied changes queue up as outbound envelopes and
//!   remote envelopes re-enter the same queue. OT changes carry the clock of
//!   what their author had applied, and the [`causal`] log rebases them over
//!   whatever this replica applied concurrently
//!
//! ## Usage
//!
//! ```rust
//! use xfcanvas::shared::{EngineConfig, Payload, Value};
//! use xfcanvas::sync::Engine;
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let change = engine.change(
//!     "draw",
//!     Payload::Insert { target: "stroke-1".into(), value: Value::Bool(true) },
//! );
//! engine.submit(change).unwrap();
//! engine.tick();
//! assert!(engine.surface("draw").unwrap().entity("stroke-1").is_some());
//! ```
//!
//! [`Engine::start`] moves the engine into a tokio task that ticks it on a
//! fixed frame budget; see [`runtime`].

pub mod causal;
pub mod history;
pub mod loop_guard;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod runtime;
pub mod scheduler;
pub mod surface;
pub mod translator;

pub use causal::CausalLog;
pub use history::{HistoryEntry, HistoryManager};
pub use loop_guard::LoopGuard;
pub use metrics::{EngineMetrics, Gauges, MetricsSnapshot};
pub use queue::ChangeQueue;
pub use runtime::{EngineHandle, RunningEngine};
pub use scheduler::FrameScheduler;
pub use surface::{SurfaceData, SurfaceState};
pub use translator::{FnTranslator, Translator};

use crate::conflict::{ConflictResolver, Preference};
use crate::crdt::{CrdtOp, CrdtStats, Dot};
use crate::ot::OtStats;
use crate::realtime::{EventBus, Subscription};
use crate::shared::change::{Change, Origin, Payload, Priority};
use crate::shared::clock::VectorClock;
use crate::shared::config::EngineConfig;
use crate::shared::error::SyncError;
use crate::shared::event::EngineEvent;
use crate::shared::site::Site;
use crate::transport::{Envelope, Message, TransportStatus};
use chrono::Utc;
use pipeline::Step;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use uuid::Uuid;

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub batch_id: Option<Uuid>,
    pub drained: usize,
    pub applied: usize,
    pub rejected: usize,
    pub conflicts: usize,
    /// Changes still queued after the tick
    pub residual: usize,
}

pub struct Engine {
    config: EngineConfig,
    site: Site,
    surfaces: BTreeMap<String, SurfaceState>,
    queue: ChangeQueue,
    loop_guard: LoopGuard,
    scheduler: FrameScheduler,
    resolver: ConflictResolver,
    history: HistoryManager,
    translators: Vec<Box<dyn Translator>>,
    events: EventBus,
    metrics: EngineMetrics,
    crdt_stats: CrdtStats,
    ot_stats: OtStats,
    dirty: BTreeSet<String>,
    outbound: VecDeque<Change>,
    /// Protocol envelopes and envelopes a transport handed back, sent ahead
    /// of `outbound`
    unsent: VecDeque<Envelope>,
    /// Highest logical time seen per `"{site}/{surface}"`
    seen: VectorClock,
    /// Highest logical time applied per `"{site}/{surface}"`
    applied: VectorClock,
    causal: CausalLog,
    recent_ids: VecDeque<Uuid>,
    recent_set: HashSet<Uuid>,
    /// Applied changes kept to answer sync requests
    replication_log: VecDeque<Change>,
    transport_status: TransportStatus,
}

impl Engine {
    /// Create an engine with a random site id
    pub fn new(config: EngineConfig) -> Result<Self, SyncError> {
        Self::with_site(config, Site::random())
    }

    pub fn with_site(config: EngineConfig, site: Site) -> Result<Self, SyncError> {
        config.validate()?;

        let surfaces = config
            .surfaces
            .iter()
            .map(|name| (name.clone(), SurfaceState::new(name.clone())))
            .collect();

        tracing::info!(
            "[Engine] Site {} ready with surfaces {:?}",
            site.id(),
            config.surfaces
        );

        Ok(Self {
            queue: ChangeQueue::new(config.queue_capacity),
            loop_guard: LoopGuard::new(&config),
            scheduler: FrameScheduler::new(config.frame_budget()),
            resolver: ConflictResolver::new(&config),
            history: HistoryManager::new(config.history_limit),
            events: EventBus::new(config.event_channel_capacity),
            translators: Vec::new(),
            metrics: EngineMetrics::new(),
            crdt_stats: CrdtStats::default(),
            ot_stats: OtStats::default(),
            dirty: BTreeSet::new(),
            outbound: VecDeque::new(),
            unsent: VecDeque::new(),
            seen: VectorClock::new(),
            applied: VectorClock::new(),
            causal: CausalLog::new(config.dedup_window),
            recent_ids: VecDeque::new(),
            recent_set: HashSet::new(),
            replication_log: VecDeque::new(),
            transport_status: TransportStatus::default(),
            surfaces,
            site,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn site_id(&self) -> &str {
        self.site.id()
    }

    /// A local change stamped with this site and the surface's next logical time
    pub fn change(&mut self, surface: &str, payload: Payload) -> Change {
        let logical_time = self.site.next_logical_time(surface);
        Change::new(surface, logical_time, payload).with_site(self.site.id())
    }

    /// Validate a change and queue it for the next tick.
    ///
    /// Remote changes already seen are dropped without error. A change the
    /// queue evicts to make room is reported as rejected.
    pub fn submit(&mut self, mut change: Change) -> Result<(), SyncError> {
        if let Err(e) = self.validate(&change) {
            self.metrics.invalid_rejected += 1;
            tracing::debug!("[Engine] Rejected change {}: {}", change.id, e);
            self.events.publish(EngineEvent::rejected(
                change.id,
                change.source_surface.clone(),
                e.to_string(),
            ));
            return Err(e);
        }

        if change.origin == Origin::Remote && self.is_duplicate(&change) {
            self.metrics.duplicates_dropped += 1;
            tracing::trace!("[Engine] Dropped duplicate change {}", change.id);
            return Ok(());
        }

        if let Err(e) = self.loop_guard.check(&change) {
            self.metrics.loop_rejected += 1;
            if let SyncError::LoopDetected {
                surface,
                label,
                count,
            } = &e
            {
                self.events.publish(EngineEvent::LoopDetected {
                    surface: surface.clone(),
                    label: label.clone(),
                    count: *count,
                });
            }
            return Err(e);
        }

        let stamp = change.order_key();
        if let Some(op) = change.ot_op.as_mut() {
            op.stamp = stamp;
            if change.context.is_none() && !change.origin.is_remote() {
                change.context = Some(self.applied.clone());
            }
        }

        self.site.observe(&change.source_surface, change.logical_time);
        self.seen.observe(
            &format!("{}/{}", change.site, change.source_surface),
            change.logical_time,
        );
        if change.origin == Origin::Remote {
            self.remember(change.id);
        }

        if let Some(evicted) = self.queue.push(change) {
            self.events.publish(EngineEvent::rejected(
                evicted.id,
                evicted.source_surface,
                "evicted from a full queue",
            ));
        }
        Ok(())
    }

    fn validate(&self, change: &Change) -> Result<(), SyncError> {
        if change.id.is_nil() {
            return Err(SyncError::invalid("id", "missing id"));
        }
        if !self.surfaces.contains_key(&change.source_surface) {
            return Err(SyncError::invalid(
                "source_surface",
                format!("unknown surface '{}'", change.source_surface),
            ));
        }
        if change.logical_time == 0 {
            return Err(SyncError::invalid("logical_time", "must be positive"));
        }
        Ok(())
    }

    fn is_duplicate(&self, change: &Change) -> bool {
        change.site == self.site.id() || self.recent_set.contains(&change.id)
    }

    fn remember(&mut self, id: Uuid) {
        if self.recent_set.insert(id) {
            self.recent_ids.push_back(id);
        }
        while self.recent_ids.len() > self.config.dedup_window {
            if let Some(oldest) = self.recent_ids.pop_front() {
                self.recent_set.remove(&oldest);
            }
        }
    }

    /// Drain one batch from the queue and apply it
    pub fn tick(&mut self) -> TickReport {
        let frame_start = self.scheduler.begin_frame();
        let batch = self.queue.drain(self.config.batch_size);
        self.metrics.record_drained(batch.len());

        if batch.is_empty() {
            let report = self.scheduler.end_frame(false);
            self.metrics.record_frame(report.duration, std::time::Duration::ZERO);
            return TickReport::default();
        }

        let batch_id = Uuid::new_v4();
        let drained = batch.len();
        let plan = pipeline::plan(&batch, &mut self.resolver);
        for ((surface, kind), count) in &plan.groups {
            tracing::trace!("[Engine] Batch {} group {}/{}: {}", batch_id, surface, kind.as_str(), count);
        }

        let conflicts = plan.records.len();
        for record in plan.records {
            if !record.is_noop {
                self.metrics.conflicts_resolved += 1;
            }
            tracing::debug!(
                "[Engine] Conflict on {} resolved by {}: {}",
                record.applied.target_key(),
                record.strategy,
                record.reason
            );
            self.events.publish(EngineEvent::ConflictResolved { record });
        }

        let mut applied = Vec::new();
        let mut rejected = 0;
        for step in plan.steps {
            match step {
                Step::Apply(change) => match self.apply_change(change.with_batch(batch_id)) {
                    Some(change) => applied.push(change),
                    None => rejected += 1,
                },
                Step::Reject {
                    change,
                    reason,
                    corruption,
                } => {
                    rejected += 1;
                    if corruption {
                        tracing::error!(
                            "[Engine] Corrupt change {} on {} rolled back: {}",
                            change.id,
                            change.source_surface,
                            reason
                        );
                        self.events.publish(EngineEvent::CorruptionDetected {
                            operations: 1,
                            reason: reason.clone(),
                        });
                    }
                    self.events
                        .publish(EngineEvent::rejected(change.id, change.source_surface, reason));
                }
            }
        }

        if self.history.record_batch(batch_id, &applied) {
            self.publish_history();
        }
        if !applied.is_empty() {
            self.events.publish(EngineEvent::DirtyRegions {
                regions: self.dirty_regions(),
            });
        }

        let batch_time = frame_start.elapsed();
        let residual = self.queue.len();
        let frame = self.scheduler.end_frame(residual > 0);
        self.metrics.record_frame(frame.duration, batch_time);

        tracing::trace!(
            "[Engine] Tick {}: {} drained, {} applied, {} rejected, {} residual",
            batch_id,
            drained,
            applied.len(),
            rejected,
            residual
        );

        TickReport {
            batch_id: Some(batch_id),
            drained,
            applied: applied.len(),
            rejected,
            conflicts,
            residual,
        }
    }

    /// Apply one planned change; returns it with captured snapshots
    fn apply_change(&mut self, mut change: Change) -> Option<Change> {
        if !self.surfaces.contains_key(&change.source_surface) {
            self.events.publish(EngineEvent::rejected(
                change.id,
                change.source_surface.clone(),
                "unknown surface",
            ));
            return None;
        }

        let rebased = change
            .ot_op
            .as_ref()
            .map(|op| self.causal.rebase(&change, op, &mut self.ot_stats));
        if let Some(rebased) = &rebased {
            if rebased.op.conflict {
                tracing::debug!(
                    "[Engine] Transform conflict on '{}' for change {}",
                    rebased.op.context_id,
                    change.id
                );
            }
            change.ot_op = Some(rebased.op.clone());
            // The rebased op is defined on everything applied so far
            change.context = Some(self.applied.clone());
        }

        let surface = self.surfaces.get_mut(&change.source_surface)?;
        let applied = match surface.apply(&change) {
            Ok(applied) => applied,
            Err(SyncError::Superseded { target }) => {
                self.metrics.superseded_writes += 1;
                tracing::debug!("[Engine] Change {} lost to a newer write of '{}'", change.id, target);
                self.events.publish(EngineEvent::rejected(
                    change.id,
                    change.source_surface.clone(),
                    "superseded by a newer write",
                ));
                return None;
            }
            Err(e) => {
                if change.crdt_op.is_some() && change.ot_op.is_none() {
                    self.crdt_stats.failed_operations += 1;
                }
                self.metrics.invalid_rejected += 1;
                tracing::warn!("[Engine] Change {} failed to apply: {}", change.id, e);
                self.events.publish(EngineEvent::rejected(
                    change.id,
                    change.source_surface.clone(),
                    e.to_string(),
                ));
                return None;
            }
        };
        let version = surface.version;

        if let Some(rebased) = rebased {
            self.causal.commit(rebased);
        }
        self.applied
            .observe(&causal::origin_key(&change), change.logical_time);
        if let Some(outcome) = applied.crdt_outcome {
            self.crdt_stats.record(&Ok(outcome));
        }
        if applied.change.ot_op.is_some() && change.origin.is_replay() {
            self.ot_stats.inversions += 1;
        }
        self.metrics.record_applied();

        let change = applied.change;
        let target = change.target_key().to_string();
        self.dirty
            .insert(format!("{}:{}", change.source_surface, target));

        if change.origin == Origin::Remote {
            let latency = Utc::now() - change.created_at;
            self.metrics
                .record_sync_latency(latency.num_milliseconds().max(0) as f64);
        }

        self.events.publish(EngineEvent::ChangeApplied {
            id: change.id,
            surface: change.source_surface.clone(),
            target,
            version,
        });

        self.fan_out(&change);

        if change.origin != Origin::Remote {
            self.outbound.push_back(change.clone());
        }
        self.replication_log.push_back(change.clone());
        while self.replication_log.len() > self.config.dedup_window {
            self.replication_log.pop_front();
        }

        Some(change)
    }

    /// Run translators on a user or translated change and queue their output
    fn fan_out(&mut self, change: &Change) {
        if !matches!(change.origin, Origin::Local | Origin::Translated) {
            return;
        }

        let mut produced = Vec::new();
        for translator in &self.translators {
            match translator.translate(change) {
                Ok(changes) => produced.extend(changes),
                Err(e) => {
                    self.metrics.translation_failures += 1;
                    tracing::warn!(
                        "[Engine] Translator {} failed on {}: {}",
                        translator.name(),
                        change.id,
                        e
                    );
                    self.events.publish(EngineEvent::TranslationFailed {
                        translator: translator.name().to_string(),
                        change_id: change.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        for mut derived in produced {
            derived.origin = Origin::Translated;
            derived.site = self.site.id().to_string();
            derived.logical_time = self.site.next_logical_time(&derived.source_surface);
            derived.context = None;
            if let Err(e) = self.submit(derived) {
                tracing::debug!("[Engine] Translated change not queued: {}", e);
            }
        }
    }

    /// Re-submit the inverse of the last recorded batch.
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, SyncError> {
        let Some(inverse) = self.history.undo() else {
            return Ok(false);
        };
        let replay = self.replay(inverse, Origin::Undo)?;
        self.history.rebase_undone(replay);
        self.publish_history();
        Ok(true)
    }

    /// Re-submit the next undone batch.
    ///
    /// Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, SyncError> {
        let Some(forward) = self.history.redo() else {
            return Ok(false);
        };
        let replay = self.replay(forward, Origin::Redo)?;
        self.history.rebase_redone(replay);
        self.publish_history();
        Ok(true)
    }

    /// Restamp history changes as fresh user actions and queue them
    fn replay(&mut self, changes: Vec<Change>, origin: Origin) -> Result<Vec<Change>, SyncError> {
        let mut submitted = Vec::with_capacity(changes.len());
        for mut change in changes {
            change.id = Uuid::new_v4();
            change.origin = origin;
            change.site = self.site.id().to_string();
            change.logical_time = self.site.next_logical_time(&change.source_surface);
            change.priority = Priority::UserAction;
            change.batch_id = None;
            change.context = None;
            change.created_at = Utc::now();
            if let Some(op) = change.crdt_op.take() {
                change.crdt_op = Some(self.restamp_crdt(&change, op));
            }
            submitted.push(change.clone());
            self.submit(change)?;
        }
        Ok(submitted)
    }

    /// Give creating CRDT ops a Lamport stamp above everything the replica holds
    fn restamp_crdt(&self, change: &Change, op: CrdtOp) -> CrdtOp {
        let Some(surface) = self.surfaces.get(&change.source_surface) else {
            return op;
        };
        let path = op
            .path()
            .unwrap_or_else(|| change.payload.target())
            .to_string();
        let floor = surface.replicas().max_clock(&path);
        fresh_stamp(op, floor + 1, self.site.id())
    }

    fn publish_history(&self) {
        self.events.publish(EngineEvent::HistoryChanged {
            len: self.history.len(),
            index: self.history.index(),
        });
    }

    pub fn register_translator(&mut self, translator: Box<dyn Translator>) {
        tracing::info!("[Engine] Registered translator {}", translator.name());
        self.translators.push(translator);
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut ConflictResolver {
        &mut self.resolver
    }

    pub fn set_preference(&mut self, surface: impl Into<String>, preference: Preference) {
        self.resolver.set_preference(surface, preference);
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn surface(&self, name: &str) -> Option<&SurfaceState> {
        self.surfaces.get(name)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &SurfaceState> {
        self.surfaces.values()
    }

    /// `(version, checksum)` of a surface
    pub fn fingerprint(&self, name: &str) -> Result<(u64, String), SyncError> {
        self.surfaces
            .get(name)
            .map(|surface| (surface.version, surface.checksum.clone()))
            .ok_or_else(|| SyncError::UnknownSurface {
                surface: name.to_string(),
            })
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn dirty_regions(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    pub fn clear_dirty_regions(&mut self) {
        self.dirty.clear();
    }

    /// Whether residual work calls for another tick right away
    pub fn needs_immediate_tick(&self) -> bool {
        self.scheduler.needs_immediate_tick() || !self.queue.is_empty()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(Gauges {
            dropped_frames: self.scheduler.dropped_frames(),
            crdt_stats: self.crdt_stats.clone(),
            ot_stats: self.ot_stats.clone(),
            transport_status: self.transport_status,
            queue_depth: self.queue.len(),
            evicted: self.queue.stats().evicted,
            history_len: self.history.len(),
            history_index: self.history.index(),
        })
    }

    pub fn vector_clock(&self) -> &VectorClock {
        &self.seen
    }

    /// Applied changes the holder of `clock` has not seen, oldest first
    pub fn changes_unseen_by(&self, clock: &VectorClock) -> Vec<Change> {
        self.replication_log
            .iter()
            .filter(|change| {
                !clock.has_seen(
                    &format!("{}/{}", change.site, change.source_surface),
                    change.logical_time,
                )
            })
            .cloned()
            .collect()
    }

    /// Envelopes waiting to be replicated: undelivered ones first, then
    /// applied changes
    pub fn take_outbound(&mut self) -> Vec<Envelope> {
        let mut envelopes: Vec<Envelope> = self.unsent.drain(..).collect();
        envelopes.extend(self.outbound.drain(..).filter_map(|change| {
            match Envelope::change(&change) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    tracing::warn!("[Engine] Could not encode change {}: {}", change.id, e);
                    None
                }
            }
        }));
        envelopes
    }

    /// Hand back envelopes a transport could not deliver. They lead the
    /// next [`Engine::take_outbound`], in their original order.
    pub fn return_outbound(&mut self, envelopes: impl IntoIterator<Item = Envelope>) {
        let returned: Vec<Envelope> = envelopes.into_iter().collect();
        if returned.is_empty() {
            return;
        }
        tracing::debug!("[Engine] {} envelopes kept for redelivery", returned.len());
        for envelope in returned.into_iter().rev() {
            self.unsent.push_front(envelope);
        }
    }

    /// Queue a protocol envelope (a sync request or reply) ahead of applied
    /// changes
    pub fn queue_envelope(&mut self, envelope: Envelope) {
        self.unsent.push_back(envelope);
    }

    /// Whether anything is waiting for [`Engine::take_outbound`]
    pub fn has_outbound(&self) -> bool {
        !self.unsent.is_empty() || !self.outbound.is_empty()
    }

    /// Handle an inbound envelope; returns the envelopes to send in reply
    pub fn handle_envelope(&mut self, envelope: &Envelope) -> Vec<Envelope> {
        match envelope.message() {
            Ok(Message::Change(change)) => {
                self.receive_remote(*change);
                Vec::new()
            }
            Ok(Message::Sync(clock)) => {
                let missing = self.changes_unseen_by(&clock);
                tracing::debug!("[Engine] Answering sync with {} changes", missing.len());
                match Envelope::sync_response(&missing) {
                    Ok(response) => vec![response],
                    Err(e) => {
                        tracing::warn!("[Engine] Could not encode sync response: {}", e);
                        Vec::new()
                    }
                }
            }
            Ok(Message::SyncResponse(changes)) => {
                tracing::debug!("[Engine] Received {} changes from sync", changes.len());
                for change in changes {
                    self.receive_remote(change);
                }
                Vec::new()
            }
            Ok(Message::Heartbeat { sent_at }) => {
                tracing::trace!("[Engine] Heartbeat sent at {}", sent_at);
                Vec::new()
            }
            Ok(Message::Unknown(kind)) => {
                tracing::warn!("[Engine] Ignoring envelope of unknown type '{}'", kind);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("[Engine] Malformed envelope: {}", e);
                Vec::new()
            }
        }
    }

    fn receive_remote(&mut self, mut change: Change) {
        change.origin = Origin::Remote;
        change.batch_id = None;
        if let Err(e) = self.submit(change) {
            tracing::debug!("[Engine] Remote change not queued: {}", e);
        }
    }

    pub fn transport_status(&self) -> TransportStatus {
        self.transport_status
    }

    pub fn set_transport_status(&mut self, status: TransportStatus) {
        if self.transport_status != status {
            self.transport_status = status;
            self.events.publish(EngineEvent::Transport { status });
        }
    }

    pub(crate) fn scheduler_mut(&mut self) -> &mut FrameScheduler {
        &mut self.scheduler
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("site", &self.site.id())
            .field("surfaces", &self.surfaces.keys().collect::<Vec<_>>())
            .field("queued", &self.queue.len())
            .field("translators", &self.translators.len())
            .finish()
    }
}

fn fresh_stamp(op: CrdtOp, counter: u64, site: &str) -> CrdtOp {
    match op {
        CrdtOp::SequenceInsert { after, value, .. } => CrdtOp::SequenceInsert {
            id: Dot::new(site, counter),
            after,
            value,
        },
        CrdtOp::RegisterWrite { value, prior, .. } => CrdtOp::RegisterWrite {
            value,
            prior,
            clock: counter,
            site: site.to_string(),
        },
        CrdtOp::Composite { path, op } => CrdtOp::Composite {
            path,
            op: Box::new(fresh_stamp(*op, counter, site)),
        },
        other => other,
    }
}
