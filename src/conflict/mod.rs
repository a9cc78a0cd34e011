//! # Conflict Resolution Engine
//!
//! Decides which change of a group applies when several changes in one
//! batch target the same entity and transforms alone cannot reconcile them.
//!
//! ## Features
//!
//! - **Classification**: corruption, temporal spread, cross-surface,
//!   concurrent edit, resource contention
//! - **Strategy chain**: pluggable [`ConflictStrategy`] values sorted by
//!   descending weight; the first whose predicate matches resolves the group
//! - **Audit**: every resolution is appended to a bounded log and counted in
//!   [`ConflictStats`]
//! - **Preferences**: per-surface caller preferences consulted by the
//!   user-preference strategy
//!
//! Exactly one change of a group is applied (possibly a synthetic merge of
//! the members); every other member is recorded as rejected, never dropped.

pub mod strategies;

pub use strategies::{
    LatestWins, ModePriority, RollbackOnCorruption, SmartMerge, UserActionPriority, UserPreference,
};

use crate::shared::change::Change;
use crate::shared::config::EngineConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use uuid::Uuid;

/// Conflict classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// At least one member is structurally invalid
    Corruption,
    /// Members were created further apart than the temporal spread
    Temporal,
    /// Members come from different surfaces
    CrossSurface,
    /// Same-kind edits of one target
    ConcurrentEdit,
    /// Different kinds competing for one target
    ResourceContention,
}

/// Caller preference for one surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    Latest,
    UserActionFirst,
}

/// Outcome of resolving one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub strategy: String,
    pub reason: String,
    pub kind: ConflictKind,
    pub applied: Change,
    pub rejected: Vec<Change>,
    /// Members folded into a synthetic applied change
    #[serde(default)]
    pub merged_from: Vec<Uuid>,
    /// The applied change must not mutate state (nothing valid survived)
    #[serde(default)]
    pub is_noop: bool,
    pub resolved_at: DateTime<Utc>,
}

impl ConflictRecord {
    pub fn new(
        strategy: impl Into<String>,
        reason: impl Into<String>,
        kind: ConflictKind,
        applied: Change,
        rejected: Vec<Change>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            reason: reason.into(),
            kind,
            applied,
            rejected,
            merged_from: Vec::new(),
            is_noop: false,
            resolved_at: Utc::now(),
        }
    }

    /// Ids of the applied and rejected changes, for determinism checks
    pub fn partition(&self) -> (Uuid, Vec<Uuid>) {
        (
            self.applied.id,
            self.rejected.iter().map(|change| change.id).collect(),
        )
    }
}

/// Everything a strategy may consult besides the group itself
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub kind: ConflictKind,
    pub preferences: &'a BTreeMap<String, Preference>,
    pub config: &'a EngineConfig,
}

/// Pluggable resolution strategy
pub trait ConflictStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Higher weights are consulted first
    fn weight(&self) -> u32;

    fn applies(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> bool;

    /// Resolve a group of at least two changes sorted by order key
    fn resolve(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> ConflictRecord;
}

/// Resolution counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictStats {
    /// Groups of two or more changes seen
    pub total: u64,
    /// Groups that applied a change (not a safe no-op)
    pub resolved: u64,
    pub by_strategy: BTreeMap<String, u64>,
    pub by_kind: BTreeMap<ConflictKind, u64>,
    pub resolution_rate: f64,
}

impl ConflictStats {
    fn record(&mut self, record: &ConflictRecord) {
        self.total += 1;
        if !record.is_noop {
            self.resolved += 1;
        }
        *self.by_strategy.entry(record.strategy.clone()).or_insert(0) += 1;
        *self.by_kind.entry(record.kind).or_insert(0) += 1;
        self.resolution_rate = self.resolved as f64 / self.total as f64;
    }
}

/// Strategy chain plus audit log
pub struct ConflictResolver {
    strategies: Vec<Box<dyn ConflictStrategy>>,
    preferences: BTreeMap<String, Preference>,
    config: EngineConfig,
    audit: VecDeque<ConflictRecord>,
    stats: ConflictStats,
}

impl std::fmt::Debug for ConflictResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("strategies", &self.strategy_names())
            .field("preferences", &self.preferences)
            .field("audit_len", &self.audit.len())
            .finish()
    }
}

impl ConflictResolver {
    /// Resolver with the default six-strategy chain
    pub fn new(config: &EngineConfig) -> Self {
        let mut resolver = Self::empty(config);
        resolver.register(Box::new(RollbackOnCorruption));
        resolver.register(Box::new(UserActionPriority));
        resolver.register(Box::new(SmartMerge));
        resolver.register(Box::new(UserPreference));
        resolver.register(Box::new(ModePriority));
        resolver.register(Box::new(LatestWins));
        resolver
    }

    /// Resolver without strategies; unmatched groups fall back to latest-wins
    pub fn empty(config: &EngineConfig) -> Self {
        Self {
            strategies: Vec::new(),
            preferences: BTreeMap::new(),
            config: config.clone(),
            audit: VecDeque::new(),
            stats: ConflictStats::default(),
        }
    }

    /// Add a strategy, replacing any with the same name. The chain stays
    /// sorted by descending weight, stable for equal weights.
    pub fn register(&mut self, strategy: Box<dyn ConflictStrategy>) {
        self.strategies.retain(|existing| existing.name() != strategy.name());
        let index = self
            .strategies
            .iter()
            .position(|existing| existing.weight() < strategy.weight())
            .unwrap_or(self.strategies.len());
        tracing::debug!(
            "[Conflict] Registered strategy '{}' (weight {})",
            strategy.name(),
            strategy.weight()
        );
        self.strategies.insert(index, strategy);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.strategies.len();
        self.strategies.retain(|strategy| strategy.name() != name);
        before != self.strategies.len()
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn set_preference(&mut self, surface: impl Into<String>, preference: Preference) {
        self.preferences.insert(surface.into(), preference);
    }

    pub fn clear_preference(&mut self, surface: &str) {
        self.preferences.remove(surface);
    }

    pub fn classify(&self, ops: &[Change]) -> ConflictKind {
        if ops.iter().any(|change| !change.is_well_formed()) {
            return ConflictKind::Corruption;
        }
        let created = ops.iter().map(|change| change.created_at);
        if let (Some(first), Some(last)) = (created.clone().min(), created.max()) {
            if last - first > Duration::seconds(self.config.temporal_spread_secs) {
                return ConflictKind::Temporal;
            }
        }
        let surfaces: BTreeSet<&str> = ops.iter().map(|c| c.source_surface.as_str()).collect();
        if surfaces.len() > 1 {
            return ConflictKind::CrossSurface;
        }
        let kinds: BTreeSet<_> = ops.iter().map(Change::kind).collect();
        if kinds.len() == 1 {
            ConflictKind::ConcurrentEdit
        } else {
            ConflictKind::ResourceContention
        }
    }

    /// Resolve a group. A single change passes through without being
    /// audited; an empty group yields `None`.
    pub fn resolve(&mut self, ops: &[Change]) -> Option<ConflictRecord> {
        let mut group = ops.to_vec();
        group.sort_by_key(Change::order_key);

        match group.len() {
            0 => return None,
            1 => {
                let applied = group.remove(0);
                return Some(ConflictRecord::new(
                    "passthrough",
                    "single operation",
                    ConflictKind::ConcurrentEdit,
                    applied,
                    Vec::new(),
                ));
            }
            _ => {}
        }

        let ctx = ResolutionContext {
            kind: self.classify(&group),
            preferences: &self.preferences,
            config: &self.config,
        };
        let record = match self
            .strategies
            .iter()
            .find(|strategy| strategy.applies(&group, &ctx))
        {
            Some(strategy) => strategy.resolve(&group, &ctx),
            None => LatestWins.resolve(&group, &ctx),
        };

        tracing::debug!(
            "[Conflict] {:?} conflict over '{}' resolved by {} ({} rejected)",
            record.kind,
            record.applied.target_key(),
            record.strategy,
            record.rejected.len()
        );
        self.stats.record(&record);
        self.audit.push_back(record.clone());
        while self.audit.len() > self.config.audit_log_limit {
            self.audit.pop_front();
        }
        Some(record)
    }

    /// Bounded resolution log, oldest first
    pub fn audit_log(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.audit.iter()
    }

    pub fn stats(&self) -> &ConflictStats {
        &self.stats
    }
}
