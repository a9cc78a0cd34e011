//! Engine configuration module
//!
//! Provides [`EngineConfig`], its builder and TOML loading. Every field has a
//! default, so an empty TOML document is a valid configuration.

use crate::shared::change::ChangeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// One side of a smart-merge compatibility pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceKind {
    pub surface: String,
    pub kind: ChangeKind,
}

impl SurfaceKind {
    pub fn new(surface: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            surface: surface.into(),
            kind,
        }
    }
}

/// Replication transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Fixed delay between reconnect attempts
    pub reconnect_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
    /// Capacity of the channel feeding the transport task
    pub outbound_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 1000,
            heartbeat_interval_ms: 5000,
            max_reconnect_attempts: None,
            outbound_buffer: 256,
        }
    }
}

impl TransportConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Surfaces hosted by this engine
    pub surfaces: Vec<String>,
    /// Frame budget in milliseconds
    pub frame_budget_ms: f64,
    /// Maximum operations drained per tick
    pub batch_size: usize,
    pub queue_capacity: usize,
    /// Submissions of one (surface, label) key allowed per window
    pub loop_threshold: u32,
    pub loop_window_ms: u64,
    /// Key count above which the loop table is cleared
    pub loop_table_bound: usize,
    /// Per-label threshold overrides, e.g. rapid freehand input
    pub loop_threshold_overrides: BTreeMap<String, u32>,
    pub history_limit: usize,
    pub audit_log_limit: usize,
    /// Creation-time spread above which a conflict is classified temporal
    pub temporal_spread_secs: i64,
    /// Fixed surface ranking used by mode priority
    pub surface_ranking: BTreeMap<String, u32>,
    pub user_action_bonus: u32,
    /// Unordered pairs eligible for smart merge
    pub compatible_pairs: Vec<(SurfaceKind, SurfaceKind)>,
    pub transport: TransportConfig,
    pub event_channel_capacity: usize,
    /// Recent remote ids kept for duplicate detection
    pub dedup_window: usize,
}

pub const DEFAULT_SURFACES: [&str; 4] = ["draw", "parametric", "code", "growth"];

impl Default for EngineConfig {
    fn default() -> Self {
        let surfaces: Vec<String> = DEFAULT_SURFACES.iter().map(|s| s.to_string()).collect();
        let surface_ranking = DEFAULT_SURFACES
            .iter()
            .zip([4, 3, 2, 1])
            .map(|(surface, rank)| (surface.to_string(), rank))
            .collect();

        Self {
            compatible_pairs: modify_pairs(&surfaces),
            surfaces,
            frame_budget_ms: 16.67,
            batch_size: 50,
            queue_capacity: 1000,
            loop_threshold: 5,
            loop_window_ms: 1000,
            loop_table_bound: 100,
            loop_threshold_overrides: BTreeMap::new(),
            history_limit: 100,
            audit_log_limit: 500,
            temporal_spread_secs: 10,
            surface_ranking,
            user_action_bonus: 10,
            transport: TransportConfig::default(),
            event_channel_capacity: 1024,
            dedup_window: 4096,
        }
    }
}

/// Every pair of distinct surfaces editing with `modify`
fn modify_pairs(surfaces: &[String]) -> Vec<(SurfaceKind, SurfaceKind)> {
    let mut pairs = Vec::new();
    for (i, a) in surfaces.iter().enumerate() {
        for b in &surfaces[i + 1..] {
            pairs.push((
                SurfaceKind::new(a.clone(), ChangeKind::Modify),
                SurfaceKind::new(b.clone(), ChangeKind::Modify),
            ));
        }
    }
    pairs
}

impl EngineConfig {
    /// Create a new EngineConfigBuilder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.surfaces.is_empty() {
            return Err(ConfigError::MissingValue("surfaces"));
        }
        if self.frame_budget_ms.is_nan() || self.frame_budget_ms <= 0.0 {
            return Err(ConfigError::invalid("frame_budget_ms", "must be positive"));
        }
        let positive = [
            ("batch_size", self.batch_size),
            ("queue_capacity", self.queue_capacity),
            ("history_limit", self.history_limit),
            ("audit_log_limit", self.audit_log_limit),
            ("loop_table_bound", self.loop_table_bound),
            ("event_channel_capacity", self.event_channel_capacity),
            ("transport.outbound_buffer", self.transport.outbound_buffer),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if self.loop_threshold == 0 {
            return Err(ConfigError::invalid("loop_threshold", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(self.frame_budget_ms / 1000.0)
    }

    pub fn loop_window(&self) -> Duration {
        Duration::from_millis(self.loop_window_ms)
    }

    /// Threshold for a label, honouring overrides
    pub fn loop_threshold_for(&self, label: &str) -> u32 {
        self.loop_threshold_overrides
            .get(label)
            .copied()
            .unwrap_or(self.loop_threshold)
    }

    pub fn surface_rank(&self, surface: &str) -> u32 {
        self.surface_ranking.get(surface).copied().unwrap_or(0)
    }

    /// Whether two (surface, kind) members may be smart-merged
    pub fn is_compatible(&self, a: &SurfaceKind, b: &SurfaceKind) -> bool {
        self.compatible_pairs
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Replace the surface list. Ranking and compatible pairs are not
    /// touched; set them explicitly for custom surfaces.
    pub fn surfaces<I, S>(mut self, surfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.surfaces = surfaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn frame_budget_ms(mut self, budget: f64) -> Self {
        self.config.frame_budget_ms = budget;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn loop_threshold(mut self, threshold: u32) -> Self {
        self.config.loop_threshold = threshold;
        self
    }

    pub fn loop_window_ms(mut self, window: u64) -> Self {
        self.config.loop_window_ms = window;
        self
    }

    pub fn loop_threshold_override(mut self, label: impl Into<String>, threshold: u32) -> Self {
        self.config
            .loop_threshold_overrides
            .insert(label.into(), threshold);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    pub fn audit_log_limit(mut self, limit: usize) -> Self {
        self.config.audit_log_limit = limit;
        self
    }

    pub fn surface_rank(mut self, surface: impl Into<String>, rank: u32) -> Self {
        self.config.surface_ranking.insert(surface.into(), rank);
        self
    }

    pub fn compatible_pair(mut self, a: SurfaceKind, b: SurfaceKind) -> Self {
        self.config.compatible_pairs.push((a, b));
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.config.transport = transport;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to read configuration: {0}")]
    Io(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
