//! # Engine Metrics
//!
//! Performance counters for the frame loop, exposed as a pull-based
//! [`MetricsSnapshot`].
//!
//! ## Features
//!
//! - **Frame timing**: last frame time and batch processing time
//! - **Sync latency**: exponential moving average of remote change latency
//! - **Compression ratio**: applied operations over drained operations
//! - **Rejection counters**: invalid, looped, duplicate and failed translations

use crate::crdt::CrdtStats;
use crate::ot::OtStats;
use crate::transport::TransportStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smoothing factor of the sync latency moving average
pub const LATENCY_ALPHA: f64 = 0.2;

#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub frame_time: Duration,
    pub batch_time: Duration,
    sync_latency_ms: Option<f64>,
    drained: u64,
    applied: u64,
    pub total_operations: u64,
    pub invalid_rejected: u64,
    pub loop_rejected: u64,
    pub duplicates_dropped: u64,
    /// Payload writes refused because a newer write already landed
    pub superseded_writes: u64,
    pub translation_failures: u64,
    pub conflicts_resolved: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, frame_time: Duration, batch_time: Duration) {
        self.frame_time = frame_time;
        self.batch_time = batch_time;
    }

    pub fn record_drained(&mut self, count: usize) {
        self.drained += count as u64;
    }

    pub fn record_applied(&mut self) {
        self.applied += 1;
        self.total_operations += 1;
    }

    /// Fold a remote change latency into the moving average
    pub fn record_sync_latency(&mut self, latency_ms: f64) {
        let latency_ms = latency_ms.max(0.0);
        self.sync_latency_ms = Some(match self.sync_latency_ms {
            Some(average) => average + LATENCY_ALPHA * (latency_ms - average),
            None => latency_ms,
        });
    }

    pub fn sync_latency_ms(&self) -> f64 {
        self.sync_latency_ms.unwrap_or(0.0)
    }

    /// Applied over drained operations; 1.0 before anything was drained
    pub fn compression_ratio(&self) -> f64 {
        if self.drained == 0 {
            1.0
        } else {
            self.applied as f64 / self.drained as f64
        }
    }

    pub fn snapshot(&self, gauges: Gauges) -> MetricsSnapshot {
        MetricsSnapshot {
            frame_time_ms: self.frame_time.as_secs_f64() * 1000.0,
            sync_latency_ms: self.sync_latency_ms(),
            batch_time_ms: self.batch_time.as_secs_f64() * 1000.0,
            compression_ratio: self.compression_ratio(),
            dropped_frames: gauges.dropped_frames,
            total_operations: self.total_operations,
            crdt_stats: gauges.crdt_stats,
            ot_stats: gauges.ot_stats,
            transport_status: gauges.transport_status,
            queue_depth: gauges.queue_depth,
            evicted: gauges.evicted,
            invalid_rejected: self.invalid_rejected,
            loop_rejected: self.loop_rejected,
            duplicates_dropped: self.duplicates_dropped,
            superseded_writes: self.superseded_writes,
            translation_failures: self.translation_failures,
            conflicts_resolved: self.conflicts_resolved,
            history_len: gauges.history_len,
            history_index: gauges.history_index,
        }
    }
}

/// State owned by other components, sampled when a snapshot is taken
#[derive(Debug, Clone, Default)]
pub struct Gauges {
    pub dropped_frames: u64,
    pub crdt_stats: CrdtStats,
    pub ot_stats: OtStats,
    pub transport_status: TransportStatus,
    pub queue_depth: usize,
    pub evicted: u64,
    pub history_len: usize,
    pub history_index: i64,
}

/// Point-in-time metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub frame_time_ms: f64,
    pub sync_latency_ms: f64,
    pub batch_time_ms: f64,
    pub compression_ratio: f64,
    pub dropped_frames: u64,
    pub total_operations: u64,
    pub crdt_stats: CrdtStats,
    pub ot_stats: OtStats,
    pub transport_status: TransportStatus,
    pub queue_depth: usize,
    pub evicted: u64,
    pub invalid_rejected: u64,
    pub loop_rejected: u64,
    pub duplicates_dropped: u64,
    pub superseded_writes: u64,
    pub translation_failures: u64,
    pub conflicts_resolved: u64,
    pub history_len: usize,
    pub history_index: i64,
}
