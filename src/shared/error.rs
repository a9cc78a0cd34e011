//! Engine Error Types
//!
//! This module defines the error taxonomy of the convergence engine. Each
//! variant maps to one failure class of the pipeline and carries enough
//! context to log it and to surface it through metrics or events.
//!
//! # Error Categories
//!
//! - `InvalidOperation` - Schema/validation failure, never applied
//! - `LoopDetected` - Echo cycle between surfaces, rejected and counted
//! - `Superseded` - Entity write older than the one already applied
//! - `TranslationFailure` - Isolated to the failing translator
//! - `CorruptionDetected` - Escalates to a user-visible notification
//! - `TransportFailure` - Triggers backoff-reconnect
//!
//! # Usage
//!
//! ```rust
//! use xfcanvas::shared::error::SyncError;
//!
//! let error = SyncError::invalid("logical_time", "must be positive");
//! assert!(error.is_recoverable());
//! ```
use crate::shared::config::ConfigError;
use thiserror::Error;

/// Errors produced by the engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Validation failure on submit
    #[error("Invalid operation, field '{field}': {message}")]
    InvalidOperation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// Too many operations for one (surface, label) key within the window
    #[error("Loop detected for {surface}/{label} after {count} operations")]
    LoopDetected {
        surface: String,
        label: String,
        count: u32,
    },

    /// A payload write lost to a newer write of the same entity
    #[error("Write to '{target}' superseded by a newer write")]
    Superseded { target: String },

    /// A translator failed while fanning out a change
    #[error("Translator '{translator}' failed: {message}")]
    TranslationFailure {
        translator: String,
        message: String,
    },

    /// Structurally invalid operations reached conflict resolution
    #[error("Corruption detected in {operations} operation(s): {reason}")]
    CorruptionDetected {
        operations: usize,
        reason: String,
    },

    /// Replication transport failure
    #[error("Transport failure: {message}")]
    TransportFailure {
        /// Human-readable error message
        message: String,
    },

    /// Change names a surface the engine does not host
    #[error("Unknown surface: {surface}")]
    UnknownSurface { surface: String },

    /// The frame loop has shut down
    #[error("Engine stopped")]
    EngineStopped,

    /// JSON encoding or decoding error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Create a new validation error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn loop_detected(surface: impl Into<String>, label: impl Into<String>, count: u32) -> Self {
        Self::LoopDetected {
            surface: surface.into(),
            label: label.into(),
            count,
        }
    }

    pub fn superseded(target: impl Into<String>) -> Self {
        Self::Superseded {
            target: target.into(),
        }
    }

    pub fn translation(translator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TranslationFailure {
            translator: translator.into(),
            message: message.into(),
        }
    }

    pub fn corruption(operations: usize, reason: impl Into<String>) -> Self {
        Self::CorruptionDetected {
            operations,
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }

    /// Whether the error stays inside the engine as metrics/events.
    ///
    /// Only corruption escalates to the user.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::CorruptionDetected { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON error: {}", err),
        }
    }
}
