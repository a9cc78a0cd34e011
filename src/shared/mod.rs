//! Shared Module
//!
//! Types used across every layer of the engine: the change model, values,
//! clocks, site identity, configuration, errors and events.

/// Change (operation) model
pub mod change;

/// Vector clocks
pub mod clock;

/// Engine configuration
pub mod config;

/// Shared error types
pub mod error;

/// Engine event system
pub mod event;

/// Site identity and logical time
pub mod site;

/// Structured payload values
pub mod value;

/// Re-export commonly used types for convenience
pub use change::{Change, ChangeKind, OrderKey, Origin, Payload, Priority};
pub use clock::{Causality, SiteId, VectorClock};
pub use config::{ConfigError, EngineConfig, EngineConfigBuilder, SurfaceKind, TransportConfig};
pub use error::SyncError;
pub use event::{EngineEvent, EventType};
pub use site::Site;
pub use value::{Fields, Point, Value};
