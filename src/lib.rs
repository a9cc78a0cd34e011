//! XFCanvas - Main Library
//!
//! XFCanvas keeps several editing surfaces of one creative artifact (freehand
//! drawing, parametric shapes, code, growth simulations) consistent with each
//! other and with remote replicas, in real time.
//!
//! # Overview
//!
//! This library provides:
//! - A frame-driven synchronization engine that is the sole mutator of every
//!   surface's state
//! - Conflict-free replicated data types for order-independent merges
//! - Operational transforms for position-dependent text and canvas edits
//! - A weighted conflict-resolution chain with an audit log
//! - Batch undo/redo, loop protection for translator fan-out, and metrics
//! - Replication over a pluggable transport with reconnect and heartbeat
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared by every layer
//!   - Changes, payloads, values, vector clocks and site identity
//!   - Engine configuration
//!   - Error taxonomy and engine events
//!
//! - **`crdt`** - Grow-only set, observed-remove set, LWW register,
//!   replicated growable array and a path-keyed composite
//!
//! - **`ot`** - Linear (text) and spatial (entity) transform, compose and
//!   invert
//!
//! - **`conflict`** - Conflict classification and the strategy chain
//!
//! - **`sync`** - The engine: queue, loop guard, merge pipeline, surface
//!   state, history, translators, metrics and the async runtime
//!
//! - **`realtime`** - Event bus with owned subscriptions
//!
//! - **`transport`** - Wire envelopes, the reconnecting client task and an
//!   in-memory connector
//!
//! # Feature Flags
//!
//! - **`demo`** - Builds the `xfcanvas-demo` binary (tracing subscriber,
//!   config directory lookup, `.env` loading)
//!
//! # Usage
//!
//! ```rust,no_run
//! use xfcanvas::shared::{EngineConfig, Payload, Value};
//! use xfcanvas::sync::Engine;
//!
//! # async fn example() -> Result<(), xfcanvas::shared::SyncError> {
//! let engine = Engine::new(EngineConfig::default())?;
//! let running = engine.start();
//! let handle = running.handle();
//!
//! handle
//!     .create("draw", Payload::Insert { target: "stroke-1".into(), value: Value::Bool(true) })
//!     .await?;
//! handle.undo().await?;
//!
//! let engine = running.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! The engine is a plain value mutated through `&mut self`. Once started it
//! lives on a single tokio task; handles, the event bus and the transport
//! reach it only through channels, so no state is shared behind locks.
//!
//! # Error Handling
//!
//! - `SyncError` in `shared::error` is the crate-wide taxonomy
//! - Each layer has its own error enum (`CrdtError`, `OtError`,
//!   `ConfigError`, `TransportError`) that converts into it
//! - Only corruption is surfaced to the user; everything else is reported
//!   as metrics and events

/// Shared types and data structures
pub mod shared;

/// Conflict-free replicated data types
pub mod crdt;

/// Operational transforms
pub mod ot;

/// Conflict classification and resolution strategies
pub mod conflict;

/// Synchronization engine
pub mod sync;

/// Engine event broadcasting
pub mod realtime;

/// Replication transport
pub mod transport;
