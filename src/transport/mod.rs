//! # Replication Transport
//!
//! Abstract bidirectional channel carrying serialized changes to and from
//! peers.
//!
//! ## Features
//!
//! - **Wire envelope**: `{ "type": "change" | "sync" | "sync-response" |
//!   "heartbeat", "data": ... }`, framed as newline-delimited JSON. Unknown
//!   types are logged and ignored.
//! - **Connector seam**: [`Connector`] opens a [`Connection`]; the client
//!   does not care what carries the frames
//! - **Reconnect and heartbeat**: the [`client`] task reconnects with a fixed
//!   backoff, sends heartbeats and buffers outbound frames while
//!   disconnected; they are never dropped
//! - **In-memory hub**: [`memory`] relays frames between engines in one
//!   process for tests and demos
//!
//! The transport never touches surface state. Inbound changes are handed to
//! the engine, which submits them through its queue like local changes.

pub mod client;
pub mod memory;
pub mod retry;

pub use client::{spawn_client, TransportHandle};
pub use memory::MemoryHub;
pub use retry::{BackoffStrategy, ReconnectPolicy};

use crate::shared::change::Change;
use crate::shared::clock::VectorClock;
use crate::shared::error::SyncError;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub const CHANGE: &str = "change";
pub const SYNC: &str = "sync";
pub const SYNC_RESPONSE: &str = "sync-response";
pub const HEARTBEAT: &str = "heartbeat";

/// Framed wire record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Decoded envelope contents
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Change(Box<Change>),
    /// Vector clock of the requesting peer
    Sync(VectorClock),
    SyncResponse(Vec<Change>),
    Heartbeat { sent_at: DateTime<Utc> },
    Unknown(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct HeartbeatData {
    sent_at: DateTime<Utc>,
}

impl Envelope {
    fn new<T: Serialize>(kind: &str, data: &T) -> Result<Self, SyncError> {
        Ok(Self {
            kind: kind.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn change(change: &Change) -> Result<Self, SyncError> {
        Self::new(CHANGE, change)
    }

    pub fn sync(clock: &VectorClock) -> Result<Self, SyncError> {
        Self::new(SYNC, clock)
    }

    pub fn sync_response(changes: &[Change]) -> Result<Self, SyncError> {
        Self::new(SYNC_RESPONSE, &changes)
    }

    pub fn heartbeat() -> Self {
        Self {
            kind: HEARTBEAT.to_string(),
            data: serde_json::json!({ "sent_at": Utc::now() }),
        }
    }

    /// Decode `data` according to `type`
    pub fn message(&self) -> Result<Message, SyncError> {
        let data = self.data.clone();
        Ok(match self.kind.as_str() {
            CHANGE => Message::Change(Box::new(serde_json::from_value(data)?)),
            SYNC => Message::Sync(serde_json::from_value(data)?),
            SYNC_RESPONSE => Message::SyncResponse(serde_json::from_value(data)?),
            HEARTBEAT => {
                let heartbeat: HeartbeatData = serde_json::from_value(data)?;
                Message::Heartbeat {
                    sent_at: heartbeat.sent_at,
                }
            }
            other => Message::Unknown(other.to_string()),
        })
    }
}

/// Encode one envelope as a newline-terminated JSON frame
pub fn encode_frame(envelope: &Envelope) -> Result<String, TransportError> {
    let mut frame =
        serde_json::to_string(envelope).map_err(|e| TransportError::Frame(e.to_string()))?;
    frame.push('\n');
    Ok(frame)
}

pub fn decode_frame(frame: &str) -> Result<Envelope, TransportError> {
    serde_json::from_str(frame.trim_end()).map_err(|e| TransportError::Frame(e.to_string()))
}

/// Connection lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted
    Failed,
}

/// Events emitted by the client task
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Status(TransportStatus),
    Inbound(Envelope),
    Error(String),
    /// Envelopes still buffered when the client gave up, oldest first
    Undelivered(Vec<Envelope>),
}

/// An open connection: frames out, frames in
#[derive(Debug)]
pub struct Connection {
    pub outgoing: mpsc::Sender<String>,
    pub incoming: mpsc::Receiver<String>,
}

/// Opens connections to the replication peer(s)
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'static, Result<Connection, TransportError>>;
}

/// Transport layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Connection closed")]
    Closed,

    #[error("Frame error: {0}")]
    Frame(String),
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::transport(err.to_string())
    }
}
