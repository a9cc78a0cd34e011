//! # In-Memory Relay
//!
//! A [`MemoryHub`] relays frames between every connection opened through its
//! connectors, like a broadcast server with no persistence. Taking the hub
//! offline drops every open connection and refuses new ones, which drives
//! clients through their reconnect path.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xfcanvas::shared::config::TransportConfig;
//! use xfcanvas::transport::{memory, spawn_client};
//!
//! # async fn example() {
//! let (hub, a, b) = memory::pair();
//! let config = TransportConfig::default();
//! let client_a = spawn_client(Arc::new(a), &config);
//! let client_b = spawn_client(Arc::new(b), &config);
//! hub.set_online(false);
//! # }
//! ```

use super::{Connection, Connector, TransportError};
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct HubState {
    online: bool,
    next_peer: u64,
    /// Delivery channel of every open connection
    peers: HashMap<u64, mpsc::Sender<String>>,
}

/// Shared relay
#[derive(Debug, Clone)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                online: true,
                next_peer: 0,
                peers: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector { hub: self.clone() }
    }

    /// Going offline closes every open connection
    pub fn set_online(&self, online: bool) {
        let mut state = self.lock();
        state.online = online;
        if !online {
            let dropped = state.peers.len();
            state.peers.clear();
            tracing::info!("[MemoryHub] Offline, dropped {} connections", dropped);
        }
    }

    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    pub fn peer_count(&self) -> usize {
        self.lock().peers.len()
    }

    fn open(&self) -> Result<Connection, TransportError> {
        let (deliver_tx, deliver_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (submit_tx, mut submit_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        let peer = {
            let mut state = self.lock();
            if !state.online {
                return Err(TransportError::Connect("hub offline".to_string()));
            }
            let peer = state.next_peer;
            state.next_peer += 1;
            state.peers.insert(peer, deliver_tx);
            peer
        };

        let hub = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = submit_rx.recv().await {
                let targets: Vec<mpsc::Sender<String>> = {
                    let state = hub.lock();
                    if !state.peers.contains_key(&peer) {
                        break;
                    }
                    state
                        .peers
                        .iter()
                        .filter(|(id, _)| **id != peer)
                        .map(|(_, tx)| tx.clone())
                        .collect()
                };
                for target in targets {
                    let _ = target.send(frame.clone()).await;
                }
            }
            hub.lock().peers.remove(&peer);
        });

        Ok(Connection {
            outgoing: submit_tx,
            incoming: deliver_rx,
        })
    }
}

/// Connector opening connections on a [`MemoryHub`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    hub: MemoryHub,
}

impl Connector for MemoryConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Connection, TransportError>> {
        let hub = self.hub.clone();
        async move { hub.open() }.boxed()
    }
}

/// A hub with two connectors
pub fn pair() -> (MemoryHub, MemoryConnector, MemoryConnector) {
    let hub = MemoryHub::new();
    let a = hub.connector();
    let b = hub.connector();
    (hub, a, b)
}
