//! Real-time Event Module
//!
//! Publish/subscribe channel carrying [`EngineEvent`](crate::shared::EngineEvent)s
//! from the engine to any number of listeners.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs       - Module exports and documentation
//! └── broadcast.rs - Event bus, subscriptions and listener handles
//! ```
//!
//! # Listener Lifetime
//!
//! A subscription is an owned token. Dropping it (or calling `dispose`)
//! ends the listener; there is no global registry to unregister from.
//!
//! # Example
//!
//! ```rust
//! use xfcanvas::realtime::EventBus;
//! use xfcanvas::shared::EngineEvent;
//!
//! let bus = EventBus::new(16);
//! let mut subscription = bus.subscribe();
//! bus.publish(EngineEvent::HistoryChanged { len: 1, index: 0 });
//! assert!(subscription.try_recv().is_some());
//! subscription.dispose();
//! assert_eq!(bus.subscriber_count(), 0);
//! ```

/// Event bus and subscriptions
pub mod broadcast;

// Re-export commonly used types
pub use broadcast::{EventBus, ListenerHandle, Subscription};
