//! Integration tests
//!
//! Scenario tests drive a synchronous engine, replication tests trade
//! envelopes between two of them by hand; runtime and transport tests
//! run engines on tokio and replicate through the in-memory hub.

pub mod replication;
pub mod runtime;
pub mod scenarios;
pub mod transport;
