//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Engine and change fixtures
//! - Custom assertion macros

pub mod assertions;
pub mod fixtures;

// Re-export commonly used utilities
pub use fixtures::*;
