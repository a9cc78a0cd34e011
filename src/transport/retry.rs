//! # Reconnect Backoff
//!
//! Delay policy applied by the transport client between connection
//! attempts.
//!
//! ## Features
//!
//! - **Fixed backoff**: the default, one constant delay between attempts
//! - **Exponential backoff**: doubling delay capped at a maximum
//! - **Max attempts**: optional limit after which the client gives up

use crate::shared::config::TransportConfig;
use std::time::Duration;

/// Backoff strategy configuration
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed interval between attempts
    Fixed { interval: Duration },
    /// Doubling interval, capped
    Exponential { base: Duration, max: Duration },
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    strategy: BackoffStrategy,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(strategy: BackoffStrategy, max_attempts: Option<u32>) -> Self {
        Self {
            strategy,
            max_attempts,
            attempt: 0,
        }
    }

    /// Fixed backoff from the transport configuration
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            BackoffStrategy::Fixed {
                interval: config.reconnect_delay(),
            },
            config.max_reconnect_attempts,
        )
    }

    /// Delay before the next attempt, `None` once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }
        self.attempt += 1;
        Some(self.delay_for(self.attempt))
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        match &self.strategy {
            BackoffStrategy::Fixed { interval } => *interval,
            BackoffStrategy::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(*max)
            }
        }
    }

    /// Attempts made since the last successful connection
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Call after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn set_strategy(&mut self, strategy: BackoffStrategy) {
        self.strategy = strategy;
    }
}
