//! Pacing policy between registry API calls
//!
//! The registry throttles aggressive clients, so the run pauses after
//! every persisted record.

use async_trait::async_trait;
use std::time::Duration;

/// Pause applied after each successful fetch+persist.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Fixed-interval pacing backed by the tokio timer.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    interval: Duration,
}

impl FixedDelay {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&self) {
        tokio::time::sleep(self.interval).await;
    }
}

/// No-op pacing, for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn pause(&self) {}
}
