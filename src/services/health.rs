//! Health reporting.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// Whether the server considers itself able to serve requests.
    pub healthy: bool,
    /// Seconds since the check was created.
    pub uptime_secs: u64,
}

/// Reports whether the server is healthy.
pub trait HealthCheck {
    /// Current health.
    fn status(&self) -> HealthStatus;
}

/// [`HealthCheck`] that reports healthy for as long as the process runs.
#[derive(Debug)]
pub struct ProcessHealth {
    started: Instant,
}

impl ProcessHealth {
    /// Starts the uptime clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time since creation.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ProcessHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCheck for ProcessHealth {
    fn status(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            uptime_secs: self.uptime().as_secs(),
        }
    }
}
