use log::{error, info};
use serde::Serialize;

/// Reachability signal surfaced to the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendStatus {
    Available,
    Unavailable,
}

/// Counts consecutive failed blocks and flips [`BackendStatus`]
#[derive(Debug, Clone)]
pub struct BackendHealth {
    status: BackendStatus,
    consecutive_failures: u32,
    threshold: u32,
}

impl BackendHealth {
    pub fn new(threshold: u32) -> Self {
        Self {
            status: BackendStatus::Available,
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn status(&self) -> BackendStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold.max(1);
    }

    /// Returns true when the status changed
    pub fn record_success(&mut self) -> bool {
        self.consecutive_failures = 0;
        if self.status == BackendStatus::Unavailable {
            self.status = BackendStatus::Available;
            info!("Translation backend is available again");
            return true;
        }
        false
    }

    /// Returns true when the status changed
    pub fn record_failure(&mut self, reason: &str) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.status == BackendStatus::Available && self.consecutive_failures >= self.threshold {
            self.status = BackendStatus::Unavailable;
            error!(
                "Translation backend unavailable after {} consecutive failures: {}",
                self.consecutive_failures, reason
            );
            return true;
        }
        false
    }
}
