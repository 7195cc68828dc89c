//! Resilience settings carried by a connection
//!
//! These govern how later requests against the site are executed: server
//! health gating, retries and timeouts. Connection establishment only
//! carries them through.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health score of -1 disables the server health check
pub const NO_HEALTH_CHECK: i32 = -1;
pub const DEFAULT_RETRY_COUNT: u32 = 10;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1_800_000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceSettings {
    pub minimal_health_score: i32,
    pub retry_count: u32,
    pub retry_wait: Duration,
    pub request_timeout: Duration,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            minimal_health_score: NO_HEALTH_CHECK,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_wait: DEFAULT_RETRY_WAIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ResilienceSettings {
    pub fn builder() -> ResilienceSettingsBuilder {
        ResilienceSettingsBuilder::new()
    }

    pub fn health_check_enabled(&self) -> bool {
        self.minimal_health_score != NO_HEALTH_CHECK
    }

    /// Whether a server reporting `score` (0 idle .. 10 overloaded) may
    /// receive requests
    pub fn accepts_health_score(&self, score: i32) -> bool {
        !self.health_check_enabled() || score <= self.minimal_health_score
    }
}

/// Builder for ResilienceSettings
#[derive(Debug)]
pub struct ResilienceSettingsBuilder {
    settings: ResilienceSettings,
}

impl ResilienceSettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: ResilienceSettings::default(),
        }
    }

    /// Minimal server health score, -1 to disable the check
    pub fn minimal_health_score(mut self, score: i32) -> Self {
        self.settings.minimal_health_score = score;
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.settings.retry_count = count;
        self
    }

    pub fn retry_wait(mut self, wait: Duration) -> Self {
        self.settings.retry_wait = wait;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    pub fn build(self) -> ResilienceSettings {
        self.settings
    }
}

impl Default for ResilienceSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
