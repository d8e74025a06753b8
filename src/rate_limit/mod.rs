//! Sliding-window rate limiter for a single session
//!
//! Advisory and session-local: it bounds one session's call rate, not global
//! throughput.

use crate::config::RateLimitConfig;
use crate::error::{ChatError, Result};
use crate::metrics::METRICS;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Request timestamps within the trailing window, oldest first
#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn prune(&mut self, now: Instant, period: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) > period {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Prune entries older than `period`, then admit `now` if fewer than `limit`
/// requests remain in the window. A rejection leaves the window as pruned.
pub fn admit(window: &mut RateWindow, now: Instant, limit: usize, period: Duration) -> Admission {
    window.prune(now, period);

    if window.len() >= limit {
        let retry_after = window
            .timestamps
            .front()
            .map(|&oldest| period.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(period);
        return Admission::Rejected { retry_after };
    }

    window.timestamps.push_back(now);
    Admission::Allowed
}

/// Rate limiter configuration
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub limit: usize,
    pub period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit: 3,
            period: Duration::from_secs(60),
        }
    }
}

impl From<&RateLimitConfig> for RateLimiterConfig {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.limit,
            period: config.period(),
        }
    }
}

/// Per-session rate limiter owning its window
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    window: RateWindow,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            window: RateWindow::new(),
            config,
        }
    }

    /// Admit a request at `now` or fail with [`ChatError::RateLimited`]
    pub fn check(&mut self, now: Instant) -> Result<()> {
        match admit(&mut self.window, now, self.config.limit, self.config.period) {
            Admission::Allowed => {
                METRICS.record_rate_limit(true);
                debug!(in_window = self.window.len(), limit = self.config.limit, "Request admitted");
                Ok(())
            }
            Admission::Rejected { retry_after } => {
                METRICS.record_rate_limit(false);
                warn!(limit = self.config.limit, ?retry_after, "Rate limit exceeded");
                Err(ChatError::RateLimited { retry_after })
            }
        }
    }

    pub fn window(&self) -> &RateWindow {
        &self.window
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}
