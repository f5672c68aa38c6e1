//! Cache keys, entries, and freshness policy.

use console_core::{Consumer, UsageResponse, WindowSize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One logical query: the resource plus its filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    ConsumerList,
    Usage {
        subject: String,
        metric: String,
        time_range: String,
        window_size: WindowSize,
    },
    ModelUsage {
        subject: String,
        time_range: String,
    },
}

impl QueryKey {
    pub fn usage(
        subject: impl Into<String>,
        metric: impl Into<String>,
        time_range: impl Into<String>,
        window_size: WindowSize,
    ) -> Self {
        Self::Usage {
            subject: subject.into(),
            metric: metric.into(),
            time_range: time_range.into(),
            window_size,
        }
    }

    pub fn model_usage(subject: impl Into<String>, time_range: impl Into<String>) -> Self {
        Self::ModelUsage {
            subject: subject.into(),
            time_range: time_range.into(),
        }
    }
}

/// Freshness, retention, and retry settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    /// Entries younger than this are served without a refetch.
    pub fresh_for: Duration,
    /// Entries are evicted this long after their last write.
    pub retain_for: Duration,
    /// Retries after the first failed read.
    pub read_retries: u32,
    /// Retries after the first failed mutation.
    pub mutation_retries: u32,
    /// First retry delay; doubles each attempt.
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub max_entries: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fresh_for: Duration::from_secs(5 * 60),
            retain_for: Duration::from_secs(10 * 60),
            read_retries: 3,
            mutation_retries: 1,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            max_entries: 1_000,
        }
    }
}

impl CachePolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base_delay
            .saturating_mul(factor)
            .min(self.retry_max_delay)
    }
}

/// Cached payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Consumers(Arc<Vec<Consumer>>),
    Usage(Arc<UsageResponse>),
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub data: CachedData,
    pub fetched_at: Instant,
    /// Set by mutations; forces a refetch on the next read.
    pub invalidated: bool,
}

impl Entry {
    pub fn new(data: CachedData) -> Self {
        Self {
            data,
            fetched_at: Instant::now(),
            invalidated: false,
        }
    }

    pub fn is_fresh(&self, policy: &CachePolicy) -> bool {
        !self.invalidated && self.fetched_at.elapsed() < policy.fresh_for
    }
}
