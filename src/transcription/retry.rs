//! Retry schedule for transcription calls.
//!
//! Only two failure kinds are ever retried:
//! - connection failures, with a linearly growing wait (`base * n` before retry `n`)
//! - rate limits, following an explicit list of waits (empty list = never)
//!
//! Everything else is final on the first attempt.

use crate::config::TranscriptionSettings;
use crate::error::AppError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_connection_retries: u32,
    pub base_delay: Duration,
    pub rate_limit_backoff: Vec<Duration>,
}

impl RetryPolicy {
    pub fn from_settings(settings: &TranscriptionSettings) -> Self {
        Self {
            max_connection_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            rate_limit_backoff: settings
                .rate_limit_backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }

    /// A policy that never retries anything.
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            max_connection_retries: 0,
            base_delay: Duration::ZERO,
            rate_limit_backoff: Vec::new(),
        }
    }

    /// Wait before retry number `retry` (1-based, counted per failure kind) after
    /// `error`, or `None` when the error is final.
    pub fn delay_for(&self, error: &AppError, retry: u32) -> Option<Duration> {
        if retry == 0 {
            return None;
        }

        match error {
            e if e.is_transient() && retry <= self.max_connection_retries => {
                Some(self.base_delay * retry)
            }
            AppError::RateLimited(_) => self
                .rate_limit_backoff
                .get(retry as usize - 1)
                .copied(),
            _ => None,
        }
    }
}
