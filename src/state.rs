//! # Application State Management
//!
//! This module holds everything request handlers share: the immutable configuration,
//! the transcription pipeline (with its API client), the document renderer, and the
//! metrics counters that every request updates.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows every actix worker thread to hold the same pipeline and config
//! - **Immutable sharing**: Config, pipeline and renderer never change after startup, so
//!   an `Arc` alone is enough, no lock needed
//!
//! ### Arc<RwLock<T>> Pattern
//! - **Used for**: Metrics only, the one piece of state that changes per request
//! - **Poisoning**: A panic while holding the lock poisons it; metrics are plain
//!   counters, so we keep using the inner value instead of propagating the panic
//!
//! ### RAII guards
//! - `JobGuard` decrements the active job counter in `Drop`, so a transcription that
//!   fails half way through can't leave the counter inflated

use crate::config::AppConfig;
use crate::document::DocumentRenderer;
use crate::transcription::TranscriptionPipeline;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<TranscriptionPipeline>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

/// Metrics collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Transcriptions currently in progress
    pub active_jobs: u32,
    pub transcription: TranscriptionMetrics,
    /// Key: endpoint name (e.g., "POST /api/v1/transcribe")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Counters for the transcription pipeline.
#[derive(Debug, Default, Clone)]
pub struct TranscriptionMetrics {
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    /// API calls that returned text (one per chunk, or one for a direct upload)
    pub units_transcribed: u64,
    pub chunked_jobs: u64,
    pub bytes_received: u64,
    /// Failures by error code
    pub failures_by_code: HashMap<String, u64>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

/// Keeps `active_jobs` accurate for the lifetime of one transcription.
pub struct JobGuard {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        let mut metrics = write_lock(&self.metrics);
        metrics.active_jobs = metrics.active_jobs.saturating_sub(1);
    }
}

fn read_lock(lock: &RwLock<AppMetrics>) -> RwLockReadGuard<'_, AppMetrics> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock(lock: &RwLock<AppMetrics>) -> RwLockWriteGuard<'_, AppMetrics> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AppState {
    pub fn new(
        config: AppConfig,
        pipeline: TranscriptionPipeline,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            renderer,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        write_lock(&self.metrics).request_count += 1;
    }

    /// Increment the total error counter (any 4xx/5xx response).
    pub fn increment_error_count(&self) {
        write_lock(&self.metrics).error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = write_lock(&self.metrics);
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Mark a transcription as started. The returned guard marks it finished on drop.
    pub fn begin_job(&self, bytes_received: u64) -> JobGuard {
        {
            let mut metrics = write_lock(&self.metrics);
            metrics.active_jobs += 1;
            metrics.transcription.bytes_received += bytes_received;
        }
        JobGuard {
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn record_job_success(&self, units: usize, chunked: bool) {
        let mut metrics = write_lock(&self.metrics);
        metrics.transcription.jobs_succeeded += 1;
        metrics.transcription.units_transcribed += units as u64;
        if chunked {
            metrics.transcription.chunked_jobs += 1;
        }
    }

    pub fn record_job_failure(&self, code: &str) {
        let mut metrics = write_lock(&self.metrics);
        metrics.transcription.jobs_failed += 1;
        *metrics
            .transcription
            .failures_by_code
            .entry(code.to_string())
            .or_default() += 1;
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Cloning releases the lock before the response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        read_lock(&self.metrics).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
