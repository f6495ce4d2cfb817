use crate::state::{AppMetrics, AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let transcriber = state.pipeline.transcriber();

    let (ready, readiness_error) = match transcriber.ensure_ready() {
        Ok(()) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };

    HttpResponse::Ok().json(json!({
        "status": if ready { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": "transcript-docs-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(&metrics),
            "active_jobs": metrics.active_jobs
        },
        "transcription": {
            "model": transcriber.model(),
            "language": config.transcription.language,
            "ready": ready,
            "error": readiness_error,
            "max_direct_bytes": config.upload.max_direct_bytes,
            "chunk_size_bytes": config.upload.chunk_size_bytes,
            "allowed_extensions": state.pipeline.validator().allowed()
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    let transcription = &metrics.transcription;

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(&metrics),
            "active_jobs": metrics.active_jobs,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "transcription": {
            "jobs_succeeded": transcription.jobs_succeeded,
            "jobs_failed": transcription.jobs_failed,
            "chunked_jobs": transcription.chunked_jobs,
            "units_transcribed": transcription.units_transcribed,
            "bytes_received": transcription.bytes_received,
            "failures_by_code": transcription.failures_by_code
        },
        "endpoints": endpoint_stats
    }))
}

fn error_rate(metrics: &AppMetrics) -> f64 {
    if metrics.request_count > 0 {
        metrics.error_count as f64 / metrics.request_count as f64
    } else {
        0.0
    }
}
