use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Effective configuration, with the API key reduced to a presence flag.
///
/// ## Endpoint: `GET /api/v1/config`
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();
    let transcription = &config.transcription;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "transcription": {
                "api_base_url": transcription.api_base_url,
                "api_key_configured": transcription.has_credential(),
                "model": transcription.model,
                "language": transcription.language,
                "temperature": transcription.temperature,
                "request_timeout_secs": transcription.request_timeout_secs,
                "max_retries": transcription.max_retries,
                "retry_base_delay_ms": transcription.retry_base_delay_ms,
                "rate_limit_backoff_ms": transcription.rate_limit_backoff_ms
            },
            "upload": {
                "max_upload_bytes": config.upload.max_upload_bytes,
                "max_direct_bytes": config.upload.max_direct_bytes,
                "chunk_size_bytes": config.upload.chunk_size_bytes,
                "allowed_extensions": config.upload.allowed_extensions
            },
            "document": {
                "line_width": config.document.line_width,
                "lines_per_page": config.document.lines_per_page
            }
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::test_support::state_with;
    use crate::transcription::WhisperClient;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_config_never_exposes_api_key() {
        let mut config = AppConfig::default();
        config.transcription.api_key = Some("sk-super-secret".to_string());
        let client = WhisperClient::from_settings(&config.transcription).unwrap();
        let state = state_with(Arc::new(client), config);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/config", web::get().to(get_config)),
        )
        .await;

        let req = test::TestRequest::get().uri("/config").to_request();
        let bytes = test::call_and_read_body(&app, req).await;
        let raw = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(!raw.contains("sk-super-secret"));
        let body: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(body["config"]["transcription"]["api_key_configured"], true);
        assert_eq!(body["config"]["upload"]["chunk_size_bytes"], 20 * 1024 * 1024);
    }
}
