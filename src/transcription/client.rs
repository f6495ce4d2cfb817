//! # Speech-to-Text Client
//!
//! Talks to an OpenAI-compatible `/v1/audio/transcriptions` endpoint. One call per
//! transcription unit (whole file or one chunk), always with the same decoding
//! parameters so repeated calls on the same audio give the same text as far as the
//! model allows.
//!
//! ## Error classification:
//! - 401 / 403 → `AuthenticationFailed` (final)
//! - 429 → `RateLimited` (final unless a rate-limit backoff schedule is configured)
//! - 413 → `PayloadTooLarge` (final)
//! - connect / timeout / request-level failures → `TransientConnectionFailure` (retried)
//! - anything else → `UpstreamUnknownError` with the upstream message
//!
//! ## Ownership:
//! The client is built once from configuration at startup and shared behind
//! `Arc<dyn SpeechToText>`. It holds no per-call state, so sharing needs no locks.

use crate::config::TranscriptionSettings;
use crate::error::{AppError, AppResult};
use crate::transcription::retry::RetryPolicy;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const TRANSCRIPTIONS_PATH: &str = "/v1/audio/transcriptions";

/// A service that turns one audio file into text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Check that calls can be made at all (credential present and well-formed).
    fn ensure_ready(&self) -> AppResult<()> {
        Ok(())
    }

    /// Transcribe the audio file at `audio`.
    async fn transcribe(&self, audio: &Path) -> AppResult<String>;

    /// Model identifier reported in health output.
    fn model(&self) -> &str;
}

/// Client for the hosted Whisper transcription API.
pub struct WhisperClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    language: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl WhisperClient {
    pub fn from_settings(settings: &TranscriptionSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}{}",
                settings.api_base_url.trim_end_matches('/'),
                TRANSCRIPTIONS_PATH
            ),
            api_key: settings
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            model: settings.model.clone(),
            language: settings.language.clone(),
            temperature: settings.temperature,
            retry: RetryPolicy::from_settings(settings),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn credential(&self) -> AppResult<&str> {
        let key = self.api_key.as_deref().ok_or(AppError::MissingCredential)?;
        if !key.starts_with("sk-") {
            return Err(AppError::InvalidCredentialFormat);
        }
        Ok(key)
    }

    /// One HTTP round trip, no retries.
    async fn send_once(&self, audio: &[u8], file_name: &str) -> AppResult<String> {
        let part = Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|e| AppError::Internal(format!("Invalid mime type: {}", e)))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "text")
            .text("language", self.language.clone())
            .text("temperature", self.temperature.to_string());

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.credential()?)
            .multipart(form)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport_error)?;

        if status.is_success() {
            return Ok(body.trim().to_string());
        }

        Err(classify_status(status, &body))
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    fn ensure_ready(&self) -> AppResult<()> {
        self.credential().map(|_| ())
    }

    async fn transcribe(&self, audio: &Path) -> AppResult<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let mut attempts = 0u32;
        let mut connection_retries = 0u32;
        let mut rate_limit_retries = 0u32;

        loop {
            attempts += 1;
            debug!(file = %file_name, bytes = bytes.len(), attempt = attempts, "Sending audio to transcription API");

            let err = match self.send_once(&bytes, &file_name).await {
                Ok(text) => {
                    info!(file = %file_name, attempt = attempts, chars = text.len(), "Transcription call succeeded");
                    return Ok(text);
                }
                Err(err) => err,
            };

            let delay = match &err {
                AppError::TransientConnectionFailure { .. } => {
                    connection_retries += 1;
                    self.retry.delay_for(&err, connection_retries)
                }
                AppError::RateLimited(_) => {
                    rate_limit_retries += 1;
                    self.retry.delay_for(&err, rate_limit_retries)
                }
                _ => None,
            };

            match delay {
                Some(delay) => {
                    warn!(
                        file = %file_name,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transcription call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(match err {
                        AppError::TransientConnectionFailure { message, .. } => {
                            AppError::TransientConnectionFailure { attempts, message }
                        }
                        other => other,
                    });
                }
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn classify_transport_error(err: reqwest::Error) -> AppError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        AppError::TransientConnectionFailure {
            attempts: 1,
            message: err.to_string(),
        }
    } else {
        AppError::UpstreamUnknownError(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> AppError {
    let message = upstream_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::AuthenticationFailed(message),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(message),
        StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge(message),
        _ => AppError::UpstreamUnknownError(message),
    }
}

/// Pull `error.message` out of an OpenAI-style error body, falling back to the raw
/// body and then to the status text.
fn upstream_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|error| error.get("message").or(Some(error)))
                .and_then(|message| message.as_str())
                .map(str::to_string)
        });

    from_json
        .or_else(|| Some(body.trim().to_string()).filter(|text| !text.is_empty()))
        .unwrap_or_else(|| {
            format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown status")
            )
        })
}

fn mime_for(file_name: &str) -> &'static str {
    match crate::audio::format::extension_of(file_name).as_deref() {
        Some("mp3") | Some("mpga") | Some("mpeg") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use mockito::Matcher;

    fn settings(base_url: &str) -> TranscriptionSettings {
        let mut settings = AppConfig::default().transcription;
        settings.api_base_url = base_url.to_string();
        settings.api_key = Some("sk-test".to_string());
        settings.retry_base_delay_ms = 0;
        settings.request_timeout_secs = 5;
        settings
    }

    fn audio_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, b"fake mp3 payload").unwrap();
        path
    }

    #[tokio::test]
    async fn test_successful_call_sends_fixed_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TRANSCRIPTIONS_PATH)
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("whisper-1".into()),
                Matcher::Regex("name=\"response_format\"".into()),
                Matcher::Regex("name=\"language\"".into()),
                Matcher::Regex("name=\"temperature\"".into()),
                Matcher::Regex("filename=\"clip.mp3\"".into()),
            ]))
            .with_status(200)
            .with_body("  Hello there.\n")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = WhisperClient::from_settings(&settings(&server.url())).unwrap();
        let text = client.transcribe(&audio_file(&dir)).await.unwrap();

        assert_eq!(text, "Hello there.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_authentication_failure_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TRANSCRIPTIONS_PATH)
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = WhisperClient::from_settings(&settings(&server.url())).unwrap();
        let err = client.transcribe(&audio_file(&dir)).await.unwrap_err();

        match err {
            AppError::AuthenticationFailed(message) => {
                assert_eq!(message, "Incorrect API key provided")
            }
            other => panic!("expected AuthenticationFailed, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forbidden_is_an_authentication_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TRANSCRIPTIONS_PATH)
            .with_status(403)
            .with_body(r#"{"error":{"message":"Project does not have access to model"}}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = WhisperClient::from_settings(&settings(&server.url())).unwrap();
        let err = client.transcribe(&audio_file(&dir)).await.unwrap_err();

        match err {
            AppError::AuthenticationFailed(message) => {
                assert_eq!(message, "Project does not have access to model")
            }
            other => panic!("expected AuthenticationFailed, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_immediately_by_default() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TRANSCRIPTIONS_PATH)
            .with_status(429)
            .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = WhisperClient::from_settings(&settings(&server.url())).unwrap();
        let err = client.transcribe(&audio_file(&dir)).await.unwrap_err();

        assert!(matches!(err, AppError::RateLimited(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_follows_configured_schedule() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TRANSCRIPTIONS_PATH)
            .with_status(429)
            .with_body("slow down")
            .expect(3)
            .create_async()
            .await;

        let mut settings = settings(&server.url());
        settings.rate_limit_backoff_ms = vec![0, 0];

        let dir = tempfile::tempdir().unwrap();
        let client = WhisperClient::from_settings(&settings).unwrap();
        let err = client.transcribe(&audio_file(&dir)).await.unwrap_err();

        assert!(matches!(err, AppError::RateLimited(ref m) if m == "slow down"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", TRANSCRIPTIONS_PATH)
            .with_status(413)
            .with_body("")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = WhisperClient::from_settings(&settings(&server.url())).unwrap();
        let err = client.transcribe(&audio_file(&dir)).await.unwrap_err();

        match err {
            AppError::PayloadTooLarge(message) => assert_eq!(message, "413 Payload Too Large"),
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_upstream_error_keeps_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TRANSCRIPTIONS_PATH)
            .with_status(500)
            .with_body(r#"{"error":{"message":"The server had an error"}}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = WhisperClient::from_settings(&settings(&server.url())).unwrap();
        let err = client.transcribe(&audio_file(&dir)).await.unwrap_err();

        assert!(matches!(err, AppError::UpstreamUnknownError(ref m) if m == "The server had an error"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_failure_retries_then_gives_up() {
        // Nothing listens on port 1
        let mut settings = settings("http://127.0.0.1:1");
        settings.max_retries = 2;

        let dir = tempfile::tempdir().unwrap();
        let client = WhisperClient::from_settings(&settings).unwrap();
        let err = client.transcribe(&audio_file(&dir)).await.unwrap_err();

        match err {
            AppError::TransientConnectionFailure { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected TransientConnectionFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_credential_checks() {
        let mut settings = settings("http://localhost");

        settings.api_key = None;
        let client = WhisperClient::from_settings(&settings).unwrap();
        assert!(matches!(client.ensure_ready(), Err(AppError::MissingCredential)));

        settings.api_key = Some("not-a-key".to_string());
        let client = WhisperClient::from_settings(&settings).unwrap();
        assert!(matches!(client.ensure_ready(), Err(AppError::InvalidCredentialFormat)));

        settings.api_key = Some("sk-valid".to_string());
        let client = WhisperClient::from_settings(&settings).unwrap();
        assert!(client.ensure_ready().is_ok());
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = WhisperClient::from_settings(&settings("https://api.example.com/")).unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/audio/transcriptions");
    }

    #[test]
    fn test_upstream_message_fallbacks() {
        assert_eq!(
            upstream_message(StatusCode::BAD_REQUEST, r#"{"error":{"message":"bad file"}}"#),
            "bad file"
        );
        assert_eq!(upstream_message(StatusCode::BAD_REQUEST, r#"{"error":"flat"}"#), "flat");
        assert_eq!(upstream_message(StatusCode::BAD_GATEWAY, "oops"), "oops");
        assert_eq!(upstream_message(StatusCode::BAD_GATEWAY, "  "), "502 Bad Gateway");
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("a.MP3"), "audio/mpeg");
        assert_eq!(mime_for("chunk-001-x.m4a"), "audio/mp4");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }
}
