//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **Option<T>**: The API key may legitimately be absent; requests then fail with a clear error
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST`, `PORT` and `OPENAI_API_KEY` environment variables
//! 2. Environment variables (APP_SERVER__HOST, APP_UPLOAD__CHUNK_SIZE_BYTES, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

const MIB: u64 = 1024 * 1024;

/// Hard upload cap of the upstream transcription API. Every transcription unit must
/// stay at or below it.
pub const API_UPLOAD_LIMIT_BYTES: u64 = 25 * MIB;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub transcription: TranscriptionSettings,
    pub upload: UploadConfig,
    pub document: DocumentConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Everything the speech-to-text client needs.
///
/// ## Fields:
/// - `api_key`: Bearer credential, usually supplied through `OPENAI_API_KEY`
/// - `api_base_url`: Scheme and host of the OpenAI-compatible API
/// - `model`, `language`, `temperature`: Fixed decoding parameters sent with every call
/// - `max_retries`, `retry_base_delay_ms`: Linear backoff for connection failures
/// - `rate_limit_backoff_ms`: Waits before retrying a rate-limited call (empty = no retry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub language: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub rate_limit_backoff_ms: Vec<u64>,
}

/// Upload handling and chunking thresholds.
///
/// ## Size rules:
/// - Files up to `max_direct_bytes` are sent to the API in one piece
/// - Larger files are split into `chunk_size_bytes` slices
/// - Both must stay below the API's 25 MiB cap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_upload_bytes: u64,
    pub max_direct_bytes: u64,
    pub chunk_size_bytes: u64,
    /// Where uploads and chunks are written; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
    pub allowed_extensions: Vec<String>,
}

/// Page geometry of the rendered transcript document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub line_width: usize,
    pub lines_per_page: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            transcription: TranscriptionSettings {
                api_key: None,
                api_base_url: "https://api.openai.com".to_string(),
                model: "whisper-1".to_string(),
                language: "en".to_string(),
                temperature: 0.0, // Deterministic decoding
                request_timeout_secs: 300,
                max_retries: 3,
                retry_base_delay_ms: 1000,
                rate_limit_backoff_ms: Vec::new(),
            },
            upload: UploadConfig {
                max_upload_bytes: 500 * MIB,
                max_direct_bytes: 25 * MIB,
                chunk_size_bytes: 20 * MIB,
                scratch_dir: None,
                allowed_extensions: [
                    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
                ]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            },
            document: DocumentConfig {
                line_width: 90,
                lines_per_page: 54,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_UPLOAD__CHUNK_SIZE_BYTES=10485760`: 10 MiB chunks
    /// - `APP_TRANSCRIPTION__LANGUAGE=de`: Transcribe German audio
    /// - `OPENAI_API_KEY=sk-...`: The API credential
    /// - `HOST` / `PORT`: Special case for deployment platforms
    ///
    /// Nested keys use a double underscore because several field names contain one.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            settings = settings.set_override("transcription.api_key", key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Chunk size is positive and strictly below the API upload cap
    /// - The direct-transcription threshold does not exceed the API upload cap
    /// - At least one audio extension is allowed
    /// - Page geometry is usable
    ///
    /// A missing API key is *not* a validation failure: the server still starts and
    /// every transcription request reports the missing credential.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.upload.chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!("Chunk size must be greater than 0"));
        }

        if self.upload.chunk_size_bytes >= API_UPLOAD_LIMIT_BYTES {
            return Err(anyhow::anyhow!(
                "Chunk size {} must be smaller than the API upload limit of {} bytes",
                self.upload.chunk_size_bytes,
                API_UPLOAD_LIMIT_BYTES
            ));
        }

        if self.upload.max_direct_bytes > API_UPLOAD_LIMIT_BYTES {
            return Err(anyhow::anyhow!(
                "Direct transcription threshold {} exceeds the API upload limit of {} bytes",
                self.upload.max_direct_bytes,
                API_UPLOAD_LIMIT_BYTES
            ));
        }

        if self.upload.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one audio extension must be allowed"));
        }

        if self.document.line_width < 20 || self.document.lines_per_page < 10 {
            return Err(anyhow::anyhow!(
                "Document needs at least 20 columns and 10 lines per page"
            ));
        }

        Ok(())
    }

    /// Configured scratch directory, falling back to the OS temp directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.upload
            .scratch_dir
            .clone()
            .unwrap_or_else(env::temp_dir)
    }
}

impl TranscriptionSettings {
    /// Whether an API key is present (says nothing about its validity).
    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }
}
