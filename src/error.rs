//! # Error Handling
//!
//! Every failure a transcription request can run into is one variant of [`AppError`].
//! The enum doubles as the HTTP error surface: actix calls `error_response` on whatever
//! a handler returns in its `Err`, so each variant knows its own status code.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### thiserror
//! - **Purpose**: Derives `Display` and `std::error::Error` from the `#[error(...)]`
//!   attributes, so the message lives right next to the variant
//! - **Fields in messages**: `{extension}` interpolates the field of the same name
//!
//! ### ResponseError trait
//! - **status_code()**: Which HTTP status this error maps to
//! - **error_response()**: The JSON body sent back to the client
//!
//! ## Terminal vs retryable:
//! All variants are terminal for the request. `TransientConnectionFailure` is the only
//! one the transcription client retries locally before it gives up and returns it.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::FormatUnsupported { extension: "aiff".to_string() });
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The uploaded file's extension is not on the allow-list
    #[error(
        "Unsupported audio format {}. Please convert the file to MP3, WAV or M4A and try again",
        describe_extension(.extension)
    )]
    FormatUnsupported { extension: String },

    /// No speech-to-text credential was configured
    #[error("Transcription API key is not configured")]
    MissingCredential,

    /// A credential is configured but does not look like an API key
    #[error("Transcription API key has an invalid format")]
    InvalidCredentialFormat,

    /// The multipart form did not carry an `audio` file (or it was empty)
    #[error("No audio file provided")]
    NoFileProvided,

    /// The upload exceeds the configured maximum size
    #[error("Uploaded file is too large: {size} bytes (max: {limit} bytes)")]
    UploadTooLarge { size: u64, limit: u64 },

    /// Upstream rejected the credential
    #[error("Authentication with the transcription API failed: {0}")]
    AuthenticationFailed(String),

    /// Upstream account-level rate limit hit
    #[error("Transcription API rate limit exceeded, please try again later: {0}")]
    RateLimited(String),

    /// A transcription unit still exceeds the upstream upload cap
    #[error("Audio segment is too large for the transcription API: {0}")]
    PayloadTooLarge(String),

    /// Network-level failure that survived every retry
    #[error("Could not reach the transcription API after {attempts} attempts: {message}")]
    TransientConnectionFailure { attempts: u32, message: String },

    /// Every fragment came back blank
    #[error("Transcription produced no text. The audio may be silent or unintelligible")]
    EmptyTranscriptionResult,

    /// Any other upstream failure, carrying the upstream message
    #[error("Transcription API error: {0}")]
    UpstreamUnknownError(String),

    /// The client sent a malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side problems (scratch I/O, rendering)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable identifier sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::FormatUnsupported { .. } => "format_unsupported",
            AppError::MissingCredential => "missing_credential",
            AppError::InvalidCredentialFormat => "invalid_credential_format",
            AppError::NoFileProvided => "no_file_provided",
            AppError::UploadTooLarge { .. } => "upload_too_large",
            AppError::AuthenticationFailed(_) => "authentication_failed",
            AppError::RateLimited(_) => "rate_limited",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::TransientConnectionFailure { .. } => "transient_connection_failure",
            AppError::EmptyTranscriptionResult => "empty_transcription_result",
            AppError::UpstreamUnknownError(_) => "upstream_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Whether the transcription client may try the same call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientConnectionFailure { .. })
    }
}

fn describe_extension(extension: &str) -> String {
    if extension.is_empty() {
        "(file has no extension)".to_string()
    } else {
        format!("'.{}'", extension)
    }
}

/// ## HTTP Status Code Mapping:
/// - client mistakes (format, missing file, malformed form) → 400
/// - upstream credential rejected → 401, rate limited → 429
/// - upload or segment too large → 413
/// - upstream unreachable → 503, other upstream failure → 502
/// - blank transcript → 422
/// - missing credential and local I/O problems → 500
///
/// ## JSON Response Format:
/// ```json
/// { "error": "Unsupported audio format '.aiff'. ...", "code": "format_unsupported" }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::FormatUnsupported { .. }
            | AppError::NoFileProvided
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UploadTooLarge { .. } | AppError::PayloadTooLarge(_) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            AppError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::TransientConnectionFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::EmptyTranscriptionResult => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UpstreamUnknownError(_) => StatusCode::BAD_GATEWAY,
            AppError::MissingCredential
            | AppError::InvalidCredentialFormat
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }))
    }
}

/// Scratch file reads and writes.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    #[test]
    fn test_status_mapping() {
        let unsupported = AppError::FormatUnsupported { extension: "aiff".to_string() };
        assert_eq!(unsupported.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::RateLimited("slow down".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::EmptyTranscriptionResult.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::MissingCredential.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_format_message_names_extension() {
        let err = AppError::FormatUnsupported { extension: "aiff".to_string() };
        let message = err.to_string();
        assert!(message.contains(".aiff"));
        assert!(message.contains("convert"));

        let bare = AppError::FormatUnsupported { extension: String::new() };
        assert!(bare.to_string().contains("no extension"));
    }

    #[test]
    fn test_only_connection_failures_are_transient() {
        let transient = AppError::TransientConnectionFailure {
            attempts: 1,
            message: "connection refused".into(),
        };
        assert!(transient.is_transient());
        assert!(!AppError::RateLimited("429".into()).is_transient());
        assert!(!AppError::AuthenticationFailed("401".into()).is_transient());
    }

    #[test]
    fn test_error_body_shape() {
        let response = AppError::NoFileProvided.error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().try_into_bytes().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "No audio file provided");
        assert_eq!(body["code"], "no_file_provided");
    }

    #[test]
    fn test_scratch_io_failure_is_internal() {
        let err: AppError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume").into();
        assert_eq!(err.code(), "internal_error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("read-only volume"));
    }
}
