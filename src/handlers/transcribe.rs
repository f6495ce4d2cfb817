//! # Transcription Endpoint
//!
//! ## Endpoint: `POST /api/v1/transcribe`
//!
//! ## Request:
//! Multipart form data with an audio file field named `audio`.
//!
//! ## Response:
//! - **200**: the transcript document as an attachment
//!   (`Content-Disposition: attachment; filename="<name>_transcript.txt"`)
//! - **4xx / 5xx**: `{ "error": "...", "code": "..." }`
//!
//! The upload is streamed straight into a per-request scratch directory. That
//! directory, with the upload and any chunk files the pipeline creates, is removed
//! before the response leaves the handler, whether it succeeded or not.

use crate::audio::format::extension_of;
use crate::audio::scratch;
use crate::audio::upload::sanitize_filename;
use crate::audio::UploadedAudio;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_multipart::{Field, Multipart};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// Name of the multipart field carrying the audio file.
pub const AUDIO_FIELD: &str = "audio";

pub async fn transcribe_upload(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let config = state.get_config();
    let workdir = scratch::request_dir(&config.scratch_dir())?;

    let upload =
        receive_audio(&mut payload, workdir.path(), config.upload.max_upload_bytes).await?;
    info!(
        filename = %upload.filename,
        size_bytes = upload.size,
        "Received audio upload"
    );

    let _job = state.begin_job(upload.size);

    let result = match state.pipeline.run(&upload).await {
        Ok(result) => result,
        Err(e) => {
            error!(filename = %upload.filename, code = e.code(), error = %e, "Transcription failed");
            state.record_job_failure(e.code());
            return Err(e);
        }
    };
    state.record_job_success(result.units, result.chunked);
    info!(
        filename = %upload.filename,
        units = result.units,
        chunked = result.chunked,
        processing_time_ms = result.processing_time_ms,
        "Transcription finished"
    );

    let document = state.renderer.render(&upload.filename, &result.text)?;
    debug!(
        filename = %document.filename,
        pages = document.pages,
        bytes = document.bytes.len(),
        "Rendered transcript document"
    );

    Ok(HttpResponse::Ok()
        .content_type(document.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(document.filename)],
        })
        .insert_header(("X-Transcript-Units", result.units.to_string()))
        .body(document.bytes))
}

/// Stream the `audio` field into the request directory.
///
/// Other fields are read and discarded. Only the first `audio` field counts.
async fn receive_audio(
    payload: &mut Multipart,
    dir: &Path,
    max_bytes: u64,
) -> AppResult<UploadedAudio> {
    let mut upload: Option<UploadedAudio> = None;

    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let (field_name, filename) = {
            let content_disposition = field.content_disposition().ok_or_else(|| {
                AppError::BadRequest("Missing content disposition".to_string())
            })?;
            (
                content_disposition.get_name().map(str::to_string),
                content_disposition.get_filename().map(sanitize_filename),
            )
        };

        if field_name.as_deref() != Some(AUDIO_FIELD) || upload.is_some() {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
            }
            continue;
        }

        let filename = filename
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let path = scratch::upload_path(dir, extension_of(&filename).as_deref());
        let mut file = tokio::fs::File::create(&path).await?;

        let mut size = 0u64;
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Upload interrupted: {}", e)))?;
            size += chunk.len() as u64;
            if size > max_bytes {
                return Err(AppError::UploadTooLarge {
                    size,
                    limit: max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        upload = Some(UploadedAudio::new(path, filename, size));
    }

    match upload {
        Some(upload) if upload.size > 0 => Ok(upload),
        _ => Err(AppError::NoFileProvided),
    }
}
