//! # Transcription Pipeline
//!
//! Drives one upload from bytes on disk to a single transcript string:
//!
//! 1. Validate the file extension (before any API call)
//! 2. Check the transcriber can make calls at all
//! 3. Small files: one call on the upload itself
//! 4. Large files: split into chunks, then one call per chunk in ascending order,
//!    each chunk file deleted as soon as its call resolves
//! 5. Join the fragments with a blank line; an all-blank result is an error
//!
//! Any failure aborts the whole run. Fragments gathered so far are dropped with it,
//! and so are the remaining chunk files, which delete themselves.

use crate::audio::{chunker, FormatValidator, UploadedAudio};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::transcription::client::SpeechToText;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Separator placed between the transcripts of consecutive units.
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Final joined transcript of one upload.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub text: String,
    /// Number of API calls made (1 for the direct path)
    pub units: usize,
    pub chunked: bool,
    pub processing_time_ms: u64,
}

pub struct TranscriptionPipeline {
    transcriber: Arc<dyn SpeechToText>,
    validator: FormatValidator,
    max_direct_bytes: u64,
    chunk_size_bytes: u64,
    scratch_dir: PathBuf,
}

impl TranscriptionPipeline {
    pub fn new(transcriber: Arc<dyn SpeechToText>, config: &AppConfig) -> Self {
        Self {
            transcriber,
            validator: FormatValidator::new(&config.upload.allowed_extensions),
            max_direct_bytes: config.upload.max_direct_bytes,
            chunk_size_bytes: config.upload.chunk_size_bytes,
            scratch_dir: config.scratch_dir(),
        }
    }

    pub fn transcriber(&self) -> &dyn SpeechToText {
        self.transcriber.as_ref()
    }

    pub fn validator(&self) -> &FormatValidator {
        &self.validator
    }

    pub async fn run(&self, upload: &UploadedAudio) -> AppResult<TranscriptionResult> {
        let start_time = Instant::now();

        let extension = self.validator.validate(&upload.filename)?;
        self.transcriber.ensure_ready()?;

        if upload.size == 0 {
            return Err(AppError::NoFileProvided);
        }

        let chunked = upload.size > self.max_direct_bytes;
        let fragments = if chunked {
            self.transcribe_in_chunks(upload, &extension).await?
        } else {
            info!(
                filename = %upload.filename,
                size_bytes = upload.size,
                "Transcribing upload directly"
            );
            vec![self.transcriber.transcribe(&upload.path).await?]
        };

        let units = fragments.len();
        let text = join_fragments(&fragments).ok_or(AppError::EmptyTranscriptionResult)?;
        let processing_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            filename = %upload.filename,
            units,
            chars = text.len(),
            processing_time_ms,
            "Transcription pipeline finished"
        );

        Ok(TranscriptionResult {
            text,
            units,
            chunked,
            processing_time_ms,
        })
    }

    /// Chunks are written next to the upload, inside the request's scratch directory.
    async fn transcribe_in_chunks(
        &self,
        upload: &UploadedAudio,
        extension: &str,
    ) -> AppResult<Vec<String>> {
        let chunk_dir = upload
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(&self.scratch_dir);
        let chunks = chunker::split_into_chunks(
            &upload.path,
            upload.size,
            self.chunk_size_bytes,
            extension,
            chunk_dir,
        )
        .await?;

        let total = chunks.len();
        info!(
            filename = %upload.filename,
            size_bytes = upload.size,
            chunk_size_bytes = self.chunk_size_bytes,
            chunks = total,
            "Upload exceeds direct limit, transcribing in chunks"
        );

        let mut fragments = Vec::with_capacity(total);
        for (index, chunk) in chunks.into_iter().enumerate() {
            info!(chunk = index + 1, total, "Transcribing chunk");
            let outcome = self.transcriber.transcribe(chunk.path()).await;

            let path = chunk.path().to_path_buf();
            if let Err(e) = chunk.close() {
                warn!(path = %path.display(), error = %e, "Could not delete chunk file");
            }

            match outcome {
                Ok(text) => fragments.push(text),
                Err(e) => {
                    error!(chunk = index + 1, total, error = %e, "Chunk transcription failed, aborting");
                    return Err(e);
                }
            }
        }

        Ok(fragments)
    }
}

/// Join fragments in order, skipping blank ones. `None` when every fragment is blank.
pub fn join_fragments(fragments: &[String]) -> Option<String> {
    let kept: Vec<&str> = fragments
        .iter()
        .map(|fragment| fragment.trim())
        .filter(|fragment| !fragment.is_empty())
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(FRAGMENT_SEPARATOR))
    }
}
