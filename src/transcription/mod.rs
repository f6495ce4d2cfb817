//! # Transcription Module
//!
//! Turns uploaded audio into text through a hosted speech-to-text API.
//!
//! ## Key Components:
//! - **Client**: `SpeechToText` trait and the Whisper API implementation
//! - **Retry**: Backoff schedule for connection failures and rate limits
//! - **Pipeline**: Format check, direct-vs-chunked decision, sequential calls, joining

pub mod client;
pub mod pipeline;
pub mod retry;

pub use client::{SpeechToText, WhisperClient};
pub use pipeline::{TranscriptionPipeline, TranscriptionResult};
