//! # Audio File Handling
//!
//! Everything that touches uploaded audio before it reaches the transcription API.
//!
//! ## Key Components:
//! - **Format Validator**: Extension allow-list check (`format`)
//! - **Scratch Files**: Per-request working directory and self-deleting chunk files (`scratch`)
//! - **Chunker**: Fixed-size byte-range splitting for oversized uploads (`chunker`)
//! - **Uploaded Audio**: Description of the persisted upload (`upload`)

pub mod chunker;
pub mod format;
pub mod scratch;
pub mod upload;

pub use format::FormatValidator;
pub use upload::UploadedAudio;
