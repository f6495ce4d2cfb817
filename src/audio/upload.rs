//! The scratch copy of an uploaded audio file.

use std::path::PathBuf;

/// An upload persisted to disk for the duration of one request.
///
/// The file itself lives in the request's scratch directory ([`super::scratch`]);
/// this value only describes it.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub path: PathBuf,
    /// Name the client sent, used for format validation and the document title
    pub filename: String,
    pub size: u64,
}

impl UploadedAudio {
    pub fn new(path: impl Into<PathBuf>, filename: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            size,
        }
    }
}

/// Strip any client-side directory components from an upload's file name.
///
/// Browsers send bare names, but some clients send full paths (`C:\Users\...\a.mp3`).
pub fn sanitize_filename(raw: &str) -> String {
    raw.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(raw)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("talk.mp3"), "talk.mp3");
        assert_eq!(sanitize_filename("/home/me/talk.mp3"), "talk.mp3");
        assert_eq!(sanitize_filename(r"C:\Users\me\talk.MP3"), "talk.MP3");
        assert_eq!(sanitize_filename("  padded.wav "), "padded.wav");
    }
}
