//! # Scratch File Management
//!
//! Uploads and chunks live on disk only for the duration of one request. Each request
//! gets its own directory under the configured scratch root, held as a
//! [`tempfile::TempDir`]. The upload and every chunk are written inside it, and
//! dropping the directory removes whatever is still there on every exit path (normal
//! return, `?` early return, or panic unwinding).
//!
//! Chunks are [`NamedTempFile`]s so each one can be deleted as soon as its
//! transcription call resolves, without waiting for the request to end.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

/// Create the working directory for one request under `root`.
///
/// `root` must already exist.
pub fn request_dir(root: &Path) -> io::Result<TempDir> {
    let dir = tempfile::Builder::new().prefix("upload-").tempdir_in(root)?;
    debug!(path = %dir.path().display(), "Created request scratch directory");
    Ok(dir)
}

/// Path the raw upload is streamed to inside a request directory.
pub fn upload_path(dir: &Path, extension: Option<&str>) -> PathBuf {
    match extension.filter(|ext| !ext.is_empty()) {
        Some(ext) => dir.join(format!("upload.{}", ext)),
        None => dir.join("upload"),
    }
}

/// Create the file for chunk `index`. It is deleted when dropped or closed.
pub fn chunk_file(dir: &Path, index: usize, extension: &str) -> io::Result<NamedTempFile> {
    let suffix = if extension.is_empty() {
        String::new()
    } else {
        format!(".{}", extension)
    };

    tempfile::Builder::new()
        .prefix(&format!("chunk-{:03}-", index))
        .suffix(&suffix)
        .tempfile_in(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_dir_is_removed_with_contents() {
        let root = tempfile::tempdir().unwrap();
        let upload = {
            let dir = request_dir(root.path()).unwrap();
            assert!(dir.path().starts_with(root.path()));

            let upload = upload_path(dir.path(), Some("wav"));
            std::fs::write(&upload, b"audio").unwrap();
            upload
        };

        assert!(!upload.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_upload_path_keeps_extension() {
        let dir = Path::new("/scratch/upload-x");
        assert_eq!(upload_path(dir, Some("mp3")), dir.join("upload.mp3"));
        assert_eq!(upload_path(dir, Some("")), dir.join("upload"));
        assert_eq!(upload_path(dir, None), dir.join("upload"));
    }

    #[test]
    fn test_chunk_files_are_unique_and_close_early() {
        let dir = tempfile::tempdir().unwrap();
        let first = chunk_file(dir.path(), 0, "mp3").unwrap();
        let second = chunk_file(dir.path(), 1, "mp3").unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(first.path().extension().and_then(|e| e.to_str()), Some("mp3"));
        let name = second.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("chunk-001-"));

        let first_path = first.path().to_path_buf();
        first.close().unwrap();
        assert!(!first_path.exists());
        assert!(second.path().exists());
    }

    #[test]
    fn test_chunk_that_outlives_its_handle_is_swept_with_the_request() {
        let root = tempfile::tempdir().unwrap();
        let dir = request_dir(root.path()).unwrap();

        // A chunk whose own deletion never happened
        let (_, stranded) = chunk_file(dir.path(), 0, "ogg").unwrap().keep().unwrap();
        assert!(stranded.exists());

        drop(dir);
        assert!(!stranded.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
