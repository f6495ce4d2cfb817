//! Audio format validation.
//!
//! Only the file extension is checked. The upstream API decodes the container itself
//! and reports anything it cannot read, so sniffing magic bytes here would only
//! duplicate that work.

use crate::error::{AppError, AppResult};
use std::path::Path;

/// Case-insensitive extension allow-list.
#[derive(Debug, Clone)]
pub struct FormatValidator {
    allowed: Vec<String>,
}

impl FormatValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Accept `filename` if its extension is on the allow-list.
    ///
    /// Returns the normalized (lowercase) extension so callers can reuse it when naming
    /// chunk files.
    pub fn validate(&self, filename: &str) -> AppResult<String> {
        let extension = extension_of(filename).unwrap_or_default();

        if !extension.is_empty() && self.allowed.iter().any(|allowed| *allowed == extension) {
            Ok(extension)
        } else {
            Err(AppError::FormatUnsupported { extension })
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

/// Lowercase extension of a file name, without the dot.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
