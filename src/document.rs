//! # Transcript Document Rendering
//!
//! Turns a finished transcript into the downloadable document returned to the client.
//! The default renderer produces a paginated plain-text document:
//!
//! ```text
//! Transcript: team-sync
//! Source file: team-sync.mp3
//! Generated: 2025-03-14 09:30 UTC
//! =========================================
//!
//! First paragraph, wrapped to the configured line width ...
//!
//!                                 Page 1 of 3
//! ```
//!
//! Pages are separated by a form feed so printers and pagers break them correctly.

use crate::config::DocumentConfig;
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use std::path::Path;

const PAGE_BREAK: char = '\u{0C}';
/// Footer takes a blank spacer line plus the page number line.
const FOOTER_LINES: usize = 2;

/// A rendered document ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
    pub pages: usize,
}

pub trait DocumentRenderer: Send + Sync {
    /// Render `transcript` for the upload originally named `source_filename`.
    fn render(&self, source_filename: &str, transcript: &str) -> AppResult<RenderedDocument>;
}

/// Paginated plain-text renderer.
#[derive(Debug, Clone)]
pub struct TextDocumentRenderer {
    line_width: usize,
    lines_per_page: usize,
}

impl TextDocumentRenderer {
    pub fn new(config: &DocumentConfig) -> Self {
        Self {
            line_width: config.line_width,
            lines_per_page: config.lines_per_page,
        }
    }

    pub fn render_at(
        &self,
        source_filename: &str,
        transcript: &str,
        generated_at: DateTime<Utc>,
    ) -> RenderedDocument {
        let title = document_title(source_filename);

        let mut lines = vec![
            format!("Transcript: {}", sanitize_text(&title)),
            format!("Source file: {}", sanitize_text(source_filename)),
            format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M UTC")),
            "=".repeat(self.line_width),
            String::new(),
        ];

        let clean = sanitize_text(transcript);
        let mut first = true;
        for paragraph in clean.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if !first {
                lines.push(String::new());
            }
            first = false;
            lines.extend(wrap_paragraph(paragraph, self.line_width));
        }

        let body_lines = self.lines_per_page.saturating_sub(FOOTER_LINES).max(1);
        let pages: Vec<&[String]> = lines.chunks(body_lines).collect();
        let total = pages.len();

        let mut out = String::new();
        for (index, page) in pages.iter().enumerate() {
            if index > 0 {
                out.push(PAGE_BREAK);
            }
            for line in page.iter() {
                out.push_str(line);
                out.push('\n');
            }
            // Pad short pages so the footer sits at the bottom
            for _ in page.len()..body_lines {
                out.push('\n');
            }
            out.push('\n');
            let footer = format!("Page {} of {}", index + 1, total);
            out.push_str(&format!("{:>width$}\n", footer, width = self.line_width));
        }

        RenderedDocument {
            bytes: out.into_bytes(),
            content_type: "text/plain; charset=utf-8",
            filename: format!("{}_transcript.txt", attachment_stem(&title)),
            pages: total,
        }
    }
}

impl DocumentRenderer for TextDocumentRenderer {
    fn render(&self, source_filename: &str, transcript: &str) -> AppResult<RenderedDocument> {
        Ok(self.render_at(source_filename, transcript, Utc::now()))
    }
}

/// Original file name without its extension.
fn document_title(source_filename: &str) -> String {
    let stem = Path::new(source_filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("")
        .trim();
    if stem.is_empty() {
        "transcript".to_string()
    } else {
        stem.to_string()
    }
}

/// File-name-safe version of the title for the Content-Disposition header.
fn attachment_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('_').to_string();
    if stem.is_empty() {
        "transcript".to_string()
    } else {
        stem
    }
}

/// Typographic punctuation becomes its ASCII equivalent and control characters become
/// `?`. Every other printable character, in any script, passes through.
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\t' => out.push(' '),
            '\r' => {}
            '\n' => out.push('\n'),
            c if c.is_control() => out.push('?'),
            c => out.push(c),
        }
    }
    out
}

/// Greedy word wrap; words longer than a line are split hard.
fn wrap_paragraph(paragraph: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in paragraph.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        if word.is_empty() {
            continue;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn renderer(line_width: usize, lines_per_page: usize) -> TextDocumentRenderer {
        TextDocumentRenderer::new(&DocumentConfig {
            line_width,
            lines_per_page,
        })
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_header_and_attachment_name() {
        let doc = renderer(40, 20).render_at("Team Sync.mp3", "Hello there.", fixed_time());
        let text = String::from_utf8(doc.bytes).unwrap();

        assert!(text.starts_with("Transcript: Team Sync\nSource file: Team Sync.mp3\n"));
        assert!(text.contains("Generated: 2025-03-14 09:30 UTC"));
        assert!(text.contains("Hello there."));
        assert!(text.trim_end().ends_with("Page 1 of 1"));
        assert_eq!(doc.filename, "Team_Sync_transcript.txt");
        assert_eq!(doc.pages, 1);
    }

    #[test]
    fn test_paginates_long_transcripts() {
        let paragraph = "word ".repeat(200);
        let transcript = vec![paragraph.as_str(); 3].join("\n\n");
        let doc = renderer(40, 12).render_at("long.wav", &transcript, fixed_time());
        let text = String::from_utf8(doc.bytes).unwrap();

        let pages: Vec<&str> = text.split(PAGE_BREAK).collect();
        assert_eq!(pages.len(), doc.pages);
        assert!(doc.pages > 1);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.lines().count(), 12, "page {} has wrong height", i + 1);
            assert!(page.contains(&format!("Page {} of {}", i + 1, doc.pages)));
            assert!(page.lines().all(|line| line.chars().count() <= 40));
        }
    }

    #[test]
    fn test_wrap_respects_width_and_splits_long_words() {
        let lines = wrap_paragraph("aaa bbb ccc dddddddddd", 7);
        assert_eq!(lines, vec!["aaa bbb", "ccc", "ddddddd", "ddd"]);
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(
            sanitize_text("\u{201C}It\u{2019}s fine\u{201D} \u{2014} really\u{2026}"),
            "\"It's fine\" - really..."
        );
        assert_eq!(sanitize_text("café 東京"), "café 東京");
        assert_eq!(sanitize_text("a\r\nb\u{7}"), "a\nb?");
    }

    #[test]
    fn test_non_latin_transcripts_survive_rendering() {
        let doc = renderer(40, 20).render_at(
            "会議.mp3",
            "こんにちは、皆さん。Привет всем.",
            fixed_time(),
        );
        let text = String::from_utf8(doc.bytes).unwrap();

        assert!(text.contains("Transcript: 会議"));
        assert!(text.contains("こんにちは、皆さん。Привет всем."));
        assert!(!text.contains('?'));
    }

    #[test]
    fn test_attachment_stem_fallbacks() {
        assert_eq!(document_title(".mp3"), ".mp3");
        assert_eq!(attachment_stem("東京"), "transcript");
        assert_eq!(attachment_stem("my talk (v2)"), "my_talk__v2");
    }
}
