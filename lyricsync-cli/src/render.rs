//! Plain-text rendering of lyrics for the terminal.

use lyricsync_core::{format_timestamp, format_timestamp_short, LrcMetadata, LyricLine, WindowLine};

const CURRENT_MARKER: &str = ">";

/// Human label for a metadata tag
fn label(key: &str) -> &str {
    match key {
        "ti" => "Title",
        "ar" => "Artist",
        "al" => "Album",
        "au" => "Author",
        "by" => "Lyrics by",
        "length" => "Length",
        "offset" => "Offset",
        "re" => "Editor",
        "ve" => "Version",
        other => other,
    }
}

/// One `Label: value` line per tag
pub fn metadata_lines(metadata: &LrcMetadata) -> Vec<String> {
    metadata
        .iter()
        .map(|(key, value)| format!("{}: {value}", label(key)))
        .collect()
}

/// Context window lines, the current one marked
pub fn window_lines(window: &[WindowLine]) -> Vec<String> {
    window
        .iter()
        .map(|entry| {
            let marker = if entry.is_current { CURRENT_MARKER } else { " " };
            format!(
                "{marker} [{}] {}",
                format_timestamp_short(entry.line.time_seconds),
                entry.line.text
            )
        })
        .collect()
}

/// A transcript line in document notation
pub fn transcript_line(line: &LyricLine) -> String {
    format!("[{}] {}", format_timestamp(line.time_seconds), line.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricsync_core::{LrcDocument, TimeIndex};

    #[test]
    fn test_metadata_lines() {
        let document = LrcDocument::parse("[ti:Song]\n[ar:Someone]\n[xx:Custom]\n[00:01.00]a");
        let lines = metadata_lines(&document.metadata);
        assert!(lines.contains(&"Title: Song".to_string()));
        assert!(lines.contains(&"Artist: Someone".to_string()));
        assert!(lines.contains(&"xx: Custom".to_string()));
    }

    #[test]
    fn test_window_lines_mark_current() {
        let index = TimeIndex::new(
            LrcDocument::parse("[00:01.00]one\n[00:03.50]two\n[01:05.00]three").lines,
        );
        let window = index.context_window(index.resolve_current(4.0), 1);
        assert_eq!(
            window_lines(&window),
            vec![
                "  [00:01] one".to_string(),
                "> [00:03] two".to_string(),
                "  [01:05] three".to_string(),
            ]
        );
    }

    #[test]
    fn test_transcript_line() {
        let line = LyricLine::new(65.25, "Hello");
        assert_eq!(transcript_line(&line), "[01:05.25] Hello");
    }
}
