use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// A single line of lyrics with timing
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// Offset from track start, in seconds
    pub time_seconds: f64,
    /// Line text, shared by every timestamp the source line carried
    pub text: Arc<str>,
}

impl LyricLine {
    #[must_use]
    pub fn new(time_seconds: f64, text: impl Into<Arc<str>>) -> Self {
        Self {
            time_seconds,
            text: text.into(),
        }
    }
}

/// LRC metadata from ID tags, keyed by lowercase tag name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LrcMetadata {
    tags: BTreeMap<String, String>,
}

impl LrcMetadata {
    /// Insert a tag, replacing any earlier value for the same key
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.tags.insert(key.to_lowercase(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(&key.to_lowercase()).map(String::as_str)
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get("ti")
    }

    #[must_use]
    pub fn artist(&self) -> Option<&str> {
        self.get("ar")
    }

    #[must_use]
    pub fn album(&self) -> Option<&str> {
        self.get("al")
    }

    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.get("au")
    }

    /// Declared track length from a `[length:mm:ss]` tag
    #[must_use]
    pub fn length(&self) -> Option<Duration> {
        self.get("length").and_then(parse_duration_tag)
    }

    /// Value of the `[offset:...]` tag in milliseconds, can be negative
    #[must_use]
    pub fn offset_ms(&self) -> Option<i64> {
        self.get("offset").and_then(|v| v.parse().ok())
    }
}

/// Options controlling how a document is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Shift every line by the document's `[offset:ms]` tag
    pub apply_offset: bool,
}

/// A recoverable problem found while parsing. The offending tag is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseWarning {
    #[error("malformed timestamp tag [{tag}] on line {line}")]
    MalformedTimestamp { line: usize, tag: String },

    #[error("ignoring offset tag with unusable value {value:?}")]
    InvalidOffset { value: String },
}

/// Parsed LRC document containing metadata and synchronized lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LrcDocument {
    pub metadata: LrcMetadata,
    /// Sorted by `time_seconds`; equal times keep their order of appearance
    pub lines: Vec<LyricLine>,
}

impl LrcDocument {
    /// Parse an LRC string with default options
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self::parse_with(input, ParseOptions::default())
    }

    #[must_use]
    pub fn parse_with(input: &str, options: ParseOptions) -> Self {
        Self::parse_with_warnings(input, options).0
    }

    /// Parse an LRC string, returning the warnings that were logged along the way
    #[must_use]
    pub fn parse_with_warnings(input: &str, options: ParseOptions) -> (Self, Vec<ParseWarning>) {
        let mut metadata = LrcMetadata::default();
        let mut lines = Vec::new();
        let mut warnings = Vec::new();

        for (number, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // Try to parse as ID tag first
            if let Some((key, value)) = parse_id_tag(line) {
                metadata.insert(key, value);
                continue;
            }

            let scanned = scan_lyric_line(line);
            for tag in scanned.malformed {
                let warning = ParseWarning::MalformedTimestamp {
                    line: number + 1,
                    tag: tag.to_string(),
                };
                warn!("Skipping {warning}");
                warnings.push(warning);
            }

            // Free-form comment, or every tag on the line was malformed
            if scanned.times.is_empty() {
                continue;
            }

            // One entry per timestamp, all sharing the same text
            let text: Arc<str> = Arc::from(scanned.text);
            lines.extend(
                scanned
                    .times
                    .into_iter()
                    .map(|time_seconds| LyricLine {
                        time_seconds,
                        text: Arc::clone(&text),
                    }),
            );
        }

        if options.apply_offset {
            if let Some(value) = metadata.get("offset") {
                match parse_offset_seconds(value) {
                    Some(shift) => {
                        for line in &mut lines {
                            line.time_seconds = (line.time_seconds + shift).max(0.0);
                        }
                    }
                    None => {
                        let warning = ParseWarning::InvalidOffset {
                            value: value.to_string(),
                        };
                        warn!("{warning}");
                        warnings.push(warning);
                    }
                }
            }
        }

        // Vec::sort_by is stable, so ties stay in declaration order
        lines.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));

        debug!(
            "Parsed LRC document: {} lines, {} tags, {} warnings",
            lines.len(),
            metadata.len(),
            warnings.len()
        );

        (Self { metadata, lines }, warnings)
    }

    /// True when the document has no timed lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Result of scanning a candidate lyric line for timestamp tags
struct ScannedLine<'a> {
    times: Vec<f64>,
    text: String,
    malformed: Vec<&'a str>,
}

/// Parse an ID tag like [ti:Title] or [ar:Artist]
fn parse_id_tag(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('[')?;
    let end = rest.find(']')?;
    let content = &rest[..end];

    if is_timestamp_shaped(content) {
        return None;
    }

    let (key, value) = content.split_once(':')?;
    let key = key.trim();

    // Keys are names, a tag part with digits is not an ID tag
    if key.is_empty() || key.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    Some((key, value.trim()))
}

/// Pull every timestamp-shaped bracket out of a line, keeping the rest as text
fn scan_lyric_line(line: &str) -> ScannedLine<'_> {
    let mut times = Vec::new();
    let mut malformed = Vec::new();
    let mut text = String::with_capacity(line.len());
    let mut remaining = line;

    while let Some(open) = remaining.find('[') {
        let after = &remaining[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let content = &after[..close];

        if is_timestamp_shaped(content) {
            text.push_str(&remaining[..open]);
            match parse_timestamp(content) {
                Some(time) => times.push(time),
                None => malformed.push(content),
            }
        } else {
            // Not a timestamp, keep the bracket as part of the lyric
            text.push_str(&remaining[..=open + close + 1]);
        }

        remaining = &after[close + 1..];
    }
    text.push_str(remaining);

    ScannedLine {
        times,
        text: text.trim().to_string(),
        malformed,
    }
}

/// A bracket that was meant to be a timestamp, valid or not
fn is_timestamp_shaped(content: &str) -> bool {
    let content = content.trim();
    content.starts_with(|c: char| c.is_ascii_digit()) && content.contains(':')
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a timestamp string like "01:12" or "01:12.34"
fn parse_timestamp(s: &str) -> Option<f64> {
    let (minutes, rest) = s.trim().split_once(':')?;
    let (seconds, centis) = match rest.split_once('.') {
        Some((seconds, centis)) => (seconds, Some(centis)),
        None => (rest, None),
    };

    if minutes.len() > 2 || !all_digits(minutes) || seconds.len() != 2 || !all_digits(seconds) {
        return None;
    }

    let minutes: u8 = minutes.parse().ok()?;
    let seconds: u8 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    let centis: u8 = match centis {
        Some(c) if c.len() == 2 && all_digits(c) => c.parse().ok()?,
        Some(_) => return None,
        None => 0,
    };

    Some(f64::from(minutes) * 60.0 + f64::from(seconds) + f64::from(centis) / 100.0)
}

/// Parse a duration string like "mm:ss" or "mm:ss.xx"
fn parse_duration_tag(s: &str) -> Option<Duration> {
    let (minutes, seconds) = s.trim().split_once(':')?;
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;

    Duration::try_from_secs_f64(f64::from(minutes) * 60.0 + seconds).ok()
}

/// Convert an offset tag value in milliseconds to seconds
fn parse_offset_seconds(value: &str) -> Option<f64> {
    let ms: i32 = value.trim().parse().ok()?;
    Some(f64::from(ms) / 1000.0)
}
