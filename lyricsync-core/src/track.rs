use crate::index::TimeIndex;
use crate::lrc::{LrcDocument, LrcMetadata, LyricLine, ParseOptions};
use chrono::{DateTime, Utc};

/// Parsed, immutable lyrics for one track
#[derive(Debug, Clone)]
pub struct LyricTrack {
    identifier: String,
    index: TimeIndex,
    metadata: LrcMetadata,
    loaded_at: DateTime<Utc>,
}

impl LyricTrack {
    #[must_use]
    pub fn from_document(identifier: impl Into<String>, document: LrcDocument) -> Self {
        Self {
            identifier: identifier.into(),
            index: TimeIndex::new(document.lines),
            metadata: document.metadata,
            loaded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn parse(identifier: impl Into<String>, raw: &str, options: ParseOptions) -> Self {
        Self::from_document(identifier, LrcDocument::parse_with(raw, options))
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub const fn index(&self) -> &TimeIndex {
        &self.index
    }

    #[must_use]
    pub fn lines(&self) -> &[LyricLine] {
        self.index.as_slice()
    }

    #[must_use]
    pub const fn metadata(&self) -> &LrcMetadata {
        &self.metadata
    }

    /// When parsing completed
    #[must_use]
    pub const fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Compare everything except `loaded_at`
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.index == other.index
            && self.metadata == other.metadata
    }
}
