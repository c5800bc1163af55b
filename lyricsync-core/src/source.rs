//! Local lyric documents: where raw text comes from, and where fetched text goes.

use crate::error::Result;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Audio extensions stripped from an identifier to find its lyric file stem
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "m4a", "aac", "wav"];

/// Default extension for lyric documents
pub const LRC_EXTENSION: &str = "lrc";

/// Supplies raw lyric documents that are available without a fetch.
///
/// Implementations must be cheap and side-effect free; they are called while
/// the cache holds the entry for `identifier`.
pub trait LyricsSource: Send + Sync {
    /// Raw document text for `identifier`, or `None` when there is none locally
    fn read(&self, identifier: &str) -> Option<String>;
}

/// Receives documents obtained by a fetch so later loads find them locally
pub trait LyricsSink: Send + Sync {
    /// Persist `raw` for `identifier`
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be stored.
    fn write(&self, identifier: &str, raw: &str) -> Result<()>;
}

/// A source with no local documents
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocalLyrics;

impl LyricsSource for NoLocalLyrics {
    fn read(&self, _identifier: &str) -> Option<String> {
        None
    }
}

/// In-memory documents keyed by identifier
#[derive(Debug, Default)]
pub struct MemoryLyrics {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryLyrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, builder style
    #[must_use]
    pub fn with_document(self, identifier: impl Into<String>, raw: impl Into<String>) -> Self {
        self.insert(identifier, raw);
        self
    }

    pub fn insert(&self, identifier: impl Into<String>, raw: impl Into<String>) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.into(), raw.into());
    }

    pub fn remove(&self, identifier: &str) -> Option<String> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identifier)
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identifier)
    }
}

impl LyricsSource for MemoryLyrics {
    fn read(&self, identifier: &str) -> Option<String> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .cloned()
    }
}

impl LyricsSink for MemoryLyrics {
    fn write(&self, identifier: &str, raw: &str) -> Result<()> {
        self.insert(identifier, raw);
        Ok(())
    }
}

/// A directory of `<song name>.lrc` files
#[derive(Debug, Clone)]
pub struct LrcDirectory {
    root: PathBuf,
    extension: String,
}

impl LrcDirectory {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: LRC_EXTENSION.to_string(),
        }
    }

    /// Use a different file extension for lyric documents
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Path of the lyric document for `identifier`
    #[must_use]
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", lyrics_stem(identifier), self.extension))
    }
}

impl LyricsSource for LrcDirectory {
    fn read(&self, identifier: &str) -> Option<String> {
        let path = self.path_for(identifier);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                debug!("Read local lyrics from {:?}", path);
                Some(raw)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read lyrics file {:?}: {}", path, e);
                None
            }
        }
    }
}

impl LyricsSink for LrcDirectory {
    fn write(&self, identifier: &str, raw: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(identifier);
        fs::write(&path, raw)?;
        info!("Saved fetched lyrics to {:?}", path);
        Ok(())
    }
}

/// File stem for an identifier: audio extension removed, path separators replaced
#[must_use]
pub fn lyrics_stem(identifier: &str) -> String {
    let name = identifier.trim();
    let name = name
        .rsplit_once('.')
        .filter(|(stem, ext)| {
            !stem.is_empty()
                && AUDIO_EXTENSIONS
                    .iter()
                    .any(|audio| audio.eq_ignore_ascii_case(ext))
        })
        .map_or(name, |(stem, _)| stem);

    name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lyricsync-source-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_lyrics_stem() {
        assert_eq!(lyrics_stem("Artist - Song.mp3"), "Artist - Song");
        assert_eq!(lyrics_stem("Artist - Song.FLAC"), "Artist - Song");
        assert_eq!(lyrics_stem("Mr. Blue Sky"), "Mr. Blue Sky");
        assert_eq!(lyrics_stem("albums/disc1/track"), "albums_disc1_track");
        assert_eq!(lyrics_stem(".mp3"), ".mp3");
    }

    #[test]
    fn test_memory_lyrics() {
        let memory = MemoryLyrics::new().with_document("a", "[00:01.00]x");
        assert_eq!(memory.read("a").as_deref(), Some("[00:01.00]x"));
        assert_eq!(memory.read("b"), None);

        memory.write("b", "[00:02.00]y").unwrap();
        assert!(memory.contains("b"));
        assert_eq!(memory.remove("a").as_deref(), Some("[00:01.00]x"));
        assert!(!memory.contains("a"));
    }

    #[test]
    fn test_directory_round_trip() {
        let dir = temp_dir("round-trip");
        let store = LrcDirectory::new(&dir);

        assert_eq!(store.read("Artist - Song.mp3"), None);
        store.write("Artist - Song.mp3", "[00:01.00]hi").unwrap();

        assert_eq!(store.path_for("Artist - Song.mp3"), dir.join("Artist - Song.lrc"));
        assert_eq!(store.read("Artist - Song").as_deref(), Some("[00:01.00]hi"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_directory_extension() {
        let store = LrcDirectory::new("/lyrics").with_extension("txt");
        assert_eq!(store.path_for("song.ogg"), PathBuf::from("/lyrics/song.txt"));
    }

    #[test]
    fn test_no_local_lyrics() {
        assert_eq!(NoLocalLyrics.read("anything"), None);
    }
}
