//! The consumer-facing entry point: load tracks, then query them by playback position.

use crate::cache::TrackCache;
use crate::config::{CacheConfig, LyricsyncConfig};
use crate::error::Result;
use crate::fetcher::{FetchCoordinator, LyricsFetcher};
use crate::index::WindowLine;
use crate::lrc::{LrcMetadata, LyricLine, ParseOptions};
use crate::source::{LrcDirectory, LyricsSink, LyricsSource, NoLocalLyrics};
use crate::state::{CacheEvent, TrackSnapshot};
use crate::track::LyricTrack;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// The line showing at a position
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentLine {
    pub index: usize,
    pub line: LyricLine,
}

/// Every line of a track in order. Clone it to start over.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    track: Option<Arc<LyricTrack>>,
    next: usize,
}

impl Iterator for Transcript {
    type Item = LyricLine;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.track.as_ref()?.lines().get(self.next)?.clone();
        self.next += 1;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .track
            .as_ref()
            .map_or(0, |track| track.len().saturating_sub(self.next));
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Transcript {}

/// Synchronized lyrics for many tracks
pub struct LyricsEngine {
    cache: Arc<TrackCache>,
    source: Arc<dyn LyricsSource>,
    context_lines: usize,
    auto_fetch: bool,
}

impl LyricsEngine {
    #[must_use]
    pub fn builder() -> LyricsEngineBuilder {
        LyricsEngineBuilder::default()
    }

    /// Build an engine reading and saving lyrics in the configured directory
    ///
    /// # Errors
    ///
    /// Returns an error if `fetcher` is given and no tokio runtime is running.
    pub fn from_config(
        config: &LyricsyncConfig,
        fetcher: Option<Arc<dyn LyricsFetcher>>,
    ) -> Result<Self> {
        let directory = Arc::new(LrcDirectory::new(config.lyrics.directory()));

        let mut builder = Self::builder()
            .with_cache_config(config.cache.clone())
            .with_parse_options(ParseOptions {
                apply_offset: config.lyrics.apply_offset,
            })
            .with_context_lines(config.lyrics.context_lines)
            .with_auto_fetch(config.lyrics.auto_fetch)
            .with_source(directory.clone())
            .with_sink(directory);
        if let Some(fetcher) = fetcher {
            builder = builder.with_fetcher(fetcher);
        }
        builder.build()
    }

    /// Load `identifier`, fetching it in the background if needed
    pub fn load(&self, identifier: &str, auto_fetch: bool) -> TrackSnapshot {
        self.cache
            .get_or_load(identifier, self.source.as_ref(), auto_fetch)
    }

    /// Drop what is known about `identifier` and load it again
    pub fn reload(&self, identifier: &str, auto_fetch: bool) -> TrackSnapshot {
        self.cache
            .reload(identifier, self.source.as_ref(), auto_fetch)
    }

    pub fn unload(&self, identifier: &str) -> bool {
        self.cache.unload(identifier)
    }

    pub fn invalidate(&self, identifier: &str) -> TrackSnapshot {
        self.cache.invalidate(identifier)
    }

    /// Current state of `identifier`. Safe to call on every playback tick.
    #[must_use]
    pub fn state(&self, identifier: &str) -> TrackSnapshot {
        self.cache.current_state(identifier)
    }

    /// The loaded track, if any
    #[must_use]
    pub fn track(&self, identifier: &str) -> Option<Arc<LyricTrack>> {
        self.state(identifier).track().cloned()
    }

    /// Line showing at `position_seconds`, `None` before the first line or when not loaded
    #[must_use]
    pub fn resolve_current(&self, identifier: &str, position_seconds: f64) -> Option<CurrentLine> {
        let track = self.track(identifier)?;
        let index = track.index().resolve_current(position_seconds)?;
        let line = track.index().get(index)?.clone();
        Some(CurrentLine { index, line })
    }

    /// Lines around the one showing at `position_seconds`
    #[must_use]
    pub fn context_window(
        &self,
        identifier: &str,
        position_seconds: f64,
        radius: usize,
    ) -> Vec<WindowLine> {
        self.track(identifier).map_or_else(Vec::new, |track| {
            let index = track.index();
            index.context_window(index.resolve_current(position_seconds), radius)
        })
    }

    /// Start time of the next line after `position_seconds`
    #[must_use]
    pub fn next_change_after(&self, identifier: &str, position_seconds: f64) -> Option<f64> {
        self.track(identifier)?
            .index()
            .next_change_after(position_seconds)
    }

    #[must_use]
    pub fn metadata(&self, identifier: &str) -> Option<LrcMetadata> {
        self.track(identifier).map(|track| track.metadata().clone())
    }

    /// Every line of `identifier`; empty when not loaded
    #[must_use]
    pub fn all_lines(&self, identifier: &str) -> Transcript {
        Transcript {
            track: self.track(identifier),
            next: 0,
        }
    }

    /// Resolves once `identifier` is no longer fetching
    pub async fn wait_settled(&self, identifier: &str) -> TrackSnapshot {
        self.cache.wait_settled(identifier).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }

    /// Lines shown on each side of the current line by default
    #[must_use]
    pub const fn context_lines(&self) -> usize {
        self.context_lines
    }

    /// Whether loads should fetch by default
    #[must_use]
    pub const fn auto_fetch(&self) -> bool {
        self.auto_fetch
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<TrackCache> {
        &self.cache
    }
}

/// Builder for [`LyricsEngine`]
pub struct LyricsEngineBuilder {
    cache_config: CacheConfig,
    parse_options: ParseOptions,
    source: Arc<dyn LyricsSource>,
    sink: Option<Arc<dyn LyricsSink>>,
    fetcher: Option<Arc<dyn LyricsFetcher>>,
    runtime: Option<Handle>,
    context_lines: usize,
    auto_fetch: bool,
}

impl Default for LyricsEngineBuilder {
    fn default() -> Self {
        Self {
            cache_config: CacheConfig::default(),
            parse_options: ParseOptions::default(),
            source: Arc::new(NoLocalLyrics),
            sink: None,
            fetcher: None,
            runtime: None,
            context_lines: 3,
            auto_fetch: true,
        }
    }
}

impl LyricsEngineBuilder {
    #[must_use]
    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    #[must_use]
    pub const fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// Where local documents are read from
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn LyricsSource>) -> Self {
        self.source = source;
        self
    }

    /// Where fetched documents are saved
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn LyricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn LyricsFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Runtime fetches are spawned on; defaults to the current one
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    #[must_use]
    pub const fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    #[must_use]
    pub const fn with_auto_fetch(mut self, auto_fetch: bool) -> Self {
        self.auto_fetch = auto_fetch;
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// Returns an error if a fetcher is set without a runtime and no tokio
    /// runtime is running.
    pub fn build(self) -> Result<LyricsEngine> {
        let mut cache =
            TrackCache::new(&self.cache_config).with_parse_options(self.parse_options);

        if let Some(fetcher) = self.fetcher {
            let runtime = match self.runtime {
                Some(runtime) => runtime,
                None => Handle::try_current()?,
            };
            let mut coordinator = FetchCoordinator::new(fetcher, runtime)
                .with_parse_options(self.parse_options);
            if let Some(sink) = self.sink {
                coordinator = coordinator.with_sink(sink);
            }
            cache = cache.with_coordinator(coordinator);
        }

        Ok(LyricsEngine {
            cache: Arc::new(cache),
            source: self.source,
            context_lines: self.context_lines,
            auto_fetch: self.auto_fetch,
        })
    }
}
