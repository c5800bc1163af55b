pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod index;
pub mod lrc;
pub mod paths;
pub mod source;
pub mod state;
pub mod time;
pub mod track;

pub use cache::TrackCache;
pub use config::{
    build_config_template, CacheConfig, LoggingConfig, LyricsConfig, LyricsyncConfig,
    ProvidersConfig,
};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use engine::{CurrentLine, LyricsEngine, LyricsEngineBuilder, Transcript};
pub use error::{CoreError, Result};
pub use fetcher::{
    FetchCompletion, FetchCoordinator, FetchHandle, FetchOutcome, FetchResolution, FetchTicket,
    LyricsFetcher, ProviderChain,
};
pub use index::{TimeIndex, WindowLine};
pub use lrc::{LrcDocument, LrcMetadata, LyricLine, ParseOptions, ParseWarning};
pub use paths::{
    config_dir, config_path, log_file_path, lyrics_dir, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    LOG_FILE_NAME, LYRICS_DIR_NAME,
};
pub use source::{lyrics_stem, LrcDirectory, LyricsSink, LyricsSource, MemoryLyrics, NoLocalLyrics};
pub use state::{CacheEvent, TrackSnapshot, TrackState};
pub use time::{format_timestamp, format_timestamp_short, seconds_to_duration};
pub use track::LyricTrack;
