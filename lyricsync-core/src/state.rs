use crate::track::LyricTrack;
use std::sync::Arc;

/// Load state of one identifier in the cache
#[derive(Debug, Clone)]
pub enum TrackState {
    /// Nothing requested yet, or the entry was invalidated
    Unknown,
    /// A fetch is in flight
    Fetching,
    /// Lyrics are available
    Loaded(Arc<LyricTrack>),
    /// No lyrics exist, locally or remotely
    NotAvailable,
    /// The last fetch failed; kept until an explicit reload
    Error(String),
}

impl TrackState {
    /// Short name used in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Fetching => "fetching",
            Self::Loaded(_) => "loaded",
            Self::NotAvailable => "not_available",
            Self::Error(_) => "error",
        }
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        matches!(self, Self::Fetching)
    }

    /// Get the track if loaded
    #[must_use]
    pub const fn track(&self) -> Option<&Arc<LyricTrack>> {
        match self {
            Self::Loaded(track) => Some(track),
            _ => None,
        }
    }
}

/// A point-in-time copy of an identifier's state
#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    pub state: TrackState,
    /// Bumped on every invalidate, reload, unload or eviction
    pub generation: u64,
}

impl TrackSnapshot {
    #[must_use]
    pub const fn unknown(generation: u64) -> Self {
        Self {
            state: TrackState::Unknown,
            generation,
        }
    }

    #[must_use]
    pub const fn track(&self) -> Option<&Arc<LyricTrack>> {
        self.state.track()
    }
}

/// Events emitted by the track cache
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// An identifier moved to a new state
    StateChanged {
        identifier: String,
        snapshot: TrackSnapshot,
    },
    /// A fetch finished after its generation had moved on and was ignored
    StaleCompletionDiscarded {
        identifier: String,
        generation: u64,
    },
}
