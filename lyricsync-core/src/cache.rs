//! Per-identifier load state with single-flight fetching.
//!
//! Every identifier with a cached state owns a slot. Readers load the slot's
//! current snapshot without locking; transitions take the slot's mutex, which
//! never guards anything but that one identifier.
//!
//! A slot that falls back to `Unknown` is retired from the map. New slots
//! start at the highest generation ever retired, so an identifier's
//! generation never goes back.

use crate::config::CacheConfig;
use crate::fetcher::{FetchCompletion, FetchCoordinator, FetchHandle, FetchResolution, FetchTicket};
use crate::lrc::{LrcDocument, ParseOptions};
use crate::source::LyricsSource;
use crate::state::{CacheEvent, TrackSnapshot, TrackState};
use crate::track::LyricTrack;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct SlotControl {
    in_flight: Option<FetchHandle>,
    /// Removed from the map; callers must look the identifier up again
    retired: bool,
}

struct Slot {
    current: ArcSwap<TrackSnapshot>,
    control: Mutex<SlotControl>,
    last_used: AtomicU64,
}

impl Slot {
    fn new(generation: u64) -> Self {
        Self {
            current: ArcSwap::from_pointee(TrackSnapshot::unknown(generation)),
            control: Mutex::new(SlotControl::default()),
            last_used: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotControl> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot::clone(&self.current.load())
    }
}

/// Cache of parsed lyrics keyed by track identifier
pub struct TrackCache {
    slots: DashMap<String, Arc<Slot>>,
    coordinator: Option<FetchCoordinator>,
    config: CacheConfig,
    parse_options: ParseOptions,
    event_tx: broadcast::Sender<CacheEvent>,
    clock: AtomicU64,
    generation_floor: AtomicU64,
}

impl TrackCache {
    /// Create a cache that never fetches
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            slots: DashMap::new(),
            coordinator: None,
            config: config.clone(),
            parse_options: ParseOptions::default(),
            event_tx,
            clock: AtomicU64::new(0),
            generation_floor: AtomicU64::new(0),
        }
    }

    /// Fetch missing lyrics through `coordinator`
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: FetchCoordinator) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Options used when parsing local documents
    #[must_use]
    pub const fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// Subscribe to cache events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.event_tx.subscribe()
    }

    /// Number of identifiers with a cached state
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().current.load().state.is_loaded())
            .count()
    }

    /// Snapshot of the state of `identifier`. Never blocks.
    #[must_use]
    pub fn current_state(&self, identifier: &str) -> TrackSnapshot {
        let Some(slot) = self.existing_slot(identifier) else {
            return TrackSnapshot::unknown(self.generation_floor.load(Ordering::Acquire));
        };
        self.touch(&slot);
        slot.snapshot()
    }

    /// Load `identifier` from `source`, or start a fetch for it.
    ///
    /// Returns at once. A fetch that is already running is joined rather
    /// than repeated, and `NotAvailable` and `Error` stay put until a reload.
    pub fn get_or_load(
        self: &Arc<Self>,
        identifier: &str,
        source: &dyn LyricsSource,
        auto_fetch: bool,
    ) -> TrackSnapshot {
        loop {
            let slot = self.slot(identifier);
            self.touch(&slot);

            let mut control = slot.lock();
            if control.retired {
                continue;
            }
            let current = slot.snapshot();
            if !matches!(current.state, TrackState::Unknown) {
                debug!(
                    "Lyrics for {} already {} (generation {})",
                    identifier,
                    current.state.name(),
                    current.generation
                );
                return current;
            }

            let snapshot = self.start_load(identifier, &slot, &mut control, source, auto_fetch);
            drop(control);

            if snapshot.state.is_loaded() {
                self.enforce_capacity();
            }
            return snapshot;
        }
    }

    /// Apply a finished fetch.
    ///
    /// Returns `false` when the completion's generation is no longer
    /// current, in which case nothing changes.
    pub fn complete(&self, completion: FetchCompletion) -> bool {
        let FetchCompletion { ticket, resolution } = completion;

        let Some(slot) = self.existing_slot(&ticket.identifier) else {
            self.discard(&ticket);
            return false;
        };

        let loaded = {
            let mut control = slot.lock();
            let current = slot.current.load();
            if current.generation != ticket.generation || !current.state.is_fetching() {
                self.discard(&ticket);
                return false;
            }
            control.in_flight = None;

            let state = match resolution {
                FetchResolution::Document(document) => TrackState::Loaded(Arc::new(
                    LyricTrack::from_document(ticket.identifier.as_str(), document),
                )),
                FetchResolution::NotFound => TrackState::NotAvailable,
                FetchResolution::Failed(reason) => TrackState::Error(reason),
            };
            if state.is_loaded() {
                self.touch(&slot);
            }
            let snapshot = self.publish(&ticket.identifier, &slot, state, ticket.generation);
            snapshot.state.is_loaded()
        };

        if loaded {
            self.enforce_capacity();
        }
        true
    }

    /// Forget everything about `identifier` and bump its generation
    pub fn invalidate(&self, identifier: &str) -> TrackSnapshot {
        loop {
            let slot = self.slot(identifier);
            let mut control = slot.lock();
            if control.retired {
                continue;
            }
            let generation = slot.current.load().generation + 1;

            if let Some(handle) = control.in_flight.take() {
                if self.config.cancel_stale_fetches {
                    debug!("Cancelling in-flight fetch for {}", identifier);
                    handle.cancel();
                }
            }

            info!("Invalidated lyrics for {} (generation {})", identifier, generation);
            let snapshot = self.publish(identifier, &slot, TrackState::Unknown, generation);
            self.retire(identifier, &slot, &mut control);
            return snapshot;
        }
    }

    /// Invalidate and load again
    pub fn reload(
        self: &Arc<Self>,
        identifier: &str,
        source: &dyn LyricsSource,
        auto_fetch: bool,
    ) -> TrackSnapshot {
        self.invalidate(identifier);
        self.get_or_load(identifier, source, auto_fetch)
    }

    /// Drop the loaded track for `identifier`.
    ///
    /// Returns `false` if it was not loaded.
    pub fn unload(&self, identifier: &str) -> bool {
        let Some(slot) = self.existing_slot(identifier) else {
            return false;
        };
        let mut control = slot.lock();
        let current = slot.current.load();
        if control.retired || !current.state.is_loaded() {
            return false;
        }

        let generation = current.generation + 1;
        info!("Unloaded lyrics for {}", identifier);
        self.publish(identifier, &slot, TrackState::Unknown, generation);
        self.retire(identifier, &slot, &mut control);
        true
    }

    /// Resolves once `identifier` is no longer fetching
    pub async fn wait_settled(&self, identifier: &str) -> TrackSnapshot {
        let mut rx = self.subscribe();
        loop {
            let snapshot = self.current_state(identifier);
            if !snapshot.state.is_fetching() {
                return snapshot;
            }

            match rx.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return self.current_state(identifier);
                }
            }
        }
    }

    /// Move an `Unknown` slot to the state its load starts in
    fn start_load(
        self: &Arc<Self>,
        identifier: &str,
        slot: &Slot,
        control: &mut SlotControl,
        source: &dyn LyricsSource,
        auto_fetch: bool,
    ) -> TrackSnapshot {
        let generation = slot.current.load().generation;

        if let Some(track) = self.read_local(identifier, source) {
            info!("Loaded local lyrics for {} ({} lines)", identifier, track.len());
            self.publish(identifier, slot, TrackState::Loaded(Arc::new(track)), generation)
        } else if let Some(coordinator) = self.coordinator.as_ref().filter(|_| auto_fetch) {
            let snapshot = self.publish(identifier, slot, TrackState::Fetching, generation);
            let ticket = FetchTicket {
                identifier: identifier.to_string(),
                generation,
            };
            let cache: Weak<Self> = Arc::downgrade(self);
            control.in_flight = Some(coordinator.dispatch(ticket, move |completion| {
                if let Some(cache) = cache.upgrade() {
                    cache.complete(completion);
                }
            }));
            snapshot
        } else {
            info!("Lyrics not available for {}", identifier);
            self.publish(identifier, slot, TrackState::NotAvailable, generation)
        }
    }

    /// Parse the local document for `identifier`, if it has any lines
    fn read_local(&self, identifier: &str, source: &dyn LyricsSource) -> Option<LyricTrack> {
        let Some(raw) = source.read(identifier) else {
            debug!("No local lyrics for {}", identifier);
            return None;
        };

        let document = LrcDocument::parse_with(&raw, self.parse_options);
        if document.is_empty() {
            debug!("Local lyrics for {} contain no timed lines", identifier);
            return None;
        }
        Some(LyricTrack::from_document(identifier, document))
    }

    /// Reset least recently used tracks until no more than `max_tracks` are loaded
    fn enforce_capacity(&self) {
        let max_tracks = self.config.max_tracks;
        if max_tracks == 0 {
            return;
        }

        let mut loaded: Vec<(u64, String, Arc<Slot>)> = self
            .slots
            .iter()
            .filter(|entry| entry.value().current.load().state.is_loaded())
            .map(|entry| {
                let slot = entry.value();
                (
                    slot.last_used.load(Ordering::Relaxed),
                    entry.key().clone(),
                    Arc::clone(slot),
                )
            })
            .collect();

        let excess = loaded.len().saturating_sub(max_tracks);
        if excess == 0 {
            return;
        }
        loaded.sort_by_key(|(last_used, _, _)| *last_used);

        for (_, identifier, slot) in loaded.into_iter().take(excess) {
            let mut control = slot.lock();
            let current = slot.current.load();
            if !current.state.is_loaded() {
                continue;
            }
            let generation = current.generation + 1;
            info!("Evicting lyrics for {} (capacity {})", identifier, max_tracks);
            self.publish(&identifier, &slot, TrackState::Unknown, generation);
            self.retire(&identifier, &slot, &mut control);
        }
    }

    fn publish(
        &self,
        identifier: &str,
        slot: &Slot,
        state: TrackState,
        generation: u64,
    ) -> TrackSnapshot {
        let snapshot = TrackSnapshot { state, generation };
        debug!(
            "Lyrics state for {} -> {} (generation {})",
            identifier,
            snapshot.state.name(),
            generation
        );
        slot.current.store(Arc::new(snapshot.clone()));

        let _ = self.event_tx.send(CacheEvent::StateChanged {
            identifier: identifier.to_string(),
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    fn discard(&self, ticket: &FetchTicket) {
        debug!(
            "Discarding stale fetch for {} (generation {})",
            ticket.identifier, ticket.generation
        );
        let _ = self.event_tx.send(CacheEvent::StaleCompletionDiscarded {
            identifier: ticket.identifier.clone(),
            generation: ticket.generation,
        });
    }

    /// Drop an `Unknown` slot from the map, keeping its generation as the floor.
    ///
    /// Runs with the slot's lock held.
    fn retire(&self, identifier: &str, slot: &Arc<Slot>, control: &mut SlotControl) {
        let generation = slot.current.load().generation;
        self.generation_floor.fetch_max(generation, Ordering::AcqRel);
        control.retired = true;
        self.slots
            .remove_if(identifier, |_, existing| Arc::ptr_eq(existing, slot));
    }

    fn slot(&self, identifier: &str) -> Arc<Slot> {
        if let Some(slot) = self.existing_slot(identifier) {
            return slot;
        }
        Arc::clone(
            self.slots
                .entry(identifier.to_string())
                .or_insert_with(|| Arc::new(Slot::new(self.generation_floor.load(Ordering::Acquire))))
                .value(),
        )
    }

    fn existing_slot(&self, identifier: &str) -> Option<Arc<Slot>> {
        self.slots.get(identifier).map(|entry| Arc::clone(entry.value()))
    }

    fn touch(&self, slot: &Slot) {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        slot.last_used.store(tick, Ordering::Relaxed);
    }
}
