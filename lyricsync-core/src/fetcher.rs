//! Background fetching of lyrics that are not available locally.

use crate::error::{CoreError, Result};
use crate::lrc::{LrcDocument, ParseOptions};
use crate::source::LyricsSink;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a fetch collaborator found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Raw lyric document text
    Found(String),
    /// The remote confirmed there are no lyrics
    NotFound,
}

/// Trait for remote lyric fetchers
#[async_trait]
pub trait LyricsFetcher: Send + Sync {
    /// Get the fetcher name
    fn name(&self) -> &'static str;

    /// Fetch the raw document for `identifier`
    async fn fetch(&self, identifier: &str) -> Result<FetchOutcome>;
}

/// Fetchers tried in order until one has the document
pub struct ProviderChain {
    providers: Vec<Box<dyn LyricsFetcher>>,
}

impl ProviderChain {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn LyricsFetcher>>) -> Self {
        Self { providers }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[async_trait]
impl LyricsFetcher for ProviderChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    /// First `Found` wins. Absence is only reported when every provider
    /// confirmed it; otherwise the last error is returned.
    async fn fetch(&self, identifier: &str) -> Result<FetchOutcome> {
        let mut last_error: Option<CoreError> = None;

        for provider in &self.providers {
            info!("Trying provider: {}", provider.name());
            match provider.fetch(identifier).await {
                Ok(FetchOutcome::Found(raw)) => {
                    info!("Provider {} found lyrics for {}", provider.name(), identifier);
                    return Ok(FetchOutcome::Found(raw));
                }
                Ok(FetchOutcome::NotFound) => {
                    info!("Provider {} returned no lyrics", provider.name());
                }
                Err(e) => {
                    warn!("Provider {} failed with error: {}", provider.name(), e);
                    last_error = Some(e);
                }
            }
        }

        last_error.map_or(Ok(FetchOutcome::NotFound), Err)
    }
}

/// Identifies one dispatched fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub identifier: String,
    /// Cache generation captured when the fetch was dispatched
    pub generation: u64,
}

/// A fetch result, already parsed
#[derive(Debug)]
pub enum FetchResolution {
    Document(LrcDocument),
    NotFound,
    Failed(String),
}

/// Delivered to the cache when a fetch finishes
#[derive(Debug)]
pub struct FetchCompletion {
    pub ticket: FetchTicket,
    pub resolution: FetchResolution,
}

/// Handle on one running fetch task
#[derive(Debug)]
pub struct FetchHandle {
    cancel: CancellationToken,
}

impl FetchHandle {
    /// Stop the fetch. Its completion is never delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Runs fetches on a tokio runtime and reports their completion
#[derive(Clone)]
pub struct FetchCoordinator {
    fetcher: Arc<dyn LyricsFetcher>,
    sink: Option<Arc<dyn LyricsSink>>,
    runtime: Handle,
    parse_options: ParseOptions,
}

impl FetchCoordinator {
    /// Create a coordinator that spawns onto `runtime`
    pub fn new(fetcher: Arc<dyn LyricsFetcher>, runtime: Handle) -> Self {
        Self {
            fetcher,
            sink: None,
            runtime,
            parse_options: ParseOptions::default(),
        }
    }

    /// Create a coordinator on the runtime of the calling thread
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn on_current_runtime(fetcher: Arc<dyn LyricsFetcher>) -> Result<Self> {
        Ok(Self::new(fetcher, Handle::try_current()?))
    }

    /// Store every usable fetched document in `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn LyricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub const fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// Start fetching `ticket.identifier` in the background.
    ///
    /// Returns immediately. `on_complete` runs on the runtime once the
    /// fetcher answers, unless the returned handle was cancelled first.
    pub fn dispatch<F>(&self, ticket: FetchTicket, on_complete: F) -> FetchHandle
    where
        F: FnOnce(FetchCompletion) + Send + 'static,
    {
        info!(
            "Dispatching lyrics fetch for {} (generation {}, fetcher: {})",
            ticket.identifier,
            ticket.generation,
            self.fetcher.name()
        );

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let sink = self.sink.clone();
        let options = self.parse_options;

        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("Fetch for {} cancelled", ticket.identifier);
                    return;
                }
                outcome = fetcher.fetch(&ticket.identifier) => outcome,
            };

            let resolution = resolve(&ticket.identifier, outcome, sink, options).await;
            on_complete(FetchCompletion { ticket, resolution });
        });

        FetchHandle { cancel }
    }
}

/// Parse a fetch outcome and hand usable documents to the sink
async fn resolve(
    identifier: &str,
    outcome: Result<FetchOutcome>,
    sink: Option<Arc<dyn LyricsSink>>,
    options: ParseOptions,
) -> FetchResolution {
    match outcome {
        Ok(FetchOutcome::Found(raw)) => {
            let document = LrcDocument::parse_with(&raw, options);
            if document.is_empty() {
                info!("Fetched lyrics for {} contain no timed lines", identifier);
                return FetchResolution::NotFound;
            }

            info!(
                "Fetched lyrics for {} ({} lines)",
                identifier,
                document.lines.len()
            );
            if let Some(sink) = sink {
                store(sink, identifier, raw).await;
            }
            FetchResolution::Document(document)
        }
        Ok(FetchOutcome::NotFound) => {
            info!("No lyrics found for {}", identifier);
            FetchResolution::NotFound
        }
        Err(e) => {
            warn!("Lyrics fetch for {} failed: {}", identifier, e);
            FetchResolution::Failed(e.to_string())
        }
    }
}

/// Write `raw` to `sink` on the blocking pool
async fn store(sink: Arc<dyn LyricsSink>, identifier: &str, raw: String) {
    let owned = identifier.to_string();
    match tokio::task::spawn_blocking(move || sink.write(&owned, &raw)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to store fetched lyrics for {}: {}", identifier, e),
        Err(e) => warn!("Store task for {} did not finish: {}", identifier, e),
    }
}
