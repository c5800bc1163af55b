pub mod config;

pub use config::{LrclibConfig, CONFIG_TEMPLATE, PROVIDER_NAME};

use async_trait::async_trait;
use lyricsync_core::{lyrics_stem, CoreError, FetchOutcome, LyricsFetcher};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lyricsync::lrclib";

const USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/lyricsync/lyricsync)"
);

const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Artist and title split out of a track identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsQuery {
    pub artist_name: Option<String>,
    pub track_name: String,
}

impl LyricsQuery {
    /// Read `"Artist - Title"`, with or without an audio extension.
    ///
    /// Anything without the separator is taken as a bare title.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Self {
        let name = lyrics_stem(identifier);
        match name.split_once(" - ") {
            Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
                Self {
                    artist_name: Some(artist.trim().to_string()),
                    track_name: title.trim().to_string(),
                }
            }
            _ => Self {
                artist_name: None,
                track_name: name.trim().to_string(),
            },
        }
    }
}

/// Response from LRCLIB API
/// Note: API returns additional fields (trackName, albumName) that we don't use;
/// serde ignores unknown fields by default.
#[derive(Debug, Deserialize)]
struct LrclibResponse {
    id: i64,
    #[serde(rename = "artistName")]
    artist_name: String,
    #[serde(default)]
    instrumental: bool,
    #[serde(rename = "plainLyrics")]
    plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
}

impl LrclibResponse {
    fn has_synced(&self) -> bool {
        !self.instrumental
            && self
                .synced_lyrics
                .as_deref()
                .is_some_and(|synced| !synced.trim().is_empty())
    }
}

/// LRCLIB.net lyrics fetcher
pub struct LrclibFetcher {
    client: ClientWithMiddleware,
    base_url: String,
}

impl LrclibFetcher {
    /// Create a fetcher using the timeout and retry policy in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &LrclibConfig) -> Result<Self, CoreError> {
        config.validate()?;

        // Base client with timeout
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        // Wrap with retry middleware (exponential backoff)
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the exact-match endpoint; needs an artist
    fn get_url(&self, query: &LyricsQuery) -> Option<String> {
        let artist = query.artist_name.as_ref()?;
        Some(format!(
            "{}/get?artist_name={}&track_name={}",
            self.base_url,
            urlencoding::encode(artist),
            urlencoding::encode(&query.track_name)
        ))
    }

    fn search_url(&self, query: &LyricsQuery) -> String {
        let mut url = format!(
            "{}/search?track_name={}",
            self.base_url,
            urlencoding::encode(&query.track_name)
        );
        if let Some(ref artist) = query.artist_name {
            let _ = write!(url, "&artist_name={}", urlencoding::encode(artist));
        }
        url
    }

    async fn search(&self, query: &LyricsQuery) -> Result<FetchOutcome, CoreError> {
        let url = self.search_url(query);
        info!(target: LOG_TARGET, "LRCLIB GET (search): {}", url);

        let response = self.client.get(&url).send().await?;
        debug!(target: LOG_TARGET, "LRCLIB response status: {}", response.status());

        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "LRCLIB search returned status: {}", response.status());
            return Err(CoreError::LyricsProviderFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("LRCLIB search returned status: {}", response.status()),
            });
        }

        let results: Vec<LrclibResponse> = response.json().await?;
        match best_match(results, query) {
            Some(result) => {
                info!(
                    target: LOG_TARGET,
                    "LRCLIB found match via search (id: {}, artist: {})",
                    result.id, result.artist_name
                );
                Ok(parse_response(result))
            }
            None => {
                info!(target: LOG_TARGET, "LRCLIB search found no synced lyrics");
                Ok(FetchOutcome::NotFound)
            }
        }
    }
}

#[async_trait]
impl LyricsFetcher for LrclibFetcher {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch(&self, identifier: &str) -> Result<FetchOutcome, CoreError> {
        let query = LyricsQuery::from_identifier(identifier);
        info!(
            target: LOG_TARGET,
            "Fetching lyrics from LRCLIB for: {:?} - {}",
            query.artist_name, query.track_name
        );

        if query.track_name.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }

        // Try the /get endpoint first for an exact artist + track match
        let Some(url) = self.get_url(&query) else {
            return self.search(&query).await;
        };
        info!(target: LOG_TARGET, "LRCLIB GET (exact match): {}", url);

        let response = self.client.get(&url).send().await?;
        debug!(target: LOG_TARGET, "LRCLIB response status: {}", response.status());

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            info!(target: LOG_TARGET, "LRCLIB exact match not found, trying search");
            return self.search(&query).await;
        }

        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "LRCLIB returned status: {}", response.status());
            return Err(CoreError::LyricsProviderFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("LRCLIB returned status: {}", response.status()),
            });
        }

        let result: LrclibResponse = response.json().await?;
        info!(target: LOG_TARGET, "LRCLIB found match with id: {}", result.id);

        match parse_response(result) {
            FetchOutcome::NotFound => self.search(&query).await,
            found @ FetchOutcome::Found(_) => Ok(found),
        }
    }
}

/// Lower is better; a result by the queried artist scores 0
fn match_score(result: &LrclibResponse, query: &LyricsQuery) -> u32 {
    query.artist_name.as_ref().map_or(0, |artist| {
        if result.artist_name.eq_ignore_ascii_case(artist) {
            0
        } else {
            10
        }
    })
}

/// Best synced result, preferring the queried artist

fn best_match(results: Vec<LrclibResponse>, query: &LyricsQuery) -> Option<LrclibResponse> {
    results
        .into_iter()
        .filter(LrclibResponse::has_synced)
        .min_by_key(|result| match_score(result, query))
}

fn parse_response(result: LrclibResponse) -> FetchOutcome {
    if result.instrumental {
        debug!(target: LOG_TARGET, "Track is instrumental (lrclib id: {})", result.id);
        return FetchOutcome::NotFound;
    }

    match result.synced_lyrics {
        Some(synced) if !synced.trim().is_empty() => {
            debug!(target: LOG_TARGET, "Got synced lyrics (lrclib id: {})", result.id);
            FetchOutcome::Found(synced)
        }
        _ => {
            if result.plain_lyrics.is_some() {
                debug!(
                    target: LOG_TARGET,
                    "Only plain lyrics available, ignoring (lrclib id: {})", result.id
                );
            }
            FetchOutcome::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> LrclibResponse {
        serde_json::from_str(json).unwrap()
    }

    const SYNCED: &str = r#"{
        "id": 3396226,
        "trackName": "I Want to Live",
        "artistName": "Borislav Slavov",
        "albumName": "Baldur's Gate 3 (Original Game Soundtrack)",
        "duration": 233,
        "instrumental": false,
        "plainLyrics": "I feel your breath upon my neck",
        "syncedLyrics": "[00:17.12] I feel your breath upon my neck\n[00:20.41] A soft caress"
    }"#;

    const PLAIN_ONLY: &str = r#"{
        "id": 12,
        "artistName": "Someone",
        "instrumental": false,
        "plainLyrics": "words without timing",
        "syncedLyrics": null
    }"#;

    const INSTRUMENTAL: &str = r#"{
        "id": 99,
        "artistName": "Someone",
        "instrumental": true,
        "plainLyrics": null,
        "syncedLyrics": null
    }"#;

    fn fetcher() -> LrclibFetcher {
        LrclibFetcher::new(&LrclibConfig {
            base_url: "http://localhost:9999/api/".into(),
            ..LrclibConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_query_from_identifier() {
        assert_eq!(
            LyricsQuery::from_identifier("Borislav Slavov - I Want to Live.mp3"),
            LyricsQuery {
                artist_name: Some("Borislav Slavov".into()),
                track_name: "I Want to Live".into(),
            }
        );
        assert_eq!(
            LyricsQuery::from_identifier("Just A Title"),
            LyricsQuery {
                artist_name: None,
                track_name: "Just A Title".into(),
            }
        );
        // Only the first separator splits
        assert_eq!(
            LyricsQuery::from_identifier("A - B - C").track_name,
            "B - C"
        );
        assert_eq!(
            LyricsQuery::from_identifier(" - Title").artist_name,
            None
        );
    }

    #[test]
    fn test_parse_synced_response() {
        let outcome = parse_response(response(SYNCED));
        let FetchOutcome::Found(raw) = outcome else {
            panic!("expected synced lyrics");
        };
        assert!(raw.starts_with("[00:17.12]"));
    }

    #[test]
    fn test_plain_only_and_instrumental_are_not_found() {
        assert_eq!(parse_response(response(PLAIN_ONLY)), FetchOutcome::NotFound);
        assert_eq!(parse_response(response(INSTRUMENTAL)), FetchOutcome::NotFound);
    }

    #[test]
    fn test_best_match_prefers_synced_and_artist() {
        let query = LyricsQuery::from_identifier("Borislav Slavov - I Want to Live");
        let other_artist = SYNCED
            .replace("3396226", "1")
            .replace("Borislav Slavov", "Cover Band");
        let results = vec![
            response(PLAIN_ONLY),
            response(&other_artist),
            response(SYNCED),
            response(INSTRUMENTAL),
        ];

        let best = best_match(results, &query).unwrap();
        assert_eq!(best.id, 3_396_226);

        assert!(best_match(vec![response(PLAIN_ONLY), response(INSTRUMENTAL)], &query).is_none());
    }

    #[test]
    fn test_urls() {
        let fetcher = fetcher();
        let query = LyricsQuery::from_identifier("Café Tacvba - Eres");
        assert_eq!(
            fetcher.get_url(&query).as_deref(),
            Some("http://localhost:9999/api/get?artist_name=Caf%C3%A9%20Tacvba&track_name=Eres")
        );
        assert_eq!(
            fetcher.search_url(&query),
            "http://localhost:9999/api/search?track_name=Eres&artist_name=Caf%C3%A9%20Tacvba"
        );

        let title_only = LyricsQuery::from_identifier("Eres");
        assert_eq!(fetcher.get_url(&title_only), None);
        assert_eq!(
            fetcher.search_url(&title_only),
            "http://localhost:9999/api/search?track_name=Eres"
        );
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = LrclibFetcher::new(&LrclibConfig {
            base_url: "ftp://example".into(),
            ..LrclibConfig::default()
        });
        assert!(matches!(result, Err(CoreError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_name() {
        assert_eq!(fetcher().name(), "lrclib");
    }
}
