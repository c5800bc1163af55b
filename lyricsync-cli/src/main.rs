mod render;

use clap::Parser;
use lyricsync_core::{
    seconds_to_duration, CoreError, LyricsEngine, LyricsFetcher, LyricsyncConfig, ProviderChain,
    TrackState,
};
use lyricsync_lyrics_lrclib::{
    LrclibConfig, LrclibFetcher, CONFIG_TEMPLATE as LRCLIB_CONFIG_TEMPLATE,
    PROVIDER_NAME as LRCLIB_PROVIDER_NAME,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Print time-synchronized lyrics for a track
#[derive(Debug, Parser)]
#[command(name = "lyricsync", version, about)]
struct Args {
    /// Track identifier, e.g. "Artist - Title.mp3"
    identifier: String,

    /// Config file to use instead of ~/.config/lyricsync/config.toml
    #[arg(long, env = "LYRICSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Playback position in seconds
    #[arg(long, default_value_t = 0.0)]
    position: f64,

    /// Lines shown above and below the current line
    #[arg(long)]
    radius: Option<usize>,

    /// Only use local lyrics files
    #[arg(long)]
    no_fetch: bool,

    /// Forget the cached copy and load again
    #[arg(long)]
    reload: bool,

    /// Keep printing each new line as a simulated clock advances
    #[arg(long)]
    follow: bool,

    /// Print every line with its timestamp
    #[arg(long)]
    transcript: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(LyricsyncConfig::config_path);

    // Check config for logging.enabled before full config load
    init_tracing(check_file_logging_enabled(&config_path));

    // Load config or create template on first run
    let provider_templates: &[&str] = &[LRCLIB_CONFIG_TEMPLATE];
    let config = match LyricsyncConfig::load_or_create_at(&config_path, provider_templates) {
        Ok(config) => config,
        Err(e @ CoreError::ConfigNotFound { .. }) => {
            println!("{e}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    match runtime.block_on(run(&args, &config, &cancel_token)) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    args: &Args,
    config: &LyricsyncConfig,
    cancel_token: &CancellationToken,
) -> Result<ExitCode, CoreError> {
    let engine = LyricsEngine::from_config(config, create_fetcher(config))?;
    let identifier = args.identifier.as_str();
    let auto_fetch = engine.auto_fetch() && !args.no_fetch;

    let mut snapshot = if args.reload {
        engine.reload(identifier, auto_fetch)
    } else {
        engine.load(identifier, auto_fetch)
    };

    if snapshot.state.is_fetching() {
        println!("Fetching lyrics for {identifier}...");
        snapshot = tokio::select! {
            snapshot = engine.wait_settled(identifier) => snapshot,
            () = cancel_token.cancelled() => return Ok(ExitCode::SUCCESS),
        };
    }

    match &snapshot.state {
        TrackState::Loaded(_) => {}
        TrackState::Error(reason) => {
            eprintln!("Failed to fetch lyrics for {identifier}: {reason}");
            return Ok(ExitCode::FAILURE);
        }
        TrackState::NotAvailable | TrackState::Unknown | TrackState::Fetching => {
            println!("No lyrics available for {identifier}");
            return Ok(ExitCode::SUCCESS);
        }
    }

    if let Some(metadata) = engine.metadata(identifier) {
        for line in render::metadata_lines(&metadata) {
            println!("{line}");
        }
        if !metadata.is_empty() {
            println!();
        }
    }

    if args.transcript {
        for line in engine.all_lines(identifier) {
            println!("{}", render::transcript_line(&line));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let radius = args.radius.unwrap_or_else(|| engine.context_lines());
    for line in render::window_lines(&engine.context_window(identifier, args.position, radius)) {
        println!("{line}");
    }

    if args.follow {
        follow(&engine, identifier, args.position, cancel_token).await;
    }

    Ok(ExitCode::SUCCESS)
}

/// Print each line as its time comes, starting at `position`
async fn follow(
    engine: &LyricsEngine,
    identifier: &str,
    mut position: f64,
    cancel_token: &CancellationToken,
) {
    println!();
    while let Some(next) = engine.next_change_after(identifier, position) {
        let wait = seconds_to_duration(next - position);
        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            () = cancel_token.cancelled() => return,
        }
        position = next;

        if let Some(current) = engine.resolve_current(identifier, position) {
            println!("{}", render::transcript_line(&current.line));
        }
    }
}

fn create_fetcher(config: &LyricsyncConfig) -> Option<Arc<dyn LyricsFetcher>> {
    let mut providers: Vec<Box<dyn LyricsFetcher>> = config
        .providers
        .order
        .iter()
        .filter_map(|name| -> Option<Box<dyn LyricsFetcher>> {
            if name != LRCLIB_PROVIDER_NAME {
                warn!("Skipping unknown lyrics provider: {}", name);
                return None;
            }

            let lrclib_config = match LrclibConfig::from_providers(&config.providers) {
                Ok(cfg) => cfg.unwrap_or_default(),
                Err(e) => {
                    error!("Failed to parse LRCLIB config: {}", e);
                    return None;
                }
            };

            info!("Initializing LRCLIB provider");
            match LrclibFetcher::new(&lrclib_config) {
                Ok(fetcher) => Some(Box::new(fetcher)),
                Err(e) => {
                    error!("Failed to create LRCLIB provider: {}", e);
                    None
                }
            }
        })
        .collect();

    let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
    info!(
        "Initialized {} lyrics provider(s): {:?}",
        providers.len(),
        names
    );

    match providers.len() {
        0 => None,
        1 => providers.pop().map(Arc::from),
        _ => Some(Arc::new(ProviderChain::new(providers))),
    }
}

fn check_file_logging_enabled(config_path: &Path) -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest_retry=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = lyricsync_core::paths::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
