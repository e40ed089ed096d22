use cueplay_core::{ClockEngine, Config, CoreError, Library, PlaybackSession, TomlParseError};
use cueplay_server::{create_router, AppState};
use std::fs::File;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Check config for logging.enabled before full config load
    init_tracing(check_file_logging_enabled());

    let config = match Config::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            eprintln!(
                "Created config template at {}. Set library.music_dir and restart.",
                path.display()
            );
            std::process::exit(0);
        }
        Err(CoreError::ConfigParseError(parse_error)) => {
            report_config_parse_error(&parse_error);
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            eprintln!("Config file: {}", Config::config_path().display());
            std::process::exit(1);
        }
    };

    let library = match Library::new(&config.library) {
        Ok(library) => Arc::new(library),
        Err(e) => {
            error!("Failed to open music library: {e}");
            std::process::exit(1);
        }
    };
    let session =
        PlaybackSession::with_media_root(ClockEngine::new(), &config.playback, library.root());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Set up Ctrl+C handler to trigger graceful shutdown
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    info!(
        "Serving {} on http://{}",
        library.root().display(),
        addr
    );

    let router = create_router(AppState {
        session: Arc::clone(&session),
        library,
    });
    let shutdown = cancel_token.clone();
    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        error!("Server error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = session.stop().await {
        error!("Failed to stop playback on shutdown: {e}");
    }
    info!("Shutdown complete");
}

/// Point at the offending spot in a config file with TOML syntax errors
fn report_config_parse_error(parse_error: &TomlParseError) {
    let path = Config::config_path();
    error!("Failed to parse {}: {}", path.display(), parse_error.message());

    let location = std::fs::read_to_string(&path)
        .ok()
        .zip(parse_error.span())
        .and_then(|(content, span)| {
            content
                .get(..span.start)
                .map(|before| before.matches('\n').count() + 1)
        });
    match location {
        Some(line) => eprintln!("{}:{line}: {}", path.display(), parse_error.message()),
        None => eprintln!("{}: {}", path.display(), parse_error.message()),
    }
}

/// Read only `logging.enabled` so tracing is up before the full config loads
fn check_file_logging_enabled() -> bool {
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

    let Ok(content) = std::fs::read_to_string(Config::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,symphonia=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer();

    if file_logging_enabled {
        let log_path = cueplay_core::paths::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(Arc::new(file))
                            .with_ansi(false),
                    )
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
