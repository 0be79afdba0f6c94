//! FutureKonnect Console - operations dashboard server
//!
//! Serves the sign-in and password reset flow, the audit trail and tenant
//! usage API, and optionally the built dashboard frontend.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{http::HeaderValue, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use config::{BackendKind, LogFormat, LogTarget, LoggingConfig};
use futurekonnect_console::{
    api, config,
    db::{self, SqliteBackend},
    middleware::{rate_limit::spawn_rate_limit_cleanup, RateLimitState},
    services::{build_mailer, Backend, HasuraClient},
    AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("FutureKonnect Console {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Some(pos) = args.iter().position(|arg| arg == "--write-default-config") {
        let path = args
            .get(pos + 1)
            .map(PathBuf::from)
            .context("--write-default-config needs a file path")?;
        AppConfig::create_default_config(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard flushes file logs on drop and must live until exit
    let _log_guard = init_logging(&config.logging);

    info!("FutureKonnect Console starting up");

    let backend = build_backend(&config).await?;
    info!(backend = backend.name(), "Data backend ready");

    let mailer = build_mailer(&config.email, &config.app.name)
        .context("Failed to initialize email delivery")?;
    info!(provider = mailer.provider(), "Email delivery ready");

    let state = AppState::new(config.clone(), backend, mailer);
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    info!("Starting HTTP server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn build_backend(config: &AppConfig) -> Result<Arc<dyn Backend>> {
    match config.backend.kind {
        BackendKind::Hasura => {
            let hasura = config
                .backend
                .hasura
                .as_ref()
                .context("backend.hasura must be configured for the hasura backend")?;
            let client = HasuraClient::new(hasura).context("Failed to initialize Hasura client")?;
            Ok(Arc::new(client))
        }
        BackendKind::Sqlite => {
            ensure_data_directory(config)?;
            info!("Initializing database connection");
            let pool = db::init_pool(&config.database)
                .await
                .context("Failed to initialize database")?;
            Ok(Arc::new(SqliteBackend::new(pool)))
        }
    }
}

type BoxedLayer = Box<dyn tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync>;

/// One formatting layer writing to `writer`
fn fmt_layer<W>(format: &LogFormat, writer: W) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, Layer};

    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Initialize the logging/tracing infrastructure
fn init_logging(log_config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_config.level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if matches!(log_config.target, LogTarget::Console | LogTarget::Both) {
        layers.push(fmt_layer(&log_config.format, std::io::stdout));
    }
    if matches!(log_config.target, LogTarget::File | LogTarget::Both) {
        let (writer, file_guard) = create_file_writer(log_config);
        layers.push(fmt_layer(&log_config.format, writer));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    guard
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// Create the parent directory of a file-backed SQLite database
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    let path = config
        .database
        .url
        .strip_prefix("sqlite://")
        .or_else(|| config.database.url.strip_prefix("sqlite:"));

    if let Some(parent) = path
        .filter(|p| !p.starts_with(":memory:"))
        .and_then(|p| std::path::Path::new(p).parent())
    {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
            info!("Created data directory: {:?}", parent);
        }
    }
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(allowed))
    }
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState, config: &AppConfig) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let auth_rate_limit = if config.auth.rate_limit.enabled {
        let limiter = RateLimitState::new(&config.auth.rate_limit);
        spawn_rate_limit_cleanup(limiter.clone());
        Some(limiter)
    } else {
        info!("Rate limiting of auth endpoints is disabled");
        None
    };

    if config.auth.legacy_token_endpoints {
        info!("Legacy /api/send-reset and /api/verify-token endpoints enabled");
    }

    let api_router = api::router(state, auth_rate_limit);

    let router = match config.server.static_dir {
        Some(ref static_dir) if config.server.serve_frontend && static_dir.exists() => {
            info!("Serving frontend from {:?}", static_dir);
            let index_file = static_dir.join("index.html");
            if index_file.exists() {
                api_router.fallback_service(
                    ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file)),
                )
            } else {
                warn!("index.html not found in {:?}, SPA fallback disabled", static_dir);
                api_router.fallback_service(ServeDir::new(static_dir))
            }
        }
        Some(ref static_dir) if config.server.serve_frontend => {
            warn!("Static directory {:?} does not exist, frontend not served", static_dir);
            api_router
        }
        _ => {
            info!("Frontend not served");
            api_router
        }
    };

    router
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors_layer(&config.server.cors_origins))
}

fn print_help() {
    println!(
        r#"FutureKonnect Console {}

USAGE:
    futurekonnect-console [OPTIONS]

OPTIONS:
    -h, --help                      Print this help message
    -V, --version                   Print version information
    --write-default-config <PATH>   Write a default configuration file and exit

ENVIRONMENT:
    FUTUREKONNECT_CONFIG    Path to configuration file
    JWT_SECRET              Secret for session and reset tokens
    HASURA_GRAPHQL_URL      Hasura GraphQL endpoint
    HASURA_ADMIN_SECRET     Hasura admin secret
    APP_BASE_URL            Public URL used in reset links
    RUST_LOG                Log filter override

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by FUTUREKONNECT_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/futurekonnect/config.yaml
    5. <user config dir>/futurekonnect/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
