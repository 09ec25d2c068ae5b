use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ripline_core::credentials::refresh_if_missing;
use ripline_core::{
    load_config_or_default, validate_config, CommandEnricher, CommandLinkConverter,
    CommandTargetDiscovery, CookieExporter, CredentialRefresher, EventSink, LinkQueue,
    ManifestStore, Orchestrator, ProcessLauncher, StageSequencer,
};

use ripline_server::api::create_router;
use ripline_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("RIPLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let (config, from_file) = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if !from_file {
        warn!("No config file at {:?}, using defaults", config_path);
    }

    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully");
    info!("Data directory: {:?}", config.paths.data_dir);
    info!("Music directory: {:?}", config.paths.music_dir);

    let store = ManifestStore::new(&config.paths.data_dir);
    let cookies_path = config.paths.cookies_path();
    let events = EventSink::new(config.orchestrator.event_buffer);

    let refresher: Arc<dyn CredentialRefresher> =
        Arc::new(CookieExporter::new(&config.credentials, &cookies_path));

    let worker_path = resolve_worker_path(&config.tools.worker_path);
    info!("Acquisition worker: {}", worker_path.display());
    let mut launcher = ProcessLauncher::new(&worker_path, &cookies_path, Arc::clone(&refresher));
    if from_file {
        launcher = launcher.with_config_path(&config_path);
    }

    let mut sequencer = StageSequencer::new(
        config.stages.clone(),
        store.clone(),
        &config.paths.music_dir,
        Arc::new(CommandLinkConverter::new(config.tools.link_converter.clone())),
        Arc::new(CommandTargetDiscovery::new(
            config.tools.target_discovery.clone(),
        )),
        Arc::new(launcher),
        events.clone(),
    );
    match config.enrichment.api_key() {
        Some(key) if config.enrichment.is_active() => {
            info!("Metadata enrichment enabled");
            sequencer = sequencer.with_enricher(Arc::new(CommandEnricher::new(
                config.tools.enrichment.clone(),
                key,
            )));
        }
        _ => info!("Metadata enrichment disabled"),
    }

    let orchestrator = Arc::new(Orchestrator::new(
        config.orchestrator.clone(),
        Arc::new(LinkQueue::new()),
        Arc::new(sequencer),
        events,
    ));
    let info = orchestrator.concurrency_info();
    info!(
        "Concurrency {} (recommended {}, {} CPUs, {} GB)",
        info.effective, info.recommended, info.cpu_count, info.total_mem_gb
    );

    // Initial credential export runs in the background so startup is not held up.
    if config.credentials.refresh_on_startup {
        let refresher = Arc::clone(&refresher);
        let cookies_path = cookies_path.clone();
        tokio::spawn(async move {
            match refresh_if_missing(refresher.as_ref(), &cookies_path).await {
                Some(Ok(outcome)) => info!("Startup credential refresh: {}", outcome.as_str()),
                Some(Err(e)) => warn!("Startup credential refresh failed: {}", e),
                None => info!("Cookie jar present at {}", cookies_path.display()),
            }
        });
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&orchestrator),
        store,
        refresher,
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if orchestrator.is_running() {
        warn!("Shutting down with a batch in progress; its manifests stay on disk");
    }
    info!("Server stopped");
    Ok(())
}

/// A bare worker name resolves next to this executable when present there.
fn resolve_worker_path(configured: &Path) -> PathBuf {
    if configured.components().count() != 1 {
        return configured.to_path_buf();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(configured)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| configured.to_path_buf())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
