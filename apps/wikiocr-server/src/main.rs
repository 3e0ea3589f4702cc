//! WikiOCR Server
//!
//! HTTP front end for PDF text recognition.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wikiocr_server::config::Config;
use wikiocr_server::ocr::TextRecognizer;
use wikiocr_server::routes;
use wikiocr_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wikiocr_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting WikiOCR Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Raster backend: {:?}", config.tools.raster_backend);
    tracing::info!(
        "OCR defaults: lang={} dpi={} psm={}",
        config.ocr.language,
        config.ocr.dpi,
        config.ocr.psm
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let app_state = AppState::new(config).context("Failed to initialize application state")?;

    let recognizer = app_state.processor().recognizer();
    if recognizer.is_available().await {
        tracing::info!("OCR provider {:?} ready", recognizer.provider_type());
    }

    let app = routes::build_router(app_state);

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!("WikiOCR Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
