use axum::{
    http::{HeaderValue, Method},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blog_cms_gateway::{
    routes,
    services::{backend_client::BackendClient, image_store::ImageStore, temp_store::TempUploadStore},
    utils::config::{AppConfig, ServiceRole},
    AppState, StorageState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blog_cms_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::from_env();
    tracing::info!("Configuration loaded: {:?}", config);

    let app = match config.role {
        ServiceRole::Relay => build_relay(&config)?,
        ServiceRole::Storage => build_storage(&config)?,
    };

    // Add middleware layers
    let app = app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_seconds)))
            .layer(cors_layer(&config)),
    );

    // Parse the bind address
    let addr: SocketAddr = config.bind_address().parse()?;
    tracing::info!("{:?} server listening on {}", config.role, addr);

    // Create the server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn build_relay(config: &AppConfig) -> anyhow::Result<Router> {
    tracing::info!("Starting blog CMS relay for backend {}", config.backend_url);

    let temp_store = TempUploadStore::new(&config.temp_dir).map_err(|e| {
        tracing::error!("Failed to initialize temp storage: {}", e);
        e
    })?;
    let backend = BackendClient::new(config)?;

    // Sweep temp files orphaned by a previous crash
    let sweeper = temp_store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600)); // Run every hour
        loop {
            interval.tick().await;
            if let Err(e) = sweeper.sweep_stale().await {
                tracing::error!("Failed to sweep temporary uploads: {}", e);
            }
        }
    });

    Ok(routes::relay_router(AppState {
        config: Arc::new(config.clone()),
        backend: Arc::new(backend),
        temp_store: Arc::new(temp_store),
    }))
}

fn build_storage(config: &AppConfig) -> anyhow::Result<Router> {
    tracing::info!("Starting editor image storage in {}", config.uploads_dir);

    if config.admin_session_tokens.is_empty() {
        tracing::warn!("ADMIN_SESSION_TOKENS is empty; every upload will be refused");
    }

    let images = ImageStore::new(&config.uploads_dir)?;

    Ok(routes::storage_router(StorageState {
        config: Arc::new(config.clone()),
        images: Arc::new(images),
    }))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
