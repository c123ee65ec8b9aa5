use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_booking::{config::Config, controllers, shutdown_requested, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting seat booking API ({})", config.app.environment);
    if config.features.enable_reset {
        info!("Reset endpoint is enabled");
    }

    // Flipped on Ctrl-C: stops the server and interrupts pending lock waits
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app_state = AppState::new(config.clone(), shutdown_rx.clone()).await?;
    let settings = app_state.coordinator.settings();
    info!(
        lock_wait_ms = settings.lock_wait.as_millis() as u64,
        lock_lease_ms = settings.lock_lease.as_millis() as u64,
        "Booking coordinator ready"
    );

    let app = Router::new()
        .route("/", get(|| async { "Seat Booking API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx))
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if let Err(e) = state.db.ping().await {
        error!("Health check: database unreachable: {}", e);
        return (StatusCode::SERVICE_UNAVAILABLE, "DATABASE DOWN");
    }
    if let Err(e) = state.redis.ping().await {
        error!("Health check: redis unreachable: {}", e);
        return (StatusCode::SERVICE_UNAVAILABLE, "REDIS DOWN");
    }
    (StatusCode::OK, "OK")
}
