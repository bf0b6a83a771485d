//! Router assembly and the serve loop.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use common::Config;
use scheduler::{register_jobs, CronScheduler};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::routes;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::tophub::router())
        .merge(routes::hotlist::router())
        .merge(routes::materials::router())
        .merge(routes::rewrite::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API until Ctrl+C or SIGTERM. With the scheduler enabled the
/// cron jobs run in this process too.
pub async fn run(config: Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);

    let mut jobs = if config.scheduler.enabled {
        let mut scheduler = CronScheduler::new().await?;
        register_jobs(
            &mut scheduler,
            &config.scheduler,
            state.crawler.clone(),
            state.processor.clone(),
        )
        .await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        info!("In-process scheduler disabled");
        None
    };

    let app = router(state);

    let listener = TcpListener::bind(config.server_addr).await?;
    info!("Server listening on {}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = jobs.as_mut() {
        scheduler.shutdown().await?;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting shutdown");
        }
    }
}
