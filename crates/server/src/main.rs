use std::future::IntoFuture;

use anyhow::{self, Error as AnyhowError};
use db::DbErr;
use deployment::{Deployment, DeploymentError};
use server::{DeploymentImpl, http};
use strip_ansi_escapes::strip;
use thiserror::Error;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::assets::asset_dir;

const GRACEFUL_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum FocusboardError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), FocusboardError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},deployment={level},local_deployment={level},utils={level},tower_http={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)
        .map_err(|e| anyhow::anyhow!("Failed to create tracing filter: {e}"))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    if !asset_dir().exists() {
        std::fs::create_dir_all(asset_dir())?;
    }

    let deployment = DeploymentImpl::new().await?;
    let app_router = http::router(deployment.clone());

    let port = std::env::var("BACKEND_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|s| {
            // values piped through some process managers carry colour codes
            let cleaned = String::from_utf8(strip(s.as_bytes())).ok()?;
            cleaned.trim().parse::<u16>().ok()
        })
        .unwrap_or_else(|| {
            tracing::info!("No PORT environment variable set, using {DEFAULT_PORT}");
            DEFAULT_PORT
        });

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();

    tracing::info!("Focusboard running on http://{host}:{actual_port}");

    let shutdown = listen_for_shutdown();

    let server = axum::serve(listener, app_router.into_make_service())
        .with_graceful_shutdown(raised(shutdown.graceful.clone()))
        .into_future();
    tokio::pin!(server);

    let serve_result = tokio::select! {
        res = &mut server => res,
        _ = raised(shutdown.forced.clone()) => {
            tracing::warn!("Second shutdown signal received, exiting without draining");
            std::process::exit(130);
        }
        _ = drain_deadline(shutdown.graceful.clone(), GRACEFUL_SHUTDOWN_TIMEOUT) => {
            tracing::warn!(
                timeout = ?GRACEFUL_SHUTDOWN_TIMEOUT,
                "Open requests did not drain in time, exiting"
            );
            std::process::exit(130);
        }
    };

    serve_result?;

    deployment.db().pool.clone().close().await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Flags flipped by the first (drain) and second (exit now) interrupt.
struct ShutdownFlags {
    graceful: watch::Receiver<bool>,
    forced: watch::Receiver<bool>,
}

fn listen_for_shutdown() -> ShutdownFlags {
    let (graceful_tx, graceful) = watch::channel(false);
    let (forced_tx, forced) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(err) = next_signal().await {
            tracing::error!("Failed to install shutdown signal handler: {err}");
            return;
        }
        tracing::info!("Shutting down, press Ctrl+C again to exit immediately");
        graceful_tx.send_replace(true);

        if next_signal().await.is_ok() {
            forced_tx.send_replace(true);
        }
    });

    ShutdownFlags { graceful, forced }
}

/// Resolves on the next Ctrl+C, or SIGTERM on unix.
async fn next_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res,
            _ = sigterm.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Resolves once `flag` is true. Never resolves if the sender goes away first.
async fn raised(mut flag: watch::Receiver<bool>) {
    if flag.wait_for(|raised| *raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn drain_deadline(graceful: watch::Receiver<bool>, timeout: std::time::Duration) {
    raised(graceful).await;
    tokio::time::sleep(timeout).await;
}
