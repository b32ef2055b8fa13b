//! HTTP server configuration and request routing.
//!
//! Requests flow through the layers in this order:
//! 1. Request tracing (correlation id, `X-Request-Id`, request metrics)
//! 2. Timeout enforcement (408 after `REQUEST_TIMEOUT`)
//! 3. Global rate limit (every route but `/metrics`)
//! 4. Route rate limit (`/api`, `/create_assistant`)
//! 5. Handler, which runs the relay stages
//!
//! # Graceful Shutdown
//!
//! On SIGINT or SIGTERM the listener stops accepting connections and
//! in-flight requests get `SHUTDOWN_TIMEOUT` to finish.

use std::io;
use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::config::Config;
use crate::handlers;
use crate::middleware::{RateLimitLayer, RequestTracingLayer};
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::state::AppState;

/// Creates the router with every route and layer.
pub fn create_router(state: AppState) -> Router {
    let mut relay_routes = Router::new()
        .route("/api", post(handlers::relay))
        .route("/create_assistant", post(handlers::create_assistant));
    if let Some(limiter) = &state.route_limiter {
        relay_routes = relay_routes.layer(RateLimitLayer::new(limiter.clone(), state.metrics.clone()));
    }

    let mut limited_routes = Router::new()
        .merge(relay_routes)
        .route("/health", get(handlers::health));
    if let Some(limiter) = &state.global_limiter {
        limited_routes =
            limited_routes.layer(RateLimitLayer::new(limiter.clone(), state.metrics.clone()));
    }

    Router::new()
        .merge(limited_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.request_timeout,
        ))
        .layer(RequestTracingLayer::new(state.metrics.clone()))
        .with_state(state)
}

/// Serves `router` on `listener` until `shutdown` fires, then drains.
///
/// Peer addresses are exposed to the rate limiter as `ConnectInfo`.
pub async fn serve(listener: TcpListener, router: Router, shutdown: ShutdownSignal) -> io::Result<()> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.recv())
    .await
}

/// Builds the application from `config` and serves it until a shutdown
/// signal arrives.
///
/// # Errors
///
/// Fails if the application cannot be wired (bad key material, unreachable
/// Redis) or the listener cannot bind.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let router = create_router(state);

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    let mut coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();
    coordinator.spawn("http-server", async move {
        if let Err(e) = serve(listener, router, signal).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    coordinator.wait().await;
    coordinator.shutdown(config.shutdown_timeout()).await;

    info!("HTTP server stopped");
    Ok(())
}
