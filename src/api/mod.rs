//! REST API server module
//!
//! Exposes pull sessions over HTTP: start or attach, inspect, cancel and
//! dismiss pulls, plus a Server-Sent Events stream of pull events.

use crate::{Config, ModelPuller, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Pulls
/// - `GET /pulls` - List all tracked pulls
/// - `POST /pulls` - Start a pull (or attach to the one in flight)
/// - `GET /pulls/:model` - Get one pull
/// - `DELETE /pulls/:model` - Dismiss a finished pull
/// - `POST /pulls/:model/cancel` - Cancel an in-flight pull
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /events` - Server-sent events stream
pub fn create_router(puller: ModelPuller, config: Arc<Config>) -> Router {
    let state = AppState::new(puller, config.clone());

    let router = Router::new()
        // Pulls
        .route("/pulls", get(routes::list_pulls).post(routes::start_pull))
        .route(
            "/pulls/:model",
            get(routes::get_pull).delete(routes::dismiss_pull),
        )
        .route("/pulls/:model/cancel", post(routes::cancel_pull))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin; otherwise only the listed
/// origins are allowed. Methods and headers are unrestricted.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops or the puller shuts down.
///
/// # Example
///
/// ```no_run
/// use pull_progress::{Config, ModelPuller};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let puller = ModelPuller::new((*config).clone())?;
///
/// // Start API server (blocks until shutdown)
/// pull_progress::api::start_api_server(puller, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(puller: ModelPuller, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;
    tracing::info!(address = %bind_address, "Starting API server");

    let shutdown = puller.shutdown_token.clone();
    let app = create_router(puller, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;
    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
