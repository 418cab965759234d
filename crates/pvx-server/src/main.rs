//! # pvx-server: HTTP Service for Plan Fragment Translation
//!
//! Exposes the fragment translator over HTTP so a coordinator (or a test harness)
//! can see the physical plan a worker would run for a given fragment.
//!
//! ```text
//! coordinator
//!   | POST /translate (fragment JSON + task id)
//!   v
//! pvx-server -> PlanConverter::to_physical_fragment()
//!   |
//!   | physical fragment JSON
//!   v
//! caller
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health`           - Health check
//! - `GET  /node-kinds`       - Plan node kinds this worker can deserialize
//! - `POST /translate`        - Translate a fragment for interactive execution
//! - `POST /translate/batch`  - Translate a fragment for batch (shuffle) execution
//! - `POST /filter`           - Translate one column domain into a scan filter
//!
//! ## Configuration
//!
//! - `PVX_LISTEN_ADDR`: listen address, `0.0.0.0:3000` by default.
//! - `PVX_SHUFFLE_NAME`: shuffle implementation name. `/translate/batch` is only
//!   served when this is set.
//! - `RUST_LOG`: log filter, `pvx=debug` by default.

mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pvx=debug".parse()?))
        .init();

    let config = state::ServerConfig::from_env();
    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(state::AppState::new(config));

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/node-kinds", get(routes::node_kinds))
        .route("/translate", post(routes::translate))
        .route("/translate/batch", post(routes::translate_batch))
        .route("/filter", post(routes::domain_filter))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!("pvx-server listening on http://{}", listen_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
