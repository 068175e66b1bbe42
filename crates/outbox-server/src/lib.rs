//! Outbox worker.
//!
//! Runs the event extraction pump and the message pump against CouchDB and
//! exposes a health endpoint reporting their liveness.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod worker;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the HTTP router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
