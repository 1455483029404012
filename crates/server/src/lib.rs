pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// Assembles the full HTTP surface (spec §6) over a ready [`AppState`].
/// Callers own the listener; this only wires routes and the ambient
/// CORS/tracing layers the way the rest of the stack logs and serves.
pub fn build_router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
