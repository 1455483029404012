pub mod config;
pub mod health;
pub mod queues;
pub mod sessions;
pub mod stats;
pub mod tasks;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(sessions::router())
        .merge(queues::router())
        .merge(tasks::router())
        .merge(config::router())
        .merge(stats::router())
}
