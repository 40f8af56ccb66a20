use crate::state::EngagementReader;
use axum::Router;
use axum::routing::get;

pub mod handlers;
pub mod responses;

/// Read-only HTTP surface; handlers only ever see an [`EngagementReader`].
pub fn router(reader: EngagementReader) -> Router {
    Router::new()
        .route("/api/engagement", get(handlers::get_engagement))
        .route("/api/session", get(handlers::get_session))
        .route("/api/health", get(handlers::get_health))
        .with_state(reader)
}
