mod events;
mod relay_auth;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness))
        .route("/events", post(events::ingest))
}

/// Keep-alive probe for the hosting platform.
async fn liveness() -> &'static str {
    "✅ Ticket bot is running!"
}
