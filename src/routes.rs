use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::lookup_handler;
use crate::state::AppState;

// Route prefixes, matched in this order

pub const HEALTH_PREFIX: &str = "/health";
pub const RECORDS_PREFIX: &str = "/records/";

/// Build the HTTP router.
///
/// Every path and method lands on the lookup handler, which applies the
/// prefix routing itself.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(lookup_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
