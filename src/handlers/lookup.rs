use crate::error::ApiError;
use crate::query::QueryResponse;
use crate::state::AppState;
use axum::{extract::State, http::Uri};

/// Any method, any path - health, single-record fetch or the default reply
///
/// - `/health*`: `{"ok": true, "freshness_ts": <int|null>}`
/// - `/records/{id}`: the stored record, 400 on an empty id, 404 when absent
/// - anything else: `{"message": "ok"}`
pub async fn lookup_handler(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<QueryResponse, ApiError> {
    state.query.handle(uri.path()).await
}
