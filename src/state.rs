use crate::query::QueryService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
}
