use anyhow::Result;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{ApiError, ErrorResponse};
use crate::models::{HealthResponse, META_RECORD_ID, MessageResponse};
use crate::routes;
use crate::store::SharedStore;

/// Inbound request descriptor. `rawPath` wins over `path` when both are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub raw_path: Option<String>,
    pub path: Option<String>,
}

impl QueryRequest {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            raw_path: Some(path.into()),
            path: None,
        }
    }

    /// The path to route on; empty fields fall through, ending at `/`
    pub fn resolved_path(&self) -> &str {
        [self.raw_path.as_deref(), self.path.as_deref()]
            .into_iter()
            .flatten()
            .find(|p| !p.is_empty())
            .unwrap_or("/")
    }
}

/// Route selected for a path, first match wins
#[derive(Debug, PartialEq, Eq)]
pub enum Route<'a> {
    Health,
    /// Text after the last `/records/`, possibly empty
    Record(&'a str),
    Default,
}

impl<'a> Route<'a> {
    pub fn resolve(path: &'a str) -> Self {
        if path.starts_with(routes::HEALTH_PREFIX) {
            Route::Health
        } else if path.starts_with(routes::RECORDS_PREFIX) {
            // Last piece of a left-to-right split, so occurrences never overlap
            Route::Record(path.split(routes::RECORDS_PREFIX).last().unwrap_or_default())
        } else {
            Route::Default
        }
    }
}

/// Status code plus JSON body produced by the query service
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub status: StatusCode,
    pub body: JsonValue,
}

impl QueryResponse {
    pub fn ok(body: JsonValue) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// Serialize into the request/response envelope
    pub fn into_envelope(self) -> Result<ResponseEnvelope> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Ok(ResponseEnvelope {
            status_code: self.status.as_u16(),
            headers,
            body: serde_json::to_string(&self.body)?,
        })
    }
}

impl IntoResponse for QueryResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Response envelope handed back to an invocation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Read-only record lookups: one store read per request, none for the default route
#[derive(Clone)]
pub struct QueryService {
    store: SharedStore,
}

impl QueryService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Route `path` and serve it
    pub async fn handle(&self, path: &str) -> Result<QueryResponse, ApiError> {
        match Route::resolve(path) {
            Route::Health => self.health().await,
            Route::Record(record_id) => self.get_record(record_id).await,
            Route::Default => Ok(QueryResponse::ok(serde_json::to_value(MessageResponse {
                message: "ok".to_string(),
            })?)),
        }
    }

    /// Serve a request descriptor, returning an envelope.
    ///
    /// 400 and 404 become envelopes; store faults are returned as `Err`.
    pub async fn invoke(&self, request: &QueryRequest) -> Result<ResponseEnvelope> {
        let response = match self.handle(request.resolved_path()).await {
            Ok(response) => response,
            Err(ApiError::Store(err)) => return Err(err),
            Err(err) => {
                let (status, error) = err.status_and_message();
                QueryResponse {
                    status,
                    body: serde_json::to_value(ErrorResponse { error })?,
                }
            }
        };
        response.into_envelope()
    }

    /// Freshness of the last seed run; a missing metadata record is `null`, not an error
    pub async fn health(&self) -> Result<QueryResponse, ApiError> {
        let freshness_ts = match self.store.get(META_RECORD_ID).await? {
            Some(meta) => meta.freshness_ts()?,
            None => None,
        };

        tracing::debug!("Health check, freshness_ts: {:?}", freshness_ts);
        Ok(QueryResponse::ok(serde_json::to_value(HealthResponse {
            ok: true,
            freshness_ts,
        })?))
    }

    pub async fn get_record(&self, record_id: &str) -> Result<QueryResponse, ApiError> {
        if record_id.is_empty() {
            return Err(ApiError::MissingId);
        }

        match self.store.get(record_id).await? {
            Some(record) => {
                tracing::info!("Successfully retrieved record with id: {}", record_id);
                Ok(QueryResponse::ok(record.into_value()))
            }
            None => {
                tracing::info!("Record not found with id: {}", record_id);
                Err(ApiError::RecordNotFound(record_id.to_string()))
            }
        }
    }
}
