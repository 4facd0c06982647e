use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Field that identifies a record in the store
pub const RECORD_ID_FIELD: &str = "record_id";

/// Reserved id of the metadata record
pub const META_RECORD_ID: &str = "__meta__";

/// Metadata field holding the last seed time in Unix seconds
pub const FRESHNESS_FIELD: &str = "freshness_ts";

/// A schema-less record: an ordered JSON object keyed by `record_id`.
///
/// Data records and the metadata record share this type; they are told
/// apart only by their id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, JsonValue>);

impl Record {
    /// Create a record holding only its `record_id`
    pub fn new(record_id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(RECORD_ID_FIELD.to_string(), JsonValue::String(record_id.into()));
        Self(fields)
    }

    /// The metadata record stamped with `freshness_ts`
    pub fn metadata(freshness_ts: i64) -> Self {
        Self::new(META_RECORD_ID).with_field(FRESHNESS_FIELD, JsonValue::from(freshness_ts))
    }

    /// Append (or overwrite) a field
    pub fn with_field(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Parse a stored JSON document, which must be an object with a string `record_id`
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let record: Record =
            serde_json::from_value(value).context("Stored record is not a JSON object")?;
        if record.record_id().is_none() {
            bail!("Stored record has no string '{}' field", RECORD_ID_FIELD);
        }
        Ok(record)
    }

    pub fn record_id(&self) -> Option<&str> {
        self.0.get(RECORD_ID_FIELD).and_then(JsonValue::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.0)
    }

    /// Read `freshness_ts` from a metadata record.
    ///
    /// A missing field is `None`; a present field that is not an integer is malformed.
    pub fn freshness_ts(&self) -> Result<Option<i64>> {
        match self.0.get(FRESHNESS_FIELD) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => value.as_i64().map(Some).with_context(|| {
                format!("Metadata field '{}' is not an integer: {}", FRESHNESS_FIELD, value)
            }),
        }
    }
}

/// Response body for the health route
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
    pub freshness_ts: Option<i64>,
}

/// Response body for the default route
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

/// Output of a seed run
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SeedSummary {
    pub ok: bool,
    pub count: usize,
}
