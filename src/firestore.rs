//! [`DocumentStore`] backed by the Cloud Firestore REST API.
//!
//! Request bodies and responses use Firestore's typed-value JSON encoding.
//! The conversion functions are pure and tested without a network; the
//! client itself only builds URLs, attaches credentials, and maps statuses.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::auth::BearerToken;
use crate::config::FirestoreConfig;
use crate::document::{Collection, Document, DocumentStore, FieldValue, Fields, Query, SortDirection};
use crate::error::{ConfigError, StoreError};

/// HTTP client for one Firestore database.
///
/// Cheap to clone: the underlying `reqwest::Client` and the bearer token are
/// both reference-counted.
///
/// # Examples
///
/// ```no_run
/// # fn example() -> Result<(), gventos::ConfigError> {
/// use gventos::{FirestoreClient, FirestoreConfig};
///
/// let mut config = FirestoreConfig::new("my-project");
/// config.api_key = Some("web-api-key".into());
/// let client = FirestoreClient::new(&config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    http: reqwest::Client,
    documents_url: String,
    api_key: Option<String>,
    token: BearerToken,
}

impl FirestoreClient {
    /// Build a client from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(config: &FirestoreConfig) -> Result<Self, ConfigError> {
        let http = crate::config::http_client(crate::config::DEFAULT_REQUEST_TIMEOUT)?;
        Ok(Self::with_http(http, config))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_http(http: reqwest::Client, config: &FirestoreConfig) -> Self {
        use secrecy::ExposeSecret;

        let token = config
            .auth_token
            .as_ref()
            .map(|t| BearerToken::new(t.expose_secret()))
            .unwrap_or_default();
        Self {
            http,
            documents_url: documents_url(
                &config.base_url,
                &config.project_id,
                &config.database_id,
            ),
            api_key: config.api_key.clone(),
            token,
        }
    }

    /// Handle to the bearer token; set a new value to rotate credentials.
    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        self.token.apply(request)
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn add(&self, collection: Collection, fields: Fields) -> Result<String, StoreError> {
        let url = format!("{}/{}", self.documents_url, collection);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&encode_document(&fields))
            .send()
            .await?;
        let body = success_json(response).await?;
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode("created document has no name".into()))?;
        let id = document_id(name).to_owned();
        tracing::debug!(%collection, %id, "document created");
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let url = format!("{}/{}/{}", self.documents_url, collection, id);
        let response = self
            .request(reqwest::Method::PATCH, url)
            .query(&update_params(&fields))
            .json(&encode_document(&fields))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_owned(),
            });
        }
        success_json(response).await?;
        tracing::debug!(%collection, %id, "document updated");
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let url = format!("{}/{}/{}", self.documents_url, collection, id);
        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        success_json(response).await?;
        tracing::debug!(%collection, %id, "document deleted");
        Ok(())
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}:runQuery", self.documents_url);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&run_query_body(collection, query))
            .send()
            .await?;
        let body = success_json(response).await?;
        decode_run_query(&body)
    }
}

/// `{base}/projects/{project}/databases/{database}/documents`
pub(crate) fn documents_url(base_url: &str, project_id: &str, database_id: &str) -> String {
    format!(
        "{}/projects/{}/databases/{}/documents",
        base_url.trim_end_matches('/'),
        project_id,
        database_id
    )
}

/// Trailing path segment of a full document resource name.
pub(crate) fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Query parameters restricting a PATCH to the given fields and requiring
/// the document to exist.
pub(crate) fn update_params(fields: &Fields) -> Vec<(&'static str, String)> {
    fields
        .keys()
        .map(|name| ("updateMask.fieldPaths", name.clone()))
        .chain(std::iter::once(("currentDocument.exists", "true".to_owned())))
        .collect()
}

pub(crate) fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        // 64-bit integers travel as decimal strings.
        FieldValue::Integer(n) => json!({ "integerValue": n.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
        }
    }
}

/// Decode one typed value. Returns `None` for kinds the entity model does
/// not use (maps, arrays, references, geo points, bytes).
pub(crate) fn decode_value(value: &Value) -> Result<Option<FieldValue>, StoreError> {
    let Some(object) = value.as_object() else {
        return Err(StoreError::Decode(format!("expected typed value, got {value}")));
    };
    let Some((kind, inner)) = object.iter().next() else {
        return Err(StoreError::Decode("empty typed value".into()));
    };
    let decoded = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Bool(
            inner
                .as_bool()
                .ok_or_else(|| StoreError::Decode(format!("bad booleanValue {inner}")))?,
        ),
        "integerValue" => FieldValue::Integer(parse_integer(inner)?),
        "doubleValue" => FieldValue::Double(
            inner
                .as_f64()
                .ok_or_else(|| StoreError::Decode(format!("bad doubleValue {inner}")))?,
        ),
        "stringValue" => FieldValue::String(
            inner
                .as_str()
                .ok_or_else(|| StoreError::Decode(format!("bad stringValue {inner}")))?
                .to_owned(),
        ),
        "timestampValue" => {
            let raw = inner
                .as_str()
                .ok_or_else(|| StoreError::Decode(format!("bad timestampValue {inner}")))?;
            let ts = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| StoreError::Decode(format!("bad timestampValue {raw}: {e}")))?;
            FieldValue::Timestamp(ts.with_timezone(&Utc))
        }
        other => {
            tracing::debug!(kind = other, "skipping unsupported field value kind");
            return Ok(None);
        }
    };
    Ok(Some(decoded))
}

fn parse_integer(inner: &Value) -> Result<i64, StoreError> {
    match inner {
        Value::String(s) => s
            .parse()
            .map_err(|_| StoreError::Decode(format!("bad integerValue {s}"))),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| StoreError::Decode(format!("bad integerValue {n}"))),
        other => Err(StoreError::Decode(format!("bad integerValue {other}"))),
    }
}

/// `{"fields": {...}}` request body.
pub(crate) fn encode_document(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    json!({ "fields": encoded })
}

/// Decode a document resource (`name` plus optional `fields`).
pub(crate) fn decode_document(value: &Value) -> Result<Document, StoreError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode("document has no name".into()))?;
    let id = document_id(name).to_owned();

    let mut fields = Fields::new();
    if let Some(raw) = value.get("fields").and_then(Value::as_object) {
        for (field, typed) in raw {
            match decode_value(typed) {
                Ok(Some(decoded)) => {
                    fields.insert(field.clone(), decoded);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(%id, %field, error = %e, "skipping undecodable field");
                }
            }
        }
    }
    Ok(Document { id, fields })
}

/// `runQuery` request body for a single-collection query.
pub(crate) fn run_query_body(collection: Collection, query: &Query) -> Value {
    let mut structured = Map::new();
    structured.insert(
        "from".into(),
        json!([{ "collectionId": collection.as_str() }]),
    );
    if let Some((field, value)) = query.filter() {
        structured.insert(
            "where".into(),
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": encode_value(value),
                }
            }),
        );
    }
    if let Some((field, direction)) = query.order() {
        let direction = match direction {
            SortDirection::Ascending => "ASCENDING",
            SortDirection::Descending => "DESCENDING",
        };
        structured.insert(
            "orderBy".into(),
            json!([{ "field": { "fieldPath": field }, "direction": direction }]),
        );
    }
    json!({ "structuredQuery": structured })
}

/// Decode a `runQuery` response: an array of `{document?, readTime}`
/// entries. Entries without a document carry only progress metadata.
pub(crate) fn decode_run_query(body: &Value) -> Result<Vec<Document>, StoreError> {
    let entries = body
        .as_array()
        .ok_or_else(|| StoreError::Decode("runQuery response is not an array".into()))?;
    entries
        .iter()
        .filter_map(|entry| entry.get("document"))
        .map(decode_document)
        .collect()
}

/// Error message from a Firestore error body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

async fn success_json(response: reqwest::Response) -> Result<Value, StoreError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let message = error_message(&text);
        tracing::warn!(status = status.as_u16(), %message, "document store request failed");
        return Err(StoreError::Api {
            status: status.as_u16(),
            message,
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}
