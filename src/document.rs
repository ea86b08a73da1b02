//! Storage-neutral document model and the [`DocumentStore`] trait.
//!
//! Entities are persisted as flat documents in four collections. Keys are
//! assigned by the backend on [`add`](DocumentStore::add); the client never
//! mints them. Queries are limited to what the aggregate store needs: an
//! optional equality filter on one field and an optional ordering on one field.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// The four remote collections backing the entity tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    /// Top-level events.
    Events,
    /// One document per calendar day of an event.
    Programs,
    /// Scheduled items within a program day.
    Activities,
    /// Image metadata for uploaded photos.
    Photos,
}

impl Collection {
    /// Returns the remote collection name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Programs => "programs",
            Self::Activities => "activities",
            Self::Photos => "photos",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed field value.
///
/// Mirrors the scalar value kinds the remote document store distinguishes.
/// Nested maps and arrays are not used by any entity and are not modelled.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// Double-precision float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Instant with sub-second precision.
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Returns the inner string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner instant, if this is a timestamp value.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Orders two values of the same kind. Values of different kinds are
    /// unordered.
    pub(crate) fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Double(a), Self::Double(b)) => a.partial_cmp(b),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Field name to value map of a document body.
pub type Fields = BTreeMap<String, FieldValue>;

/// A document read back from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Backend-assigned key.
    pub id: String,
    /// Document body.
    pub fields: Fields,
}

impl Document {
    /// Returns a required string field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] if the field is absent or not a string.
    pub fn string(&self, field: &str) -> Result<&str, StoreError> {
        self.fields
            .get(field)
            .and_then(FieldValue::as_str)
            .ok_or_else(|| self.malformed(field))
    }

    /// Returns an optional string field. Absent and null both read as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] if the field holds a non-string value.
    pub fn opt_string(&self, field: &str) -> Result<Option<&str>, StoreError> {
        match self.fields.get(field) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.malformed(field)),
        }
    }

    /// Returns a required timestamp field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] if the field is absent or not a timestamp.
    pub fn timestamp(&self, field: &str) -> Result<DateTime<Utc>, StoreError> {
        self.fields
            .get(field)
            .and_then(FieldValue::as_timestamp)
            .ok_or_else(|| self.malformed(field))
    }

    fn malformed(&self, field: &str) -> StoreError {
        StoreError::Malformed {
            id: self.id.clone(),
            field: field.to_owned(),
        }
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A single-collection query: optional equality filter plus optional ordering.
///
/// # Examples
///
/// ```
/// use gventos::{Query, SortDirection};
///
/// let q = Query::all().order_by("startDate", SortDirection::Descending);
/// assert!(q.filter().is_none());
///
/// let q = Query::where_eq("eventId", "ev-1");
/// assert_eq!(q.filter().map(|(f, _)| f), Some("eventId"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Option<(String, FieldValue)>,
    order: Option<(String, SortDirection)>,
}

impl Query {
    /// Every document in the collection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Documents whose `field` equals `value`.
    pub fn where_eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            filter: Some((field.into(), value.into())),
            order: None,
        }
    }

    /// Order results by `field`.
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    /// The equality filter, if any.
    pub fn filter(&self) -> Option<(&str, &FieldValue)> {
        self.filter.as_ref().map(|(f, v)| (f.as_str(), v))
    }

    /// The ordering, if any.
    pub fn order(&self) -> Option<(&str, SortDirection)> {
        self.order.as_ref().map(|(f, d)| (f.as_str(), *d))
    }
}

/// A remote document database as seen by the aggregate store.
///
/// # Contract
///
/// - [`add`](DocumentStore::add) assigns and returns a fresh key.
/// - [`update`](DocumentStore::update) merges the given fields into an
///   existing document and fails with [`StoreError::NotFound`] if the
///   document does not exist.
/// - [`delete`](DocumentStore::delete) succeeds whether or not the document
///   exists.
/// - [`query`](DocumentStore::query) returns documents matching the filter,
///   in the requested order when one is given.
///
/// No operation spans more than one document; there are no transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return its backend-assigned key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write is rejected or the transport fails.
    async fn add(&self, collection: Collection, fields: Fields) -> Result<String, StoreError>;

    /// Overwrite the named fields of an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for a missing document, or another
    /// [`StoreError`] if the write is rejected or the transport fails.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete is rejected or the transport fails.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Run a query against one collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read is rejected, the transport fails,
    /// or the response cannot be decoded.
    async fn query(&self, collection: Collection, query: &Query)
    -> Result<Vec<Document>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(fields: &[(&str, FieldValue)]) -> Document {
        Document {
            id: "d-1".into(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn collection_names_match_remote_schema() {
        assert_eq!(Collection::Events.as_str(), "events");
        assert_eq!(Collection::Programs.as_str(), "programs");
        assert_eq!(Collection::Activities.as_str(), "activities");
        assert_eq!(Collection::Photos.as_str(), "photos");
    }

    #[test]
    fn required_string_missing_is_malformed() {
        let d = doc(&[]);
        let err = d.string("title").unwrap_err();
        assert!(
            matches!(err, StoreError::Malformed { ref field, .. } if field == "title"),
            "expected Malformed(title), got: {err}"
        );
    }

    #[test]
    fn opt_string_treats_null_as_absent() {
        let d = doc(&[("description", FieldValue::Null)]);
        assert_eq!(d.opt_string("description").unwrap(), None);
        assert_eq!(d.opt_string("missing").unwrap(), None);
    }

    #[test]
    fn opt_string_rejects_wrong_kind() {
        let d = doc(&[("description", FieldValue::Integer(3))]);
        assert!(d.opt_string("description").is_err());
    }

    #[test]
    fn timestamp_field_reads_back() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let d = doc(&[("date", FieldValue::Timestamp(ts))]);
        assert_eq!(d.timestamp("date").unwrap(), ts);
        assert!(d.timestamp("title").is_err());
    }

    #[test]
    fn option_converts_to_null_or_value() {
        assert_eq!(FieldValue::from(None::<String>), FieldValue::Null);
        assert_eq!(
            FieldValue::from(Some("x".to_string())),
            FieldValue::String("x".into())
        );
    }

    #[test]
    fn compare_orders_same_kinds_only() {
        let a = FieldValue::String("a".into());
        let b = FieldValue::String("b".into());
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(a.compare(&FieldValue::Integer(1)), None);
    }

    #[test]
    fn query_builder_records_filter_and_order() {
        let q = Query::where_eq("programId", "p-1").order_by("time", SortDirection::Ascending);
        let (field, value) = q.filter().expect("filter set");
        assert_eq!(field, "programId");
        assert_eq!(value.as_str(), Some("p-1"));
        assert_eq!(q.order(), Some(("time", SortDirection::Ascending)));
    }
}
