//! In-process [`DocumentStore`] with the remote store's observable semantics.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::document::{Collection, Document, DocumentStore, Fields, Query, SortDirection};
use crate::error::StoreError;

/// A [`DocumentStore`] held entirely in memory.
///
/// Keys are random and opaque, updates require the document to exist,
/// deletes are idempotent, and unordered queries return documents in
/// insertion order. Nothing survives the process.
///
/// # Examples
///
/// ```
/// # async fn example() -> Result<(), gventos::StoreError> {
/// use gventos::{Collection, DocumentStore, Fields, MemoryDocumentStore, Query};
///
/// let store = MemoryDocumentStore::new();
/// let id = store.add(Collection::Events, Fields::new()).await?;
/// let docs = store.query(Collection::Events, &Query::all()).await?;
/// assert_eq!(docs[0].id, id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone every document currently in `collection`, in insertion order.
    pub fn documents(&self, collection: Collection) -> Vec<Document> {
        let guard = self.collections.read().expect("memory store lock poisoned");
        guard.get(&collection).cloned().unwrap_or_default()
    }

    /// Number of documents currently in `collection`.
    pub fn len(&self, collection: Collection) -> usize {
        let guard = self.collections.read().expect("memory store lock poisoned");
        guard.get(&collection).map_or(0, Vec::len)
    }

    /// Whether every collection is empty.
    pub fn is_empty(&self) -> bool {
        let guard = self.collections.read().expect("memory store lock poisoned");
        guard.values().all(Vec::is_empty)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add(&self, collection: Collection, fields: Fields) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut guard = self.collections.write().expect("memory store lock poisoned");
        guard.entry(collection).or_default().push(Document {
            id: id.clone(),
            fields,
        });
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let mut guard = self.collections.write().expect("memory store lock poisoned");
        let doc = guard
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_owned(),
            })?;
        doc.fields.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut guard = self.collections.write().expect("memory store lock poisoned");
        if let Some(docs) = guard.get_mut(&collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self
            .documents(collection)
            .into_iter()
            .filter(|doc| match query.filter() {
                Some((field, value)) => doc.fields.get(field) == Some(value),
                None => true,
            })
            .collect();

        if let Some((field, direction)) = query.order() {
            // Documents lacking the order field are excluded, as the remote
            // store does for ordered queries.
            docs.retain(|doc| doc.fields.contains_key(field));
            docs.sort_by(|a, b| {
                let ord = a.fields[field]
                    .compare(&b.fields[field])
                    .unwrap_or(std::cmp::Ordering::Equal);
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        Ok(docs)
    }
}
