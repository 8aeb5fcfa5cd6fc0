//! In-memory document store.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::store::{Collection, Document, DocumentQuery, DocumentStore, StoreError};

/// Documents keyed by collection and id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<DashMap<(Collection, Uuid), Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }

    fn find_now(&self, collection: Collection, query: &DocumentQuery) -> Vec<Document> {
        let docs: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .collect();
        query.apply(&docs)
    }

    fn update_now(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> Option<Document> {
        let mut entry = self.documents.get_mut(&(collection, id))?;
        for (key, value) in fields {
            entry.fields.insert(key, value);
        }
        Some(entry.clone())
    }
}

impl DocumentStore for InMemoryStore {
    fn find(
        &self,
        collection: Collection,
        query: DocumentQuery,
    ) -> BoxFuture<'_, Result<Vec<Document>, StoreError>> {
        future::ready(Ok(self.find_now(collection, &query))).boxed()
    }

    fn get(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> BoxFuture<'_, Result<Option<Document>, StoreError>> {
        let doc = self.documents.get(&(collection, id)).map(|d| d.clone());
        future::ready(Ok(doc)).boxed()
    }

    fn insert(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Document, StoreError>> {
        let doc = Document::new(fields);
        self.documents.insert((collection, doc.id), doc.clone());
        future::ready(Ok(doc)).boxed()
    }

    fn update(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Option<Document>, StoreError>> {
        future::ready(Ok(self.update_now(collection, id, fields))).boxed()
    }

    fn delete(&self, collection: Collection, id: Uuid) -> BoxFuture<'_, Result<bool, StoreError>> {
        let removed = self.documents.remove(&(collection, id)).is_some();
        future::ready(Ok(removed)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let store = InMemoryStore::new();
        let doc = store
            .insert(Collection::Users, fields(json!({ "name": "Jonas", "email": "j@x.io" })))
            .await
            .unwrap();

        let fetched = store.get(Collection::Users, doc.id).await.unwrap().unwrap();
        assert_eq!(fetched, doc);

        let updated = store
            .update(Collection::Users, doc.id, fields(json!({ "name": "Jonas S." })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields["name"], json!("Jonas S."));
        assert_eq!(updated.fields["email"], json!("j@x.io"));

        assert!(store.delete(Collection::Users, doc.id).await.unwrap());
        assert!(!store.delete(Collection::Users, doc.id).await.unwrap());
        assert!(store.get(Collection::Users, doc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = InMemoryStore::new();
        let tour = store
            .insert(Collection::Tours, fields(json!({ "name": "a" })))
            .await
            .unwrap();

        assert!(store.get(Collection::Reviews, tour.id).await.unwrap().is_none());
        assert_eq!(store.len(Collection::Tours), 1);
        assert_eq!(store.len(Collection::Reviews), 0);
    }

    #[tokio::test]
    async fn test_find_by_field() {
        let store = InMemoryStore::new();
        for email in ["a@x.io", "b@x.io"] {
            store
                .insert(Collection::Users, fields(json!({ "name": "n", "email": email })))
                .await
                .unwrap();
        }
        let found = store
            .find(Collection::Users, DocumentQuery::field_equals("email", "b@x.io"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fields["email"], json!("b@x.io"));
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = InMemoryStore::new();
        let result = store
            .update(Collection::Tours, Uuid::new_v4(), Map::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
