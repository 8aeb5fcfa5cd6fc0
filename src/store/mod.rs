//! Document storage.
//!
//! Resource handlers talk to a [`DocumentStore`]; the crate ships an
//! in-memory implementation in [`memory`].
//!
//! # Data Flow
//! ```text
//! Resource handler
//!     → query.rs (DocumentQuery from the de-duplicated query map)
//!     → DocumentStore (find / get / insert / update / delete)
//!     → Document::to_json → success envelope
//! ```

pub mod memory;
pub mod query;

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use query::{DocumentQuery, FilterOp};

/// Failure inside a store backend. Never shown to clients in production.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// The resource collections served under `/api/v1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tours,
    Users,
    Reviews,
    Bookings,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Tours,
        Collection::Users,
        Collection::Reviews,
        Collection::Bookings,
    ];

    /// Path segment and collection name.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Tours => "tours",
            Collection::Users => "users",
            Collection::Reviews => "reviews",
            Collection::Bookings => "bookings",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            Collection::Tours => "tour",
            Collection::Users => "user",
            Collection::Reviews => "review",
            Collection::Bookings => "booking",
        }
    }

    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Tours => &["name", "duration", "maxGroupSize", "difficulty", "price"],
            Collection::Users => &["name", "email"],
            Collection::Reviews => &["review", "rating", "tour", "user"],
            Collection::Bookings => &["tour", "user", "price"],
        }
    }

    fn missing_message(self, field: &str) -> String {
        format!("A {} must have a {}", self.singular(), field)
    }

    /// One message per missing or null required field.
    pub fn validate(self, fields: &Map<String, Value>) -> Vec<String> {
        self.required_fields()
            .iter()
            .filter(|field| matches!(fields.get(**field), None | Some(Value::Null)))
            .map(|field| self.missing_message(field))
            .collect()
    }

    /// Like [`Collection::validate`] for partial updates: only fields
    /// explicitly set to null are reported.
    pub fn validate_patch(self, fields: &Map<String, Value>) -> Vec<String> {
        self.required_fields()
            .iter()
            .filter(|field| matches!(fields.get(**field), Some(Value::Null)))
            .map(|field| self.missing_message(field))
            .collect()
    }

    /// Normalize client-supplied fields before they are stored.
    pub fn prepare(self, fields: &mut Map<String, Value>) {
        fields.remove("id");
        fields.remove("createdAt");
        if self == Collection::Tours {
            if let Some(name) = fields.get("name").and_then(Value::as_str) {
                let slug = slugify(name);
                fields.insert("slug".to_string(), Value::String(slug));
            }
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase, with runs of non-alphanumerics collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            fields,
        }
    }

    /// Field lookup that also resolves `id` and `createdAt`.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.to_string())),
            "createdAt" => Some(Value::String(
                self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            _ => self.fields.get(name).cloned(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::with_capacity(self.fields.len() + 2);
        out.insert("id".to_string(), Value::String(self.id.to_string()));
        out.insert(
            "createdAt".to_string(),
            Value::String(self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        Value::Object(out)
    }
}

/// Persistence for resource documents.
pub trait DocumentStore: Send + Sync {
    /// Documents matching `query`, sorted and paginated.
    fn find(
        &self,
        collection: Collection,
        query: DocumentQuery,
    ) -> BoxFuture<'_, Result<Vec<Document>, StoreError>>;

    fn get(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> BoxFuture<'_, Result<Option<Document>, StoreError>>;

    fn insert(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Document, StoreError>>;

    /// Merge `fields` into an existing document. `None` if absent.
    fn update(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Option<Document>, StoreError>>;

    /// True if a document was removed.
    fn delete(&self, collection: Collection, id: Uuid) -> BoxFuture<'_, Result<bool, StoreError>>;
}
