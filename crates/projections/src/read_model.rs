//! Document store for query-side read models.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Result;

/// Equality filter over top-level document fields.
///
/// A document matches when every field in the filter is present and equal
/// to the supplied value. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldFilter {
    fields: Map<String, Value>,
}

impl FieldFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Returns true if no conditions were added.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the conditions as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Checks a document against every condition.
    pub fn matches(&self, document: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

/// Keyed JSON document storage, grouped in collections.
///
/// `save` replaces the whole document, so readers only ever observe complete
/// documents and the last writer for an id wins. Every stored document
/// carries its key in an `id` field.
#[async_trait]
pub trait ReadModelStore: Send + Sync {
    /// Upserts a document. The document must be a JSON object.
    async fn save(&self, collection: &str, id: &str, data: Value) -> Result<()>;

    /// Fetches one document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Returns every document of the collection matching the filter, in no
    /// particular order.
    async fn find(&self, collection: &str, filter: &FieldFilter) -> Result<Vec<Value>>;

    /// Removes every document of the collection.
    async fn clear(&self, collection: &str) -> Result<()>;

    /// Counts the documents of the collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Validates a document and stamps its key into the `id` field.
pub(crate) fn with_id(collection: &str, id: &str, data: Value) -> Result<Map<String, Value>> {
    match data {
        Value::Object(mut fields) => {
            fields.insert("id".to_string(), Value::String(id.to_string()));
            Ok(fields)
        }
        _ => Err(crate::ProjectionError::InvalidDocument {
            collection: collection.to_string(),
            id: id.to_string(),
        }),
    }
}
