use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::models::Collection;
use crate::filter::{Condition, QuerySpec};

/// A stored entity. Every document carries a string `id` and the `__v` counter.
pub type Document = Map<String, Value>;

/// Field-level validation message, in schema declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Failures raised by a [`Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {}", .0.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join(". "))]
    Validation(Vec<FieldError>),

    #[error("duplicate value {value} for {field}")]
    Duplicate { field: String, value: String },

    #[error("cast failed for {field}: {value}")]
    Cast { field: String, value: String },

    #[error("unsupported query operator {op} on {field}")]
    UnsupportedOperator { field: String, op: String },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Storage collaborator. Implementations apply the collection's base filter to
/// every read, validate writes against its schema and enforce its unique sets.
#[async_trait]
pub trait Store: Send + Sync {
    /// Filtered, sorted and paginated read. Projection is left to `Collection::present`.
    async fn find(&self, collection: &Collection, spec: &QuerySpec) -> Result<Vec<Document>, StoreError>;

    /// First document matching all conditions, unprojected.
    async fn find_one(&self, collection: &Collection, conditions: &[Condition]) -> Result<Option<Document>, StoreError>;

    async fn find_by_id(&self, collection: &Collection, id: &str) -> Result<Option<Document>, StoreError>;

    async fn create(&self, collection: &Collection, attrs: Document) -> Result<Document, StoreError>;

    /// Merges `patch` into the stored document; `null` values unset fields.
    async fn update_by_id(&self, collection: &Collection, id: &str, patch: Document) -> Result<Option<Document>, StoreError>;

    async fn delete_by_id(&self, collection: &Collection, id: &str) -> Result<Option<Document>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Converts a `json!({...})` literal into a [`Document`]; anything but an object is empty.
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}
