pub mod review;
pub mod schema;
pub mod tour;
pub mod user;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::database::store::{Document, Store, StoreError};
use crate::filter::{Condition, Projection};

pub use schema::{FieldRule, FieldType, Schema};

/// Related documents folded into a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Replace the id (or id array) stored at `path` with the referenced documents.
    Reference {
        path: &'static str,
        collection: &'static str,
        fields: &'static [&'static str],
    },
    /// Attach every document of `collection` whose `foreign_field` equals this id.
    Related {
        path: &'static str,
        collection: &'static str,
        foreign_field: &'static str,
    },
}

/// Side effect run after a document of the collection was written.
/// `previous` is the stored state before an update; `None` on create and delete.
#[async_trait]
pub trait WriteHook: Send + Sync {
    async fn after_write(
        &self,
        store: &dyn Store,
        doc: &Document,
        previous: Option<&Document>,
    ) -> Result<(), StoreError>;
}

/// Everything the generic handlers and the stores need to know about a collection.
pub struct Collection {
    pub name: &'static str,
    pub schema: Schema,
    /// Conditions every read applies before caller filters.
    pub base_filter: Vec<Condition>,
    /// Never returned to clients.
    pub hidden_fields: &'static [&'static str],
    /// Field sets whose combined values must be unique.
    pub unique: &'static [&'static [&'static str]],
    /// Applied on every read.
    pub expansions: Vec<Expansion>,
    /// Rejected by the generic update handler.
    pub write_protected: &'static [&'static str],
    pub on_create: Option<fn(&mut Document)>,
    pub virtuals: Option<fn(&mut Document)>,
    pub hook: Option<Arc<dyn WriteHook>>,
}

impl Collection {
    pub fn new(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            base_filter: vec![],
            hidden_fields: &[],
            unique: &[],
            expansions: vec![],
            write_protected: &[],
            on_create: None,
            virtuals: None,
            hook: None,
        }
    }

    /// Builds a new document from client attributes: fresh id, defaults, validation.
    pub fn prepare_create(&self, mut attrs: Document) -> Result<Document, StoreError> {
        attrs.remove("__v");
        attrs.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        self.schema.validate(&mut attrs, true)?;
        if let Some(on_create) = self.on_create {
            on_create(&mut attrs);
        }
        attrs.insert("__v".to_string(), Value::from(0));
        Ok(attrs)
    }

    /// Merges `patch` into `existing` and re-validates the result with the create rules.
    pub fn prepare_update(&self, existing: &Document, patch: Document) -> Result<Document, StoreError> {
        let mut merged = existing.clone();
        for (key, value) in patch {
            if key == "id" || key == "__v" {
                continue;
            }
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }
        self.schema.validate(&mut merged, false)?;
        Ok(merged)
    }

    /// Client representation: hidden fields removed, virtuals added, projection applied.
    pub fn present(&self, mut doc: Document, projection: Option<&Projection>) -> Value {
        for field in self.hidden_fields {
            doc.remove(*field);
        }
        if let Some(virtuals) = self.virtuals {
            virtuals(&mut doc);
        }
        match projection {
            Some(projection) => projection.apply(&mut doc),
            None => {
                doc.remove("__v");
            }
        }
        Value::Object(doc)
    }

    /// Returns the first unique field set `doc` collides with in `others`.
    pub fn find_duplicate<'a>(&self, doc: &Document, others: impl Iterator<Item = &'a Document> + Clone) -> Option<StoreError> {
        let id = doc.get("id");
        for fields in self.unique {
            let values: Option<Vec<&Value>> = fields.iter().map(|f| doc.get(*f)).collect();
            let Some(values) = values else { continue };
            let clash = others.clone().any(|other| {
                other.get("id") != id
                    && fields.iter().zip(values.iter()).all(|(f, v)| other.get(*f) == Some(*v))
            });
            if clash {
                return Some(StoreError::Duplicate {
                    field: fields.join(", "),
                    value: values.iter().map(|v| plain(v)).collect::<Vec<_>>().join(", "),
                });
            }
        }
        None
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Looks a collection up by name, for expansions.
pub fn collection(name: &str) -> Option<&'static Collection> {
    match name {
        tour::NAME => Some(tour::collection()),
        review::NAME => Some(review::collection()),
        user::NAME => Some(user::collection()),
        _ => None,
    }
}

pub fn all() -> [&'static Collection; 3] {
    [tour::collection(), review::collection(), user::collection()]
}
