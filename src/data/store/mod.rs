//! Document store seam.
//!
//! Handlers talk to a [`Store`] instead of a concrete driver so the same code runs
//! against MongoDB in production and [`MemoryStore`] in tests. Queries are expressed
//! with the small [`Query`] model which both backends evaluate identically.

use std::sync::Arc;

use bson::{Bson, Document};
use uuid::Uuid;

use crate::error::StoreError;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Shared store handle managed by rocket.
pub type Db = Arc<dyn Store>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Stored form of a document id.
#[inline]
pub fn id_bson(id: Uuid) -> Bson {
    Bson::String(id.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals value. Array fields match when any element equals.
    Eq(String, Bson),
    Gte(String, Bson),
    Lte(String, Bson),
    /// Case-insensitive whole-value string match, array elements included.
    Text(String, String),
    /// Case-insensitive substring match on any of the fields.
    Search { fields: Vec<String>, term: String },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Order {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub sort: Vec<(String, Order)>,
}

impl Query {
    pub fn new() -> Query {
        Query::default()
    }

    pub fn by_id(id: Uuid) -> Query {
        Query::new().eq("_id", id_bson(id))
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Query {
        self.conditions.push(Condition::Eq(field.into(), value.into()));
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Query {
        self.conditions.push(Condition::Gte(field.into(), value.into()));
        self
    }

    pub fn lte(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Query {
        self.conditions.push(Condition::Lte(field.into(), value.into()));
        self
    }

    pub fn text(mut self, field: impl Into<String>, value: impl AsRef<str>) -> Query {
        self.conditions
            .push(Condition::Text(field.into(), value.as_ref().trim().to_string()));
        self
    }

    pub fn eq_if<V: Into<Bson>>(self, field: &str, value: Option<V>) -> Query {
        match value {
            Some(value) => self.eq(field, value),
            None => self,
        }
    }

    pub fn gte_if<V: Into<Bson>>(self, field: &str, value: Option<V>) -> Query {
        match value {
            Some(value) => self.gte(field, value),
            None => self,
        }
    }

    pub fn lte_if<V: Into<Bson>>(self, field: &str, value: Option<V>) -> Query {
        match value {
            Some(value) => self.lte(field, value),
            None => self,
        }
    }

    /// Blank values are ignored.
    pub fn text_if(self, field: &str, value: Option<&String>) -> Query {
        match value.map(|it| it.trim()).filter(|it| !it.is_empty()) {
            Some(value) => self.text(field, value),
            None => self,
        }
    }

    /// Adds a text search; blank terms are ignored.
    pub fn search(mut self, fields: &[&str], term: impl AsRef<str>) -> Query {
        let term = term.as_ref().trim();
        if !term.is_empty() {
            self.conditions.push(Condition::Search {
                fields: fields.iter().map(|it| it.to_string()).collect(),
                term: term.to_string(),
            });
        }
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: Order) -> Query {
        self.sort.push((field.into(), order));
        self
    }
}

/// Skip/limit window of a find.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

#[rocket::async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Declares a (compound) unique key over `fields`.
    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> StoreResult<()>;

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()>;

    async fn find_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>>;

    async fn find(
        &self,
        collection: &str,
        query: &Query,
        window: Window,
    ) -> StoreResult<Vec<Document>>;

    async fn count(&self, collection: &str, query: &Query) -> StoreResult<u64>;

    /// Replaces the document with `id` if its `revision` is still `expected_revision`.
    /// Returns whether a document was replaced.
    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        expected_revision: i64,
        document: Document,
    ) -> StoreResult<bool>;

    async fn delete_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>>;

    async fn delete_many(&self, collection: &str, query: &Query) -> StoreResult<u64>;
}
