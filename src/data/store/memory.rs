use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use bson::{Bson, Document};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{id_bson, Condition, Db, Order, Query, Store, StoreResult, Window};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    unique: Vec<Vec<String>>,
}

impl Collection {
    fn violates_unique(&self, candidate: &Document, skip_id: Option<&Bson>) -> bool {
        let mut keys: Vec<Vec<String>> = self.unique.clone();
        keys.push(vec!["_id".to_string()]);

        keys.iter().any(|fields| {
            let wanted: Option<Vec<&Bson>> = fields
                .iter()
                .map(|f| first_value(candidate, f))
                .collect();
            let wanted = match wanted {
                Some(it) => it,
                None => return false,
            };

            self.documents
                .iter()
                .filter(|existing| skip_id.is_none() || existing.get("_id") != skip_id)
                .any(|existing| {
                    fields.iter().zip(wanted.iter()).all(|(f, w)| {
                        first_value(existing, f)
                            .map(|v| bson_eq(v, w))
                            .unwrap_or(false)
                    })
                })
        })
    }
}

/// In-process [`Store`] evaluating [`Query`] the way MongoDB would for the
/// subset of operators the backend uses.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn shared() -> Db {
        Arc::new(MemoryStore::new())
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        let key: Vec<String> = fields.iter().map(|it| it.to_string()).collect();
        if !entry.unique.contains(&key) {
            entry.unique.push(key);
        }
        Ok(())
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();

        if entry.violates_unique(&document, None) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
            });
        }

        entry.documents.push(document);
        Ok(())
    }

    async fn find_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>> {
        let mut found = self.find(collection, query, Window { skip: 0, limit: 1 }).await?;
        Ok(found.pop())
    }

    async fn find(
        &self,
        collection: &str,
        query: &Query,
        window: Window,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let documents = match collections.get(collection) {
            Some(it) => &it.documents,
            None => return Ok(vec![]),
        };

        let mut matching: Vec<&Document> = documents.iter().filter(|d| matches_query(query, d)).collect();
        if !query.sort.is_empty() {
            matching.sort_by(|a, b| sort_order(&query.sort, a, b));
        }

        let skip = usize::try_from(window.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(window.limit).unwrap_or(usize::MAX);

        Ok(matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, collection: &str, query: &Query) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.documents.iter().filter(|d| matches_query(query, d)).count() as u64)
            .unwrap_or(0))
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        expected_revision: i64,
        document: Document,
    ) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let entry = match collections.get_mut(collection) {
            Some(it) => it,
            None => return Ok(false),
        };

        let id = id_bson(id);
        let expected = Bson::Int64(expected_revision);
        let position = entry.documents.iter().position(|d| {
            d.get("_id") == Some(&id)
                && d.get("revision").map(|r| bson_eq(r, &expected)).unwrap_or(false)
        });

        match position {
            Some(index) => {
                if entry.violates_unique(&document, Some(&id)) {
                    return Err(StoreError::Duplicate {
                        collection: collection.to_string(),
                    });
                }
                entry.documents[index] = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let entry = match collections.get_mut(collection) {
            Some(it) => it,
            None => return Ok(None),
        };

        Ok(entry
            .documents
            .iter()
            .position(|d| matches_query(query, d))
            .map(|index| entry.documents.remove(index)))
    }

    async fn delete_many(&self, collection: &str, query: &Query) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let entry = match collections.get_mut(collection) {
            Some(it) => it,
            None => return Ok(0),
        };

        let before = entry.documents.len();
        entry.documents.retain(|d| !matches_query(query, d));
        Ok((before - entry.documents.len()) as u64)
    }
}

pub fn matches_query(query: &Query, document: &Document) -> bool {
    query.conditions.iter().all(|c| condition_matches(c, document))
}

fn condition_matches(condition: &Condition, document: &Document) -> bool {
    match condition {
        Condition::Eq(field, expected) => values(document, field)
            .iter()
            .any(|v| bson_eq(v, expected)),
        Condition::Gte(field, bound) => values(document, field)
            .iter()
            .any(|v| matches!(compare(v, bound), Some(Ordering::Greater | Ordering::Equal))),
        Condition::Lte(field, bound) => values(document, field)
            .iter()
            .any(|v| matches!(compare(v, bound), Some(Ordering::Less | Ordering::Equal))),
        Condition::Text(field, expected) => values(document, field).iter().any(|v| match v {
            Bson::String(s) => s.to_lowercase() == expected.to_lowercase(),
            _ => false,
        }),
        Condition::Search { fields, term } => {
            let term = term.to_lowercase();
            fields.iter().any(|f| {
                values(document, f).iter().any(|v| match v {
                    Bson::String(s) => s.to_lowercase().contains(&term),
                    _ => false,
                })
            })
        }
    }
}

/// All values reachable at a dotted `path`, descending into arrays.
/// An array leaf yields both the array and each of its elements.
fn values<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = vec![];
    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = document.get(*head) {
            collect(value, rest, &mut out);
        }
    }
    out
}

fn collect<'a>(value: &'a Bson, path: &[&str], out: &mut Vec<&'a Bson>) {
    match path.split_first() {
        None => {
            out.push(value);
            if let Bson::Array(items) = value {
                out.extend(items.iter());
            }
        }
        Some((head, rest)) => match value {
            Bson::Document(inner) => {
                if let Some(next) = inner.get(*head) {
                    collect(next, rest, out);
                }
            }
            Bson::Array(items) => {
                for item in items {
                    collect(item, path, out);
                }
            }
            _ => {}
        },
    }
}

fn first_value<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    values(document, path).into_iter().next()
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(it) => Some(f64::from(*it)),
        Bson::Int64(it) => Some(*it as f64),
        Bson::Double(it) => Some(*it),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(a), as_number(b)) {
        return a.partial_cmp(&b);
    }
    match (a, b) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    compare(a, b) == Some(Ordering::Equal) || a == b
}

fn sort_order(sort: &[(String, Order)], a: &Document, b: &Document) -> Ordering {
    for (field, order) in sort {
        let ordering = match (first_value(a, field), first_value(b, field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
        };
        let ordering = match order {
            Order::Ascending => ordering,
            Order::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
