use bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{id_bson, Condition, Order, Query, Store, StoreResult, Window};
use crate::error::StoreError;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<MongoStore, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(MongoStore { db })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

fn is_duplicate(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(w)) => w.code == DUPLICATE_KEY,
        ErrorKind::Command(c) => c.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn write_error(collection: &str, e: mongodb::error::Error) -> StoreError {
    if is_duplicate(&e) {
        StoreError::Duplicate {
            collection: collection.to_string(),
        }
    } else {
        StoreError::Database(e)
    }
}

/// Translates a [`Query`] into a MongoDB filter document.
pub fn filter_document(query: &Query) -> Document {
    if query.conditions.is_empty() {
        return doc! {};
    }

    let clauses: Vec<Bson> = query
        .conditions
        .iter()
        .map(|c| Bson::Document(condition_document(c)))
        .collect();

    doc! { "$and": clauses }
}

fn condition_document(condition: &Condition) -> Document {
    let mut clause = Document::new();
    match condition {
        Condition::Eq(field, value) => {
            clause.insert(field.clone(), value.clone());
        }
        Condition::Gte(field, value) => {
            clause.insert(field.clone(), doc! { "$gte": value.clone() });
        }
        Condition::Lte(field, value) => {
            clause.insert(field.clone(), doc! { "$lte": value.clone() });
        }
        Condition::Text(field, value) => {
            clause.insert(
                field.clone(),
                doc! { "$regex": format!("^{}$", regex::escape(value)), "$options": "i" },
            );
        }
        Condition::Search { fields, term } => {
            let pattern = regex::escape(term);
            let alternatives: Vec<Bson> = fields
                .iter()
                .map(|f| {
                    let mut alternative = Document::new();
                    alternative.insert(
                        f.clone(),
                        doc! { "$regex": pattern.clone(), "$options": "i" },
                    );
                    Bson::Document(alternative)
                })
                .collect();
            clause.insert("$or", alternatives);
        }
    }
    clause
}

pub fn sort_document(query: &Query) -> Option<Document> {
    if query.sort.is_empty() {
        return None;
    }

    let mut sort = Document::new();
    for (field, order) in &query.sort {
        let direction = match order {
            Order::Ascending => 1,
            Order::Descending => -1,
        };
        sort.insert(field.clone(), direction);
    }
    Some(sort)
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        let mut keys = Document::new();
        for field in fields {
            keys.insert(*field, 1);
        }

        let mut options = IndexOptions::default();
        options.unique = Some(true);

        tracing::debug!("ensuring unique index on {}: {:?}", collection, fields);
        self.collection(collection)
            .create_index(IndexModel::builder().keys(keys).options(options).build(), None)
            .await?;
        Ok(())
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        self.collection(collection)
            .insert_one(document, None)
            .await
            .map_err(|e| write_error(collection, e))?;
        Ok(())
    }

    async fn find_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>> {
        Ok(self
            .collection(collection)
            .find_one(filter_document(query), None)
            .await?)
    }

    async fn find(
        &self,
        collection: &str,
        query: &Query,
        window: Window,
    ) -> StoreResult<Vec<Document>> {
        let mut options = FindOptions::default();
        options.sort = sort_document(query);
        if window.skip > 0 {
            options.skip = Some(window.skip);
        }
        options.limit = i64::try_from(window.limit).ok();

        let cursor = self
            .collection(collection)
            .find(filter_document(query), options)
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, collection: &str, query: &Query) -> StoreResult<u64> {
        Ok(self
            .collection(collection)
            .count_documents(filter_document(query), None)
            .await?)
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        expected_revision: i64,
        document: Document,
    ) -> StoreResult<bool> {
        let result = self
            .collection(collection)
            .replace_one(
                doc! { "_id": id_bson(id), "revision": expected_revision },
                document,
                None,
            )
            .await
            .map_err(|e| write_error(collection, e))?;

        Ok(result.matched_count == 1)
    }

    async fn delete_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>> {
        Ok(self
            .collection(collection)
            .find_one_and_delete(filter_document(query), None)
            .await?)
    }

    async fn delete_many(&self, collection: &str, query: &Query) -> StoreResult<u64> {
        Ok(self
            .collection(collection)
            .delete_many(filter_document(query), None)
            .await?
            .deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_empty_filter() {
        assert_eq!(filter_document(&Query::new()), doc! {});
        assert_eq!(sort_document(&Query::new()), None);
    }

    #[test]
    fn conditions_are_joined_with_and() {
        let query = Query::new()
            .eq("city", "Pune")
            .gte("experience_years", 2_i64)
            .search(&["name", "bio"], "a+b")
            .sort("created", Order::Descending);

        assert_eq!(
            filter_document(&query),
            doc! {
                "$and": [
                    { "city": "Pune" },
                    { "experience_years": { "$gte": 2_i64 } },
                    { "$or": [
                        { "name": { "$regex": "a\\+b", "$options": "i" } },
                        { "bio": { "$regex": "a\\+b", "$options": "i" } },
                    ] },
                ]
            }
        );
        assert_eq!(sort_document(&query), Some(doc! { "created": -1 }));
    }
}
