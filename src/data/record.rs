use std::fmt::Debug;

use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store::{Order, Query, Store, StoreResult, Window};
use super::validate::Validate;
use crate::error::StoreError;
use crate::middleware::paging::{Page, PageState};
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::util::{self, date_time_millis};

/// Attempts of a read-modify-write before giving up with 409.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

/// A kind of marketplace listing stored in its own collection.
pub trait Listing: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Human readable kind, used in problem titles.
    const NAME: &'static str;
    const ONE_PER_OWNER: bool;
    /// Text fields covered by `q` searches.
    const SEARCH_FIELDS: &'static [&'static str];

    type Payload: DeserializeOwned + Validate + Clone + Debug + Send + Sync;

    fn may_create(role: Role) -> bool;

    fn from_payload(payload: Self::Payload) -> Self;

    /// Checks that apply to a new record only, run after `validate`.
    fn validate_new(_payload: &Self::Payload) -> Result<(), Problem> {
        Ok(())
    }

    /// Replaces the descriptive fields, keeping anything the payload doesn't carry.
    fn apply(&mut self, payload: Self::Payload);

    /// Documents in other collections deleted together with record `id`.
    fn dependents(_id: Uuid) -> Vec<(&'static str, Query)> {
        Vec::new()
    }
}

/// Query string filters of a listing search.
pub trait ListFilter: Debug + Send + Sync {
    /// Adds the entity specific conditions.
    fn narrow(&self, query: Query) -> Query;

    /// Free text searched over [`Listing::SEARCH_FIELDS`].
    fn term(&self) -> Option<&str>;

    /// Moderation state to list; only honoured for admins.
    fn approved(&self) -> Option<bool>;
}

/// Storage envelope shared by every listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record<T> {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub owner: Uuid,
    pub owner_email: String,
    #[serde(with = "date_time_millis")]
    pub created: DateTime<Utc>,
    #[serde(with = "date_time_millis")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub revision: i64,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Listing> Record<T> {
    pub fn new(owner: &UserRoleToken, body: T, approved: bool) -> Record<T> {
        let now = util::now();
        Record {
            id: Uuid::new_v4(),
            owner: owner.user,
            owner_email: owner.email.clone(),
            created: now,
            updated: now,
            revision: 0,
            is_approved: approved,
            is_verified: false,
            body,
        }
    }

    /// Whether `viewer` may see this record.
    pub fn visible_to(&self, viewer: Option<&UserRoleToken>) -> bool {
        self.is_approved || viewer.map(|v| v.may_manage(self.owner)).unwrap_or(false)
    }

    pub fn to_document(&self) -> StoreResult<bson::Document> {
        Ok(bson::to_document(self)?)
    }

    pub fn from_document(document: bson::Document) -> StoreResult<Record<T>> {
        Ok(bson::from_document(document)?)
    }
}

pub fn owner_query(owner: Uuid) -> Query {
    Query::new().eq("owner", owner.to_string())
}

pub fn newest_first(query: Query) -> Query {
    query.sort("created", Order::Descending)
}

#[rocket::async_trait]
pub trait RecordDbExt {
    async fn insert_record<T: Listing>(&self, record: &Record<T>) -> Result<(), Problem>;

    async fn get_record<T: Listing>(&self, id: Uuid) -> StoreResult<Option<Record<T>>>;

    async fn find_records<T: Listing>(
        &self,
        query: &Query,
        page: PageState,
    ) -> StoreResult<Page<Record<T>>>;

    async fn count_records<T: Listing>(&self, query: &Query) -> StoreResult<u64>;

    /// Writes `record` if nobody else did since it was read. Bumps revision
    /// and `updated` on success.
    async fn save_record<T: Listing>(&self, record: &mut Record<T>) -> StoreResult<bool>;

    /// Read-modify-write of one record, retried on concurrent modification.
    /// `None` if the record doesn't exist.
    async fn update_record<T, F>(&self, id: Uuid, change: F) -> Result<Option<Record<T>>, Problem>
    where
        T: Listing,
        F: FnMut(&mut Record<T>) -> Result<(), Problem> + Send;

    async fn delete_record<T: Listing>(&self, id: Uuid) -> StoreResult<Option<Record<T>>>;
}

#[rocket::async_trait]
impl RecordDbExt for dyn Store {
    async fn insert_record<T: Listing>(&self, record: &Record<T>) -> Result<(), Problem> {
        let document = record.to_document()?;
        match self.insert(T::COLLECTION, document).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate { .. }) => Err(Problem::new_untyped(
                Status::BadRequest,
                format!("{} already exists.", T::NAME),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_record<T: Listing>(&self, id: Uuid) -> StoreResult<Option<Record<T>>> {
        self.find_one(T::COLLECTION, &Query::by_id(id))
            .await?
            .map(Record::from_document)
            .transpose()
    }

    async fn find_records<T: Listing>(
        &self,
        query: &Query,
        page: PageState,
    ) -> StoreResult<Page<Record<T>>> {
        let total = self.count(T::COLLECTION, query).await?;
        let documents = self
            .find(
                T::COLLECTION,
                query,
                Window {
                    skip: page.skip(),
                    limit: page.limit(),
                },
            )
            .await?;

        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            match Record::<T>::from_document(document) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Unable to deserialize {} document: {}", T::NAME, e)
                }
            }
        }

        Ok(Page::new(records, page, total))
    }

    async fn count_records<T: Listing>(&self, query: &Query) -> StoreResult<u64> {
        self.count(T::COLLECTION, query).await
    }

    async fn save_record<T: Listing>(&self, record: &mut Record<T>) -> StoreResult<bool> {
        let expected = record.revision;
        let mut next = record.clone();
        next.revision = expected + 1;
        next.updated = util::now();

        let saved = self
            .replace(T::COLLECTION, record.id, expected, next.to_document()?)
            .await?;
        if saved {
            *record = next;
        }
        Ok(saved)
    }

    async fn update_record<T, F>(
        &self,
        id: Uuid,
        mut change: F,
    ) -> Result<Option<Record<T>>, Problem>
    where
        T: Listing,
        F: FnMut(&mut Record<T>) -> Result<(), Problem> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut record = match self.get_record::<T>(id).await? {
                Some(it) => it,
                None => return Ok(None),
            };

            change(&mut record)?;

            if self.save_record(&mut record).await? {
                return Ok(Some(record));
            }
            tracing::debug!(
                "{} {} changed concurrently (attempt {})",
                T::NAME,
                id,
                attempt
            );
        }

        Err(problems::conflict(format!(
            "{} was modified by another request. Try again.",
            T::NAME
        )))
    }

    async fn delete_record<T: Listing>(&self, id: Uuid) -> StoreResult<Option<Record<T>>> {
        self.delete_one(T::COLLECTION, &Query::by_id(id))
            .await?
            .map(Record::from_document)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bson::Document;
    use chrono::Duration;

    use super::*;
    use crate::data::store::MemoryStore;
    use crate::data::teacher::tests::example_teacher;
    use crate::data::teacher::Teacher;
    use crate::data::user::User;

    /// Loses the revision race of the next `losses` replaces.
    #[derive(Debug, Default)]
    struct ContendedStore {
        inner: MemoryStore,
        losses: AtomicUsize,
    }

    #[rocket::async_trait]
    impl Store for ContendedStore {
        async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
            self.inner.ensure_unique(collection, fields).await
        }

        async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
            self.inner.insert(collection, document).await
        }

        async fn find_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>> {
            self.inner.find_one(collection, query).await
        }

        async fn find(
            &self,
            collection: &str,
            query: &Query,
            window: Window,
        ) -> StoreResult<Vec<Document>> {
            self.inner.find(collection, query, window).await
        }

        async fn count(&self, collection: &str, query: &Query) -> StoreResult<u64> {
            self.inner.count(collection, query).await
        }

        async fn replace(
            &self,
            collection: &str,
            id: Uuid,
            expected_revision: i64,
            document: Document,
        ) -> StoreResult<bool> {
            let lost = self
                .losses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if lost {
                return Ok(false);
            }
            self.inner
                .replace(collection, id, expected_revision, document)
                .await
        }

        async fn delete_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>> {
            self.inner.delete_one(collection, query).await
        }

        async fn delete_many(&self, collection: &str, query: &Query) -> StoreResult<u64> {
            self.inner.delete_many(collection, query).await
        }
    }

    fn owner() -> UserRoleToken {
        let user = User::new("Asha Rao", "asha@example.com", "password1", Role::Teacher, 4);
        UserRoleToken::new(&user, Duration::hours(1))
    }

    #[rocket::async_test]
    async fn update_retries_lost_races() {
        let contended = ContendedStore::default();
        let db: &(dyn Store + 'static) = &contended;
        let record = Record::new(&owner(), example_teacher(), false);
        db.insert_record(&record).await.unwrap();

        contended.losses.store(3, Ordering::SeqCst);
        let mut calls = 0;
        let updated = db
            .update_record::<Teacher, _>(record.id, |it| {
                calls += 1;
                it.body.city = "Nashik".to_string();
                Ok(())
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(calls, 4);
        assert_eq!(updated.revision, 1);
        let stored = db.get_record::<Teacher>(record.id).await.unwrap().unwrap();
        assert_eq!(stored.body.city, "Nashik");
        assert_eq!(stored.revision, 1);
    }

    #[rocket::async_test]
    async fn update_gives_up_with_conflict() {
        let contended = ContendedStore::default();
        let db: &(dyn Store + 'static) = &contended;
        let record = Record::new(&owner(), example_teacher(), false);
        db.insert_record(&record).await.unwrap();

        contended.losses.store(MAX_WRITE_ATTEMPTS, Ordering::SeqCst);
        let mut calls = 0;
        let problem = db
            .update_record::<Teacher, _>(record.id, |_| {
                calls += 1;
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(problem.status, Status::Conflict);
        assert_eq!(calls, MAX_WRITE_ATTEMPTS);
        let stored = db.get_record::<Teacher>(record.id).await.unwrap().unwrap();
        assert_eq!(stored.revision, 0);
    }

    #[rocket::async_test]
    async fn update_of_missing_record_is_none() {
        let db = MemoryStore::shared();
        let changed = db
            .update_record::<Teacher, _>(Uuid::new_v4(), |_| Ok(()))
            .await
            .unwrap();
        assert!(changed.is_none());
    }
}
