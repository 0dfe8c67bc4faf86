use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::record::{Record, MAX_WRITE_ATTEMPTS};
use super::store::{Order, Query, Store, StoreResult, Window};
use super::vacancy::Vacancy;
use super::validate::{Checks, Validate};
use crate::error::StoreError;
use crate::middleware::paging::{Page, PageState};
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};
use crate::util::{self, date_time_millis};

pub static APPLICATION_COLLECTION_NAME: &str = "applications";

/// Compound key making one application per applicant per vacancy.
pub const APPLICATION_UNIQUE_KEY: [&str; 2] = ["vacancy", "applicant"];

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Shortlisted,
    Rejected,
    Hired,
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        ApplicationStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Application {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub vacancy: Uuid,
    pub vacancy_owner: Uuid,
    pub applicant: Uuid,
    pub applicant_email: String,
    pub name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub cover_letter: String,
    pub resume_url: Option<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(with = "date_time_millis")]
    pub created: DateTime<Utc>,
    #[serde(with = "date_time_millis")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub revision: i64,
}

impl Application {
    pub fn new(
        vacancy: &Record<Vacancy>,
        applicant: &UserRoleToken,
        data: ApplicationData,
    ) -> Application {
        let now = util::now();
        Application {
            id: Uuid::new_v4(),
            vacancy: vacancy.id,
            vacancy_owner: vacancy.owner,
            applicant: applicant.user,
            applicant_email: applicant.email.clone(),
            name: data.name.trim().to_string(),
            phone: data.phone,
            cover_letter: data.cover_letter,
            resume_url: data.resume_url,
            status: ApplicationStatus::Pending,
            created: now,
            updated: now,
            revision: 0,
        }
    }

    /// The applicant, the vacancy owner and admins.
    pub fn visible_to(&self, viewer: &UserRoleToken) -> bool {
        viewer.may_manage(self.applicant) || viewer.user == self.vacancy_owner
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApplicationData {
    pub name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub cover_letter: String,
    pub resume_url: Option<String>,
}

impl Validate for ApplicationData {
    fn validate(&self) -> Result<(), Problem> {
        Checks::new()
            .required("name", &self.name)
            .optional_phone("phone", &self.phone)
            .text("cover_letter", &self.cover_letter)
            .optional_url("resume_url", &self.resume_url)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status: ApplicationStatus,
}

fn decode_application(document: bson::Document) -> StoreResult<Application> {
    Ok(bson::from_document(document)?)
}

fn field_query(field: &str, id: Uuid) -> Query {
    Query::new()
        .eq(field, id.to_string())
        .sort("created", Order::Descending)
}

#[rocket::async_trait]
pub trait ApplicationDbExt {
    async fn insert_application(&self, application: &Application) -> Result<(), Problem>;

    async fn get_application(&self, id: Uuid) -> StoreResult<Option<Application>>;

    async fn applications_for_vacancy(
        &self,
        vacancy: Uuid,
        page: PageState,
    ) -> StoreResult<Page<Application>>;

    async fn applications_of(
        &self,
        applicant: Uuid,
        page: PageState,
    ) -> StoreResult<Page<Application>>;

    /// `None` if the application doesn't exist.
    async fn set_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, Problem>;

    async fn delete_application(&self, id: Uuid) -> StoreResult<Option<Application>>;

    /// Removes applications sent to any vacancy of `owner`.
    async fn delete_applications_received(&self, owner: Uuid) -> StoreResult<u64>;

    async fn delete_applications_of(&self, applicant: Uuid) -> StoreResult<u64>;
}

async fn application_page(
    db: &(dyn Store + 'static),
    query: Query,
    page: PageState,
) -> StoreResult<Page<Application>> {
    let total = db.count(APPLICATION_COLLECTION_NAME, &query).await?;
    let items = db
        .find(
            APPLICATION_COLLECTION_NAME,
            &query,
            Window {
                skip: page.skip(),
                limit: page.limit(),
            },
        )
        .await?
        .into_iter()
        .map(decode_application)
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Page::new(items, page, total))
}

#[rocket::async_trait]
impl ApplicationDbExt for dyn Store {
    async fn insert_application(&self, application: &Application) -> Result<(), Problem> {
        let document = bson::to_document(application).map_err(StoreError::from)?;
        match self.insert(APPLICATION_COLLECTION_NAME, document).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate { .. }) => Err(Problem::new_untyped(
                Status::BadRequest,
                "You have already applied to this vacancy.",
            )
            .insert_str("vacancy", application.vacancy)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
        self.find_one(APPLICATION_COLLECTION_NAME, &Query::by_id(id))
            .await?
            .map(decode_application)
            .transpose()
    }

    async fn applications_for_vacancy(
        &self,
        vacancy: Uuid,
        page: PageState,
    ) -> StoreResult<Page<Application>> {
        application_page(self, field_query("vacancy", vacancy), page).await
    }

    async fn applications_of(
        &self,
        applicant: Uuid,
        page: PageState,
    ) -> StoreResult<Page<Application>> {
        application_page(self, field_query("applicant", applicant), page).await
    }

    async fn set_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, Problem> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut application = match self.get_application(id).await? {
                Some(it) => it,
                None => return Ok(None),
            };

            let expected = application.revision;
            application.status = status;
            application.revision = expected + 1;
            application.updated = util::now();

            let document = bson::to_document(&application).map_err(StoreError::from)?;
            if self
                .replace(APPLICATION_COLLECTION_NAME, id, expected, document)
                .await?
            {
                return Ok(Some(application));
            }
        }

        Err(problems::conflict(
            "Application was modified by another request. Try again.",
        ))
    }

    async fn delete_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
        self.delete_one(APPLICATION_COLLECTION_NAME, &Query::by_id(id))
            .await?
            .map(decode_application)
            .transpose()
    }

    async fn delete_applications_received(&self, owner: Uuid) -> StoreResult<u64> {
        self.delete_many(
            APPLICATION_COLLECTION_NAME,
            &Query::new().eq("vacancy_owner", owner.to_string()),
        )
        .await
    }

    async fn delete_applications_of(&self, applicant: Uuid) -> StoreResult<u64> {
        self.delete_many(
            APPLICATION_COLLECTION_NAME,
            &Query::new().eq("applicant", applicant.to_string()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::MemoryStore;
    use crate::data::user::User;
    use crate::data::vacancy::tests::example_vacancy;
    use crate::role::Role;
    use chrono::Duration;

    fn token(role: Role) -> UserRoleToken {
        let user = User::new("Asha Rao", "asha@example.com", "password1", role, 4);
        UserRoleToken::new(&user, Duration::hours(1))
    }

    fn data() -> ApplicationData {
        ApplicationData {
            name: "Asha Rao".to_string(),
            phone: None,
            cover_letter: "I teach physics.".to_string(),
            resume_url: Some("https://example.com/cv.pdf".to_string()),
        }
    }

    #[rocket::async_test]
    async fn one_application_per_vacancy() {
        let db = MemoryStore::shared();
        db.ensure_unique(APPLICATION_COLLECTION_NAME, &APPLICATION_UNIQUE_KEY)
            .await
            .unwrap();

        let school = token(Role::School);
        let teacher = token(Role::Teacher);
        let vacancy = Record::new(&school, example_vacancy(), true);

        let first = Application::new(&vacancy, &teacher, data());
        db.insert_application(&first).await.unwrap();

        let second = Application::new(&vacancy, &teacher, data());
        let problem = db.insert_application(&second).await.unwrap_err();
        assert_eq!(problem.status, Status::BadRequest);

        let page = db
            .applications_for_vacancy(vacancy.id, PageState::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(first.visible_to(&school));
        assert!(first.visible_to(&teacher));
        assert!(!first.visible_to(&token(Role::Teacher)));
    }

    #[rocket::async_test]
    async fn status_changes_bump_revision() {
        let db = MemoryStore::shared();
        let vacancy = Record::new(&token(Role::Coaching), example_vacancy(), true);
        let application = Application::new(&vacancy, &token(Role::NonTeacher), data());
        db.insert_application(&application).await.unwrap();

        let changed = db
            .set_application_status(application.id, ApplicationStatus::Shortlisted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(changed.status, ApplicationStatus::Shortlisted);
        assert_eq!(changed.revision, 1);

        assert!(db
            .set_application_status(Uuid::new_v4(), ApplicationStatus::Hired)
            .await
            .unwrap()
            .is_none());

        assert_eq!(db.delete_applications_received(vacancy.owner).await.unwrap(), 1);
    }
}
