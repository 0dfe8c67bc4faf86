use std::borrow::Cow;

use rocket::FromForm;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{normalize_email, User, USER_COLLECTION_NAME};
use crate::data::store::{Query, Store, StoreResult, Window};
use crate::data::validate;
use crate::error::StoreError;
use crate::middleware::paging::{Page, PageState};
use crate::resp::problem::Problem;
use crate::role::Role;

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad email.")
            .insert_str("email", email)
            .detail(detail)
    }

    #[inline]
    pub fn bad_name(name: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad name.")
            .insert_str("name", name)
            .detail(detail)
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad password.").detail(detail)
    }

    #[inline]
    pub fn bad_role(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad role.").detail(detail)
    }

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "User doesn't exist.").insert("id", id.to_string())
    }

    #[inline]
    pub fn bad_login() -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Bad email or password.")
    }
}

#[derive(Clone, FromForm, ToSchema)]
pub struct UserSignupData<'r> {
    pub name: Cow<'r, str>,
    #[schema(format = "email")]
    pub email: Cow<'r, str>,
    #[schema(format = "password")]
    pub password: Cow<'r, str>,
    pub role: Role,
}

impl std::fmt::Debug for UserSignupData<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSignupInfo:{}", self.email)
    }
}

impl UserSignupData<'_> {
    pub fn validate(&self) -> Result<(), Problem> {
        if !validate::is_email(&self.email) {
            return Err(problem::bad_email(
                self.email.to_string(),
                "Not a valid e-mail address.",
            ));
        }

        let name = self.name.trim();
        if name.chars().count() < 2 {
            return Err(problem::bad_name(
                self.name.to_string(),
                "Name must be at least 2 characters long.",
            ));
        }

        if name.chars().count() > 80 {
            return Err(problem::bad_name(
                self.name.to_string(),
                "Name can't be longer than 80 characters.",
            ));
        }

        if self.password.len() < 8 {
            return Err(problem::bad_password(
                "Password must be at least 8 characters (bytes) long.",
            ));
        }

        if self.password.len() > 1024 {
            return Err(problem::bad_password(
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }

        if self.role.is_admin() {
            return Err(problem::bad_role("The admin role can't be requested at signup."));
        }

        Ok(())
    }
}

#[derive(Clone, FromForm, ToSchema)]
pub struct UserLoginData {
    #[schema(format = "email")]
    pub email: String,
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for UserLoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserLoginInfo:{}", self.email)
    }
}

impl UserLoginData {
    pub fn validate(&self) -> Result<(), Problem> {
        if !validate::is_email(&self.email) || self.password.len() < 8 || self.password.len() > 1024
        {
            return Err(problem::bad_login());
        }

        Ok(())
    }
}

fn decode_user(document: bson::Document) -> StoreResult<User> {
    Ok(bson::from_document(document)?)
}

#[rocket::async_trait]
pub trait UserDbExt {
    async fn create_user(&self, user: &User) -> Result<(), Problem>;

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self, role: Option<Role>, page: PageState) -> StoreResult<Page<User>>;

    async fn count_users(&self, role: Option<Role>) -> StoreResult<u64>;

    /// Returns `false` if the user is gone or changed concurrently.
    async fn save_user(&self, user: &User) -> StoreResult<bool>;

    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<User>>;
}

fn role_query(role: Option<Role>) -> Query {
    match role {
        Some(role) => Query::new().eq("role", role.as_str()),
        None => Query::new(),
    }
}

#[rocket::async_trait]
impl UserDbExt for dyn Store {
    async fn create_user(&self, user: &User) -> Result<(), Problem> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(problem::bad_email(&user.email, "Email already registered."));
        }

        let mut document = bson::to_document(user).map_err(StoreError::from)?;
        document.insert("revision", 0_i64);
        match self.insert(USER_COLLECTION_NAME, document).await {
            Ok(()) => Ok(()),
            // lost a race with a concurrent signup for the same address
            Err(StoreError::Duplicate { .. }) => {
                Err(problem::bad_email(&user.email, "Email already registered."))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.find_one(USER_COLLECTION_NAME, &Query::by_id(id))
            .await?
            .map(decode_user)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one(
            USER_COLLECTION_NAME,
            &Query::new().eq("email", normalize_email(email)),
        )
        .await?
        .map(decode_user)
        .transpose()
    }

    async fn list_users(&self, role: Option<Role>, page: PageState) -> StoreResult<Page<User>> {
        let query = role_query(role).sort("created", crate::data::store::Order::Descending);
        let total = self.count(USER_COLLECTION_NAME, &query).await?;
        let users = self
            .find(
                USER_COLLECTION_NAME,
                &query,
                Window {
                    skip: page.skip(),
                    limit: page.limit(),
                },
            )
            .await?
            .into_iter()
            .map(decode_user)
            .collect::<StoreResult<Vec<User>>>()?;

        Ok(Page::new(users, page, total))
    }

    async fn count_users(&self, role: Option<Role>) -> StoreResult<u64> {
        self.count(USER_COLLECTION_NAME, &role_query(role)).await
    }

    async fn save_user(&self, user: &User) -> StoreResult<bool> {
        let revision = match self
            .find_one(USER_COLLECTION_NAME, &Query::by_id(user.id))
            .await?
        {
            Some(existing) => existing.get_i64("revision").unwrap_or(0),
            None => return Ok(false),
        };

        let mut document = bson::to_document(user)?;
        document.insert("revision", revision + 1);

        self.replace(USER_COLLECTION_NAME, user.id, revision, document)
            .await
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.delete_one(USER_COLLECTION_NAME, &Query::by_id(id))
            .await?
            .map(decode_user)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &'static str, password: &'static str, role: Role) -> UserSignupData<'static> {
        UserSignupData {
            name: Cow::Borrowed("Asha Rao"),
            email: Cow::Borrowed(email),
            password: Cow::Borrowed(password),
            role,
        }
    }

    #[test]
    fn signup_validation() {
        assert!(signup("asha@example.com", "password1", Role::Teacher)
            .validate()
            .is_ok());
        assert!(signup("asha.example.com", "password1", Role::Teacher)
            .validate()
            .is_err());
        assert!(signup("asha@example.com", "short", Role::Teacher)
            .validate()
            .is_err());
        assert!(signup("asha@example.com", "password1", Role::Admin)
            .validate()
            .is_err());
    }
}
