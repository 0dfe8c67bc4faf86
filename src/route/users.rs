use rocket::form::Form;
use rocket::http::{CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::config::Config;
use crate::data::application::ApplicationDbExt;
use crate::data::record::owner_query;
use crate::data::store::{Db, Store};
use crate::data::user::db::problem as user_problem;
use crate::data::user::db::{UserDbExt, UserLoginData, UserSignupData};
use crate::data::user::{normalize_email, User, UserResponse};
use crate::data::LISTING_COLLECTIONS;
use crate::resp::jwt::{removal_cookie, token_lifetime, UserRoleToken};
use crate::resp::problem::{problems, Problem};
use crate::role::Role;
use crate::security::Security;

/// Runs password hashing off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, Problem>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    rocket::tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("password hashing task failed: {}", e);
        Problem::new_untyped(Status::InternalServerError, "Unable to process credentials.")
    })
}

fn login_cookie(
    user: &User,
    cookies: &CookieJar<'_>,
    config: &Config,
    security: &Security,
) -> Result<(), Problem> {
    let token = UserRoleToken::new(user, token_lifetime(config));
    cookies.add(token.cookie(&security.jwt_secret, config.cookie_secure)?);
    Ok(())
}

/// Deletes everything `owner` created: listings, applications sent and
/// applications received through the owner's vacancies.
pub async fn delete_owned(db: &(dyn Store + 'static), owner: Uuid) -> Result<u64, Problem> {
    let mut removed = db.delete_applications_received(owner).await?;
    removed += db.delete_applications_of(owner).await?;

    for collection in LISTING_COLLECTIONS {
        removed += db.delete_many(collection, &owner_query(owner)).await?;
    }

    Ok(removed)
}

/// Create a new account and log in
#[utoipa::path(
    post,
    path = "/user",
    request_body(content = UserSignupData, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Created user", body = UserResponse),
        (status = 400, description = "Invalid data or e-mail already registered", body = Problem),
    )
)]
#[post("/user", data = "<signup>")]
#[tracing::instrument(skip(db, config, security))]
pub async fn user_create(
    signup: Form<UserSignupData<'_>>,
    cookies: &CookieJar<'_>,
    db: &State<Db>,
    config: &State<Config>,
    security: &State<Security>,
) -> Result<Json<UserResponse>, Problem> {
    signup.validate()?;
    let email = normalize_email(&signup.email);

    if db.find_user_by_email(&email).await?.is_some() {
        return Err(user_problem::bad_email(email, "Email already registered."));
    }

    let role = if config.is_admin_email(&email) {
        Role::Admin
    } else {
        signup.role
    };
    let (name, password) = (signup.name.to_string(), signup.password.to_string());
    let cost = config.password_cost;
    let user = blocking(move || User::new(name, email, password, role, cost)).await?;

    db.create_user(&user).await?;
    login_cookie(&user, cookies, config, security)?;

    Ok(Json(UserResponse::from(user)))
}

/// Log in with e-mail and password
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = UserLoginData, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Logged in user", body = UserResponse),
        (status = 401, description = "Bad e-mail or password", body = Problem),
    )
)]
#[post("/login", data = "<login>")]
#[tracing::instrument(skip(db, config, security))]
pub async fn login_submit(
    login: Form<UserLoginData>,
    cookies: &CookieJar<'_>,
    db: &State<Db>,
    config: &State<Config>,
    security: &State<Security>,
) -> Result<Json<UserResponse>, Problem> {
    login.validate()?;

    // VULN: no rate limiting of failed attempts
    let user = db
        .find_user_by_email(&login.email)
        .await?
        .ok_or_else(user_problem::bad_login)?;

    let hash = user.pw_hash.clone();
    let password = login.password.clone();
    if !blocking(move || hash.verify(password)).await? {
        return Err(user_problem::bad_login());
    }

    login_cookie(&user, cookies, config, security)?;
    tracing::debug!("user {} logged in", user.id);

    Ok(Json(UserResponse::from(user)))
}

/// Remove the auth cookie
#[utoipa::path(post, path = "/logout", responses((status = 204, description = "Logged out")))]
#[post("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(removal_cookie());
    Status::NoContent
}

/// Current user
#[utoipa::path(
    get,
    path = "/user/me",
    responses(
        (status = 200, body = UserResponse),
        (status = 401, description = "Not logged in", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/user/me")]
#[tracing::instrument(skip(db))]
pub async fn user_me(
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<UserResponse>, Problem> {
    let auth = auth?;
    db.get_user(auth.user)
        .await?
        .map(|user| Json(UserResponse::from(user)))
        .ok_or_else(|| user_problem::not_found(auth.user))
}

/// Get a user
#[utoipa::path(
    get,
    path = "/user/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, body = UserResponse),
        (status = 403, description = "Not the user or an admin", body = Problem),
        (status = 404, description = "Unknown user", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/user/<id>")]
#[tracing::instrument(skip(db))]
pub async fn user_get(
    id: Uuid,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<UserResponse>, Problem> {
    if !auth?.may_manage(id) {
        return Err(problems::forbidden("Only admins can view other accounts."));
    }

    db.get_user(id)
        .await?
        .map(|user| Json(UserResponse::from(user)))
        .ok_or_else(|| user_problem::not_found(id))
}

/// Delete a user and everything they created
#[utoipa::path(
    delete,
    path = "/user/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Id of the deleted user", body = String),
        (status = 403, description = "Not the user or an admin", body = Problem),
        (status = 404, description = "Unknown user", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/user/<id>")]
#[tracing::instrument(skip(db))]
pub async fn user_delete(
    id: Uuid,
    auth: Result<UserRoleToken, Problem>,
    cookies: &CookieJar<'_>,
    db: &State<Db>,
) -> Result<String, Problem> {
    let auth = auth?;
    if !auth.may_manage(id) {
        return Err(problems::forbidden("Only admins can delete other accounts."));
    }

    if db.get_user(id).await?.is_none() {
        return Err(user_problem::not_found(id));
    }

    // the account stays until everything it owns is gone
    let owned = delete_owned(db.inner().as_ref(), id).await?;
    let removed = db
        .delete_user(id)
        .await?
        .ok_or_else(|| user_problem::not_found(id))?;
    tracing::info!("deleted user {} and {} owned documents", id, owned);

    if auth.user == id {
        cookies.remove(removal_cookie());
    }

    Ok(removed.id.to_string())
}
