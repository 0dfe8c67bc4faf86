use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::store::{Db, Query};
use crate::data::user::db::{problem as user_problem, UserDbExt};
use crate::data::user::UserResponse;
use crate::data::LISTING_COLLECTIONS;
use crate::middleware::paging::{Page, PageState};
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};
use crate::role::Role;

fn require_admin(auth: Result<UserRoleToken, Problem>) -> Result<UserRoleToken, Problem> {
    let auth = auth?;
    if !auth.is_admin() {
        return Err(problems::forbidden("Admin access is required."));
    }
    Ok(auth)
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct RoleChange {
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CollectionStats {
    pub total: u64,
    /// Listings waiting for approval.
    pub pending: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Stats {
    pub listings: BTreeMap<String, CollectionStats>,
    /// User count per role.
    pub users: BTreeMap<String, u64>,
    pub total_users: u64,
}

/// List accounts, optionally of one role
#[utoipa::path(
    get,
    path = "/admin/users",
    params(("role" = Option<Role>, Query, description = "Only accounts of this role")),
    responses(
        (status = 200, description = "Page of accounts"),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/users?<role>")]
#[tracing::instrument(skip(db))]
pub async fn admin_users(
    role: Option<Role>,
    page: PageState,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<Page<UserResponse>>, Problem> {
    require_admin(auth)?;

    Ok(Json(db.list_users(role, page).await?.map(UserResponse::from)))
}

/// Change the role of an account
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RoleChange,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Admins can't demote themselves", body = Problem),
        (status = 403, description = "Caller isn't an admin", body = Problem),
        (status = 404, description = "Unknown user", body = Problem),
        (status = 409, description = "Account changed concurrently", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/admin/users/<id>/role", format = "json", data = "<change>")]
#[tracing::instrument(skip(db))]
pub async fn admin_set_role(
    id: Uuid,
    change: Json<RoleChange>,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<UserResponse>, Problem> {
    let auth = require_admin(auth)?;
    if auth.user == id && change.role != Role::Admin {
        return Err(Problem::new_untyped(
            Status::BadRequest,
            "Admins can't remove their own admin role.",
        ));
    }

    let mut user = db
        .get_user(id)
        .await?
        .ok_or_else(|| user_problem::not_found(id))?;
    user.role = change.role;

    if !db.save_user(&user).await? {
        return Err(problems::conflict("The account was changed concurrently."));
    }
    tracing::info!("{} changed role of {} to {}", auth.user, id, user.role);

    Ok(Json(UserResponse::from(user)))
}

/// Counts of accounts and listings for the moderation dashboard
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, body = Stats),
        (status = 403, description = "Caller isn't an admin", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/admin/stats")]
#[tracing::instrument(skip(db))]
pub async fn admin_stats(
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<Stats>, Problem> {
    require_admin(auth)?;

    let mut stats = Stats::default();
    for collection in LISTING_COLLECTIONS {
        let total = db.count(collection, &Query::new()).await?;
        let pending = db
            .count(collection, &Query::new().eq("is_approved", false))
            .await?;
        stats
            .listings
            .insert(collection.to_string(), CollectionStats { total, pending });
    }

    for role in Role::ALL {
        let count = db.count_users(Some(role)).await?;
        stats.users.insert(role.to_string(), count);
        stats.total_users += count;
    }

    Ok(Json(stats))
}

#[cfg(test)]
mod admin_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    use crate::data::teacher::tests::example_teacher;
    use crate::role::Role;
    use crate::route::testing::{client, get_json, post_json, put_json, signup};

    #[rocket::async_test]
    async fn stats_count_pending_listings() {
        let client = client().await;
        let (admin, _) = signup(&client, "admin", Role::Teacher).await;
        let (teacher, _) = signup(&client, "asha", Role::Teacher).await;
        signup(&client, "sunita", Role::Parent).await;

        let created = post_json(&client, "/api/v1/teachers", &teacher, &example_teacher()).await;
        assert_eq!(created.status(), Status::Ok);

        let (status, stats) = get_json(&client, "/api/v1/admin/stats", Some(&admin)).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(stats["listings"]["teachers"]["total"], 1);
        assert_eq!(stats["listings"]["teachers"]["pending"], 1);
        assert_eq!(stats["listings"]["vacancies"]["total"], 0);
        assert_eq!(stats["users"]["admin"], 1);
        assert_eq!(stats["users"]["teacher"], 1);
        assert_eq!(stats["total_users"], 3);

        let (status, _) = get_json(&client, "/api/v1/admin/stats", Some(&teacher)).await;
        assert_eq!(status, Status::Forbidden);
    }

    #[rocket::async_test]
    async fn users_filter_by_role() {
        let client = client().await;
        let (admin, _) = signup(&client, "admin", Role::Teacher).await;
        signup(&client, "asha", Role::Teacher).await;
        signup(&client, "sunita", Role::Parent).await;

        let (status, page) =
            get_json(&client, "/api/v1/admin/users?role=parent", Some(&admin)).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["email"], "sunita@example.com");
        assert!(page["items"][0].get("pw_hash").is_none());

        let (_, page) = get_json(&client, "/api/v1/admin/users", Some(&admin)).await;
        assert_eq!(page["total"], 3);
    }

    #[rocket::async_test]
    async fn role_change_reissues_permissions() {
        let client = client().await;
        let (admin, admin_user) = signup(&client, "admin", Role::Teacher).await;
        let (asha_cookie, asha) = signup(&client, "asha", Role::Teacher).await;

        let response = put_json(
            &client,
            format!("/api/v1/admin/users/{}/role", asha.id),
            &admin,
            &json!({"role": "non_teacher"}),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);

        let (status, me) = get_json(&client, "/api/v1/user/me", Some(&asha_cookie)).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(me["role"], "non_teacher");

        let login = client
            .post("/api/v1/login")
            .header(ContentType::Form)
            .body("email=asha@example.com&password=password123")
            .dispatch()
            .await;
        assert_eq!(login.status(), Status::Ok);
        let body: serde_json::Value = login.into_json().await.unwrap();
        assert_eq!(body["role"], "non_teacher");

        let demote = put_json(
            &client,
            format!("/api/v1/admin/users/{}/role", admin_user.id),
            &admin,
            &json!({"role": "teacher"}),
        )
        .await;
        assert_eq!(demote.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn demoted_admin_loses_access_immediately() {
        let client = client().await;
        let (admin, _) = signup(&client, "admin", Role::Teacher).await;
        let (asha_cookie, asha) = signup(&client, "asha", Role::Teacher).await;

        let promoted = put_json(
            &client,
            format!("/api/v1/admin/users/{}/role", asha.id),
            &admin,
            &json!({"role": "admin"}),
        )
        .await;
        assert_eq!(promoted.status(), Status::Ok);
        let (status, _) = get_json(&client, "/api/v1/admin/stats", Some(&asha_cookie)).await;
        assert_eq!(status, Status::Ok);

        let demoted = put_json(
            &client,
            format!("/api/v1/admin/users/{}/role", asha.id),
            &admin,
            &json!({"role": "teacher"}),
        )
        .await;
        assert_eq!(demoted.status(), Status::Ok);

        let (status, _) = get_json(&client, "/api/v1/admin/stats", Some(&asha_cookie)).await;
        assert_eq!(status, Status::Forbidden);
    }
}
