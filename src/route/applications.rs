use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use super::listing::not_found;
use crate::data::application::{
    Application, ApplicationData, ApplicationDbExt, StatusChange,
};
use crate::data::record::RecordDbExt;
use crate::data::store::Db;
use crate::data::vacancy::Vacancy;
use crate::data::validate::Validate;
use crate::middleware::paging::{Page, PageState};
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};

#[inline]
fn application_not_found(id: Uuid) -> Problem {
    problems::not_found("Application", id)
}

/// Apply to a vacancy
#[utoipa::path(
    post,
    path = "/vacancies/{id}/applications",
    params(("id" = Uuid, Path, description = "Vacancy id")),
    request_body = ApplicationData,
    responses(
        (status = 200, description = "Submitted application", body = Application),
        (status = 400, description = "Invalid data, closed vacancy or already applied", body = Problem),
        (status = 403, description = "Only teachers and non-teaching staff can apply", body = Problem),
        (status = 404, description = "Unknown vacancy", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/vacancies/<id>/applications", format = "json", data = "<data>")]
#[tracing::instrument(skip(db))]
pub async fn application_create(
    id: Uuid,
    data: Json<ApplicationData>,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<Application>, Problem> {
    let auth = auth?;
    if !auth.role.is_staff() {
        return Err(problems::forbidden(
            "Only teachers and non-teaching staff can apply to vacancies.",
        ));
    }

    data.validate()?;

    let vacancy = db
        .get_record::<Vacancy>(id)
        .await?
        .filter(|vacancy| vacancy.is_approved)
        .ok_or_else(|| not_found::<Vacancy>(id))?;

    if !vacancy.body.accepts_applications() {
        return Err(Problem::new_untyped(
            Status::BadRequest,
            "Vacancy isn't accepting applications.",
        )
        .insert_str("vacancy", id));
    }

    let application = Application::new(&vacancy, &auth, data.into_inner());
    db.insert_application(&application).await?;
    tracing::info!("{} applied to vacancy {}", auth.user, id);

    Ok(Json(application))
}

/// Applications received by a vacancy
#[utoipa::path(
    get,
    path = "/vacancies/{id}/applications",
    params(("id" = Uuid, Path, description = "Vacancy id")),
    responses(
        (status = 200, description = "Page of applications"),
        (status = 403, description = "Not the vacancy owner", body = Problem),
        (status = 404, description = "Unknown vacancy", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/vacancies/<id>/applications")]
#[tracing::instrument(skip(db))]
pub async fn application_list_for_vacancy(
    id: Uuid,
    page: PageState,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<Page<Application>>, Problem> {
    let auth = auth?;
    let vacancy = db
        .get_record::<Vacancy>(id)
        .await?
        .ok_or_else(|| not_found::<Vacancy>(id))?;

    if !auth.may_manage(vacancy.owner) {
        return Err(problems::forbidden(
            "Only the vacancy owner can see its applications.",
        ));
    }

    Ok(Json(db.applications_for_vacancy(id, page).await?))
}

/// Applications sent by the caller
#[utoipa::path(
    get,
    path = "/applications/mine",
    responses((status = 200, description = "Page of applications")),
    security(("jwt" = []))
)]
#[get("/applications/mine")]
#[tracing::instrument(skip(db))]
pub async fn application_mine(
    page: PageState,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<Page<Application>>, Problem> {
    Ok(Json(db.applications_of(auth?.user, page).await?))
}

#[utoipa::path(
    get,
    path = "/applications/{id}",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, body = Application),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/applications/<id>")]
#[tracing::instrument(skip(db))]
pub async fn application_get(
    id: Uuid,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<Application>, Problem> {
    let auth = auth?;
    let application = db
        .get_application(id)
        .await?
        .ok_or_else(|| application_not_found(id))?;

    if !application.visible_to(&auth) {
        return Err(problems::forbidden(
            "Only the applicant and the vacancy owner can see an application.",
        ));
    }

    Ok(Json(application))
}

/// Move an application through the hiring pipeline
#[utoipa::path(
    put,
    path = "/applications/{id}/status",
    params(("id" = Uuid, Path, description = "Application id")),
    request_body = StatusChange,
    responses(
        (status = 200, body = Application),
        (status = 403, description = "Not the vacancy owner", body = Problem),
        (status = 404, body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/applications/<id>/status", format = "json", data = "<change>")]
#[tracing::instrument(skip(db))]
pub async fn application_status(
    id: Uuid,
    change: Json<StatusChange>,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<Json<Application>, Problem> {
    let auth = auth?;
    let application = db
        .get_application(id)
        .await?
        .ok_or_else(|| application_not_found(id))?;

    if !auth.may_manage(application.vacancy_owner) {
        return Err(problems::forbidden(
            "Only the vacancy owner can change an application's status.",
        ));
    }

    db.set_application_status(id, change.status)
        .await?
        .map(Json)
        .ok_or_else(|| application_not_found(id))
}

/// Withdraw an application
#[utoipa::path(
    delete,
    path = "/applications/{id}",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "Id of the withdrawn application", body = String),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/applications/<id>")]
#[tracing::instrument(skip(db))]
pub async fn application_delete(
    id: Uuid,
    auth: Result<UserRoleToken, Problem>,
    db: &State<Db>,
) -> Result<String, Problem> {
    let auth = auth?;
    let application = db
        .get_application(id)
        .await?
        .ok_or_else(|| application_not_found(id))?;

    if !auth.may_manage(application.applicant) {
        return Err(problems::forbidden("Only the applicant can withdraw an application."));
    }

    db.delete_application(id)
        .await?
        .map(|removed| removed.id.to_string())
        .ok_or_else(|| application_not_found(id))
}
