//! Handlers shared by every listing kind.
//!
//! The functions here carry the actual behavior; [`listing_routes!`] stamps out
//! the rocket routes of one entity and delegates to them.

use rocket::http::Status;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::data::record::{newest_first, owner_query, ListFilter, Listing, Record, RecordDbExt};
use crate::data::store::{Query, Store};
use crate::data::validate::Validate;
use crate::middleware::paging::{Page, PageState};
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::{problems, Problem};

/// Body of the admin moderation endpoints.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct Flag {
    pub value: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Moderation {
    Approve,
    Verify,
}

#[inline]
pub fn not_found<T: Listing>(id: Uuid) -> Problem {
    problems::not_found(T::NAME, id)
}

pub async fn list<T: Listing, F: ListFilter>(
    db: &(dyn Store + 'static),
    viewer: Option<&UserRoleToken>,
    filter: &F,
    page: PageState,
) -> Result<Page<Record<T>>, Problem> {
    let mut query = filter.narrow(Query::new());
    if let Some(term) = filter.term() {
        query = query.search(T::SEARCH_FIELDS, term);
    }

    let is_admin = viewer.map(UserRoleToken::is_admin).unwrap_or(false);
    query = if is_admin {
        query.eq_if("is_approved", filter.approved())
    } else {
        query.eq("is_approved", true)
    };

    Ok(db.find_records::<T>(&newest_first(query), page).await?)
}

pub async fn mine<T: Listing>(
    db: &(dyn Store + 'static),
    auth: &UserRoleToken,
    page: PageState,
) -> Result<Page<Record<T>>, Problem> {
    Ok(db
        .find_records::<T>(&newest_first(owner_query(auth.user)), page)
        .await?)
}

pub async fn get<T: Listing>(
    db: &(dyn Store + 'static),
    viewer: Option<&UserRoleToken>,
    id: Uuid,
) -> Result<Record<T>, Problem> {
    db.get_record::<T>(id)
        .await?
        .filter(|record| record.visible_to(viewer))
        .ok_or_else(|| not_found::<T>(id))
}

pub async fn create<T: Listing>(
    db: &(dyn Store + 'static),
    config: &Config,
    auth: &UserRoleToken,
    payload: T::Payload,
) -> Result<Record<T>, Problem> {
    if !auth.is_admin() && !T::may_create(auth.role) {
        return Err(problems::forbidden(format!(
            "Accounts of type '{}' can't create a {}.",
            auth.role,
            T::NAME.to_lowercase()
        )));
    }

    payload.validate()?;
    T::validate_new(&payload)?;

    if T::ONE_PER_OWNER && db.count_records::<T>(&owner_query(auth.user)).await? > 0 {
        return Err(
            Problem::new_untyped(Status::BadRequest, format!("{} already exists.", T::NAME))
                .detail("Only one can be created per account. Update the existing one instead."),
        );
    }

    let record = Record::new(
        auth,
        T::from_payload(payload),
        config.auto_approve || auth.is_admin(),
    );
    db.insert_record(&record).await?;
    tracing::info!("{} {} created by {}", T::NAME, record.id, auth.user);

    Ok(record)
}

pub async fn update<T: Listing>(
    db: &(dyn Store + 'static),
    auth: &UserRoleToken,
    id: Uuid,
    payload: T::Payload,
) -> Result<Record<T>, Problem> {
    payload.validate()?;

    db.update_record::<T, _>(id, |record| {
        if !auth.may_manage(record.owner) {
            return Err(problems::forbidden("Only the owner can change this listing."));
        }
        record.body.apply(payload.clone());
        Ok(())
    })
    .await?
    .ok_or_else(|| not_found::<T>(id))
}

/// Deletes a record and whatever depends on it. Returns the deleted record.
pub async fn delete<T: Listing>(
    db: &(dyn Store + 'static),
    auth: &UserRoleToken,
    id: Uuid,
) -> Result<Record<T>, Problem> {
    let record = db
        .get_record::<T>(id)
        .await?
        .ok_or_else(|| not_found::<T>(id))?;

    if !auth.may_manage(record.owner) {
        return Err(problems::forbidden("Only the owner can delete this listing."));
    }

    let removed = db
        .delete_record::<T>(id)
        .await?
        .ok_or_else(|| not_found::<T>(id))?;

    for (collection, query) in T::dependents(id) {
        let count = db.delete_many(collection, &query).await?;
        tracing::debug!("removed {} dependent documents from {}", count, collection);
    }
    tracing::info!("{} {} deleted by {}", T::NAME, id, auth.user);

    Ok(removed)
}

pub async fn moderate<T: Listing>(
    db: &(dyn Store + 'static),
    auth: &UserRoleToken,
    id: Uuid,
    moderation: Moderation,
    value: bool,
) -> Result<Record<T>, Problem> {
    if !auth.is_admin() {
        return Err(problems::forbidden("Only admins can moderate listings."));
    }

    let record = db
        .update_record::<T, _>(id, |record| {
            match moderation {
                Moderation::Approve => record.is_approved = value,
                Moderation::Verify => record.is_verified = value,
            }
            Ok(())
        })
        .await?
        .ok_or_else(|| not_found::<T>(id))?;
    tracing::info!("{} {}: {:?} = {}", T::NAME, id, moderation, value);

    Ok(record)
}

/// Generates `pub mod $module` holding the routes of one listing kind plus a
/// `routes()` function, for mounting at the kind's base path.
macro_rules! listing_routes {
    ($module:ident, $listing:ty, $filter:ty) => {
        pub mod $module {
            use rocket::serde::json::Json;
            use rocket::State;
            use uuid::Uuid;

            use $crate::config::Config;
            use $crate::data::record::{Listing, Record};
            use $crate::data::store::Db;
            use $crate::middleware::paging::{Page, PageState};
            use $crate::resp::jwt::UserRoleToken;
            use $crate::resp::problem::Problem;
            use $crate::route::listing::{self, Flag, Moderation};

            type Payload = <$listing as Listing>::Payload;

            #[rocket::get("/?<filter..>")]
            #[tracing::instrument(skip(db))]
            pub async fn list(
                filter: $filter,
                page: PageState,
                auth: Option<UserRoleToken>,
                db: &State<Db>,
            ) -> Result<Json<Page<Record<$listing>>>, Problem> {
                listing::list::<$listing, _>(db.inner().as_ref(), auth.as_ref(), &filter, page)
                    .await
                    .map(Json)
            }

            #[rocket::get("/mine")]
            #[tracing::instrument(skip(db))]
            pub async fn mine(
                page: PageState,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
            ) -> Result<Json<Page<Record<$listing>>>, Problem> {
                listing::mine::<$listing>(db.inner().as_ref(), &auth?, page)
                    .await
                    .map(Json)
            }

            #[rocket::get("/<id>")]
            #[tracing::instrument(skip(db))]
            pub async fn get(
                id: Uuid,
                auth: Option<UserRoleToken>,
                db: &State<Db>,
            ) -> Result<Json<Record<$listing>>, Problem> {
                listing::get::<$listing>(db.inner().as_ref(), auth.as_ref(), id)
                    .await
                    .map(Json)
            }

            #[rocket::post("/", format = "json", data = "<payload>")]
            #[tracing::instrument(skip(db, config))]
            pub async fn create(
                payload: Json<Payload>,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
                config: &State<Config>,
            ) -> Result<Json<Record<$listing>>, Problem> {
                listing::create::<$listing>(db.inner().as_ref(), config, &auth?, payload.into_inner())
                    .await
                    .map(Json)
            }

            #[rocket::put("/<id>", format = "json", data = "<payload>")]
            #[tracing::instrument(skip(db))]
            pub async fn update(
                id: Uuid,
                payload: Json<Payload>,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
            ) -> Result<Json<Record<$listing>>, Problem> {
                listing::update::<$listing>(db.inner().as_ref(), &auth?, id, payload.into_inner())
                    .await
                    .map(Json)
            }

            #[rocket::delete("/<id>")]
            #[tracing::instrument(skip(db))]
            pub async fn delete(
                id: Uuid,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
            ) -> Result<String, Problem> {
                listing::delete::<$listing>(db.inner().as_ref(), &auth?, id)
                    .await
                    .map(|removed| removed.id.to_string())
            }

            #[rocket::put("/<id>/approve", format = "json", data = "<flag>")]
            #[tracing::instrument(skip(db))]
            pub async fn approve(
                id: Uuid,
                flag: Json<Flag>,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
            ) -> Result<Json<Record<$listing>>, Problem> {
                listing::moderate::<$listing>(
                    db.inner().as_ref(),
                    &auth?,
                    id,
                    Moderation::Approve,
                    flag.value,
                )
                .await
                .map(Json)
            }

            #[rocket::put("/<id>/verify", format = "json", data = "<flag>")]
            #[tracing::instrument(skip(db))]
            pub async fn verify(
                id: Uuid,
                flag: Json<Flag>,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
            ) -> Result<Json<Record<$listing>>, Problem> {
                listing::moderate::<$listing>(
                    db.inner().as_ref(),
                    &auth?,
                    id,
                    Moderation::Verify,
                    flag.value,
                )
                .await
                .map(Json)
            }

            pub fn routes() -> Vec<rocket::Route> {
                rocket::routes![list, mine, get, create, update, delete, approve, verify]
            }
        }
    };
}

#[cfg(test)]
mod listing_endpoints {
    use rocket::http::Status;
    use serde_json::json;

    use chrono::{Duration, Utc};

    use crate::data::record::{Record, RecordDbExt};
    use crate::data::store::Db;
    use crate::data::teacher::tests::example_teacher;
    use crate::data::teacher::Teacher;
    use crate::data::tuition::tests::example_post;
    use crate::data::tuition::TuitionMode;
    use crate::data::vacancy::tests::example_vacancy;
    use crate::data::vacancy::Vacancy;
    use crate::role::Role;
    use crate::route::testing::{client, get_json, post_json, put_json, signup};

    #[rocket::async_test]
    async fn new_listing_waits_for_approval() {
        let client = client().await;
        let (teacher, _) = signup(&client, "asha", Role::Teacher).await;
        let (admin, _) = signup(&client, "admin", Role::Teacher).await;

        let response = post_json(&client, "/api/v1/teachers", &teacher, &example_teacher()).await;
        assert_eq!(response.status(), Status::Ok);
        let record: Record<Teacher> = response.into_json().await.unwrap();
        assert!(!record.is_approved);
        let uri = format!("/api/v1/teachers/{}", record.id);

        let (_, page) = get_json(&client, "/api/v1/teachers", None).await;
        assert_eq!(page["total"], 0);
        let (status, _) = get_json(&client, &uri, None).await;
        assert_eq!(status, Status::NotFound);
        let (status, _) = get_json(&client, &uri, Some(&teacher)).await;
        assert_eq!(status, Status::Ok);

        let (_, pending) = get_json(&client, "/api/v1/teachers?approved=false", Some(&admin)).await;
        assert_eq!(pending["total"], 1);

        let approve = put_json(
            &client,
            format!("{}/approve", uri),
            &admin,
            &json!({"value": true}),
        )
        .await;
        assert_eq!(approve.status(), Status::Ok);

        let (status, body) = get_json(&client, &uri, None).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body["is_approved"], true);
        assert_eq!(body["name"], "Asha Rao");
        let (_, page) = get_json(&client, "/api/v1/teachers", None).await;
        assert_eq!(page["total"], 1);
    }

    #[rocket::async_test]
    async fn moderation_is_for_admins() {
        let client = client().await;
        let (teacher, _) = signup(&client, "asha", Role::Teacher).await;

        let response = post_json(&client, "/api/v1/teachers", &teacher, &example_teacher()).await;
        let record: Record<Teacher> = response.into_json().await.unwrap();

        let response = put_json(
            &client,
            format!("/api/v1/teachers/{}/verify", record.id),
            &teacher,
            &json!({"value": true}),
        )
        .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn profile_kind_must_match_role() {
        let client = client().await;
        let (parent, _) = signup(&client, "sunita", Role::Parent).await;

        let response = post_json(&client, "/api/v1/teachers", &parent, &example_teacher()).await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn one_profile_per_account() {
        let client = client().await;
        let (teacher, _) = signup(&client, "asha", Role::Teacher).await;

        let first = post_json(&client, "/api/v1/teachers", &teacher, &example_teacher()).await;
        assert_eq!(first.status(), Status::Ok);
        let second = post_json(&client, "/api/v1/teachers", &teacher, &example_teacher()).await;
        assert_eq!(second.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn invalid_payload_lists_fields() {
        let client = client().await;
        let (teacher, _) = signup(&client, "asha", Role::Teacher).await;

        let mut body = example_teacher();
        body.email = "not-an-email".to_string();
        let response = post_json(&client, "/api/v1/teachers", &teacher, &body).await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn only_owner_changes_listing() {
        let client = client().await;
        let (owner, _) = signup(&client, "asha", Role::Teacher).await;
        let (other, _) = signup(&client, "ravi", Role::Teacher).await;

        let response = post_json(&client, "/api/v1/teachers", &owner, &example_teacher()).await;
        let record: Record<Teacher> = response.into_json().await.unwrap();
        let uri = format!("/api/v1/teachers/{}", record.id);

        let mut changed = example_teacher();
        changed.city = "Mumbai".to_string();

        let denied = put_json(&client, &uri, &other, &changed).await;
        assert_eq!(denied.status(), Status::Forbidden);
        let deleted = client.delete(uri.as_str()).cookie(other).dispatch().await;
        assert_eq!(deleted.status(), Status::Forbidden);

        let updated = put_json(&client, &uri, &owner, &changed).await;
        assert_eq!(updated.status(), Status::Ok);
        let updated: Record<Teacher> = updated.into_json().await.unwrap();
        assert_eq!(updated.body.city, "Mumbai");
        assert_eq!(updated.revision, record.revision + 1);

        let deleted = client.delete(uri.as_str()).cookie(owner.clone()).dispatch().await;
        assert_eq!(deleted.status(), Status::Ok);
        let (status, _) = get_json(&client, &uri, Some(&owner)).await;
        assert_eq!(status, Status::NotFound);
    }

    #[rocket::async_test]
    async fn listings_are_searchable() {
        let client = client().await;
        let (admin, _) = signup(&client, "admin", Role::Teacher).await;

        // admin-created listings skip the moderation queue
        let response = post_json(&client, "/api/v1/teachers", &admin, &example_teacher()).await;
        assert_eq!(response.status(), Status::Ok);

        let (_, found) = get_json(&client, "/api/v1/teachers?q=physics", None).await;
        assert_eq!(found["total"], 1);
        let (_, found) = get_json(&client, "/api/v1/teachers?city=PUNE", None).await;
        assert_eq!(found["total"], 1);
        let (_, missing) = get_json(&client, "/api/v1/teachers?city=Mumbai", None).await;
        assert_eq!(missing["total"], 0);

        let (status, mine) = get_json(&client, "/api/v1/teachers/mine", Some(&admin)).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(mine["items"][0]["owner_email"], "admin@example.com");
    }

    #[rocket::async_test]
    async fn listings_page_with_short_aliases() {
        let client = client().await;
        let (admin, _) = signup(&client, "admin", Role::Teacher).await;
        for _ in 0..3 {
            let response =
                post_json(&client, "/api/v1/home-tuition", &admin, &example_post()).await;
            assert_eq!(response.status(), Status::Ok);
        }

        let (status, page) = get_json(&client, "/api/v1/home-tuition?p=1&l=2", None).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(page["page"], 1);
        assert_eq!(page["page_length"], 2);
        assert_eq!(page["total"], 3);
        assert_eq!(page["pages"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);

        let (_, page) = get_json(&client, "/api/v1/home-tuition?page=0&len=2", None).await;
        assert_eq!(page["items"].as_array().unwrap().len(), 2);

        // capped at the configured maximum of 50
        let (_, page) = get_json(&client, "/api/v1/home-tuition?len=500", None).await;
        assert_eq!(page["page_length"], 50);
        assert_eq!(page["items"].as_array().unwrap().len(), 3);
    }

    #[rocket::async_test]
    async fn tuition_filters_by_mode_and_budget() {
        let client = client().await;
        let (admin, _) = signup(&client, "admin", Role::Teacher).await;

        let at_home = example_post();
        let mut online = example_post();
        online.mode = TuitionMode::Online;
        online.budget_per_month = Some(2500);
        let mut unpriced = example_post();
        unpriced.mode = TuitionMode::Either;
        unpriced.budget_per_month = None;
        for post in [&at_home, &online, &unpriced] {
            let response = post_json(&client, "/api/v1/home-tuition", &admin, post).await;
            assert_eq!(response.status(), Status::Ok);
        }

        let (_, found) = get_json(&client, "/api/v1/home-tuition?mode=online", None).await;
        assert_eq!(found["total"], 1);
        assert_eq!(found["items"][0]["budget_per_month"], 2500);
        let (_, found) = get_json(&client, "/api/v1/home-tuition?mode=at_home", None).await;
        assert_eq!(found["total"], 1);
        assert_eq!(found["items"][0]["mode"], "at_home");

        let (_, found) = get_json(&client, "/api/v1/home-tuition?max_budget=3000", None).await;
        assert_eq!(found["total"], 1);
        assert_eq!(found["items"][0]["mode"], "online");
        let (_, found) = get_json(&client, "/api/v1/home-tuition?max_budget=4000", None).await;
        assert_eq!(found["total"], 2);
        let (_, found) =
            get_json(&client, "/api/v1/home-tuition?max_budget=5000&mode=at_home", None).await;
        assert_eq!(found["total"], 1);
    }

    #[rocket::async_test]
    async fn expired_vacancy_can_still_be_closed() {
        let client = client().await;
        let (school, _) = signup(&client, "greenvalley", Role::School).await;
        let yesterday = Some(Utc::now().date_naive() - Duration::days(1));

        let mut expired = example_vacancy();
        expired.deadline = yesterday;
        let refused = post_json(&client, "/api/v1/vacancies", &school, &expired).await;
        assert_eq!(refused.status(), Status::BadRequest);

        let created = post_json(&client, "/api/v1/vacancies", &school, &example_vacancy()).await;
        assert_eq!(created.status(), Status::Ok);
        let record: Record<Vacancy> = created.into_json().await.unwrap();

        // the deadline passes while the vacancy is listed
        let db = client.rocket().state::<Db>().unwrap();
        db.update_record::<Vacancy, _>(record.id, |stored| {
            stored.body.deadline = yesterday;
            Ok(())
        })
        .await
        .unwrap()
        .unwrap();

        let mut closed = expired.clone();
        closed.is_open = false;
        let response = put_json(
            &client,
            format!("/api/v1/vacancies/{}", record.id),
            &school,
            &closed,
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let updated: Record<Vacancy> = response.into_json().await.unwrap();
        assert!(!updated.body.is_open);
        assert_eq!(updated.body.deadline, yesterday);
    }
}
