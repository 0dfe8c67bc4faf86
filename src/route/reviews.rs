use rocket::http::Status;
use uuid::Uuid;

use super::listing::not_found;
use crate::data::record::{Record, RecordDbExt};
use crate::data::review::{ReviewBook, ReviewData, Reviewed};
use crate::data::store::Store;
use crate::data::user::db::UserDbExt;
use crate::data::validate::Validate;
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::Problem;

pub async fn list<T: Reviewed>(
    db: &(dyn Store + 'static),
    viewer: Option<&UserRoleToken>,
    id: Uuid,
) -> Result<ReviewBook, Problem> {
    db.get_record::<T>(id)
        .await?
        .filter(|record| record.visible_to(viewer))
        .map(|record| record.body.reviews().clone())
        .ok_or_else(|| not_found::<T>(id))
}

fn reviewable<T: Reviewed>(record: &Record<T>, auth: &UserRoleToken) -> Result<(), Problem> {
    if !record.visible_to(Some(auth)) {
        return Err(not_found::<T>(record.id));
    }
    Ok(())
}

pub async fn add<T: Reviewed>(
    db: &(dyn Store + 'static),
    auth: &UserRoleToken,
    id: Uuid,
    data: ReviewData,
) -> Result<ReviewBook, Problem> {
    data.validate()?;

    let author_name = match db.get_user(auth.user).await? {
        Some(user) => user.name,
        None => auth.email.clone(),
    };

    let record = db
        .update_record::<T, _>(id, |record| {
            reviewable(record, auth)?;
            if record.owner == auth.user {
                return Err(Problem::new_untyped(
                    Status::Forbidden,
                    "You can't review your own listing.",
                ));
            }
            record
                .body
                .reviews_mut()
                .add(auth.user, &author_name, data.clone())?;
            Ok(())
        })
        .await?
        .ok_or_else(|| not_found::<T>(id))?;
    tracing::debug!("{} {} reviewed by {}", T::NAME, id, auth.user);

    Ok(record.body.reviews().clone())
}

pub async fn edit<T: Reviewed>(
    db: &(dyn Store + 'static),
    auth: &UserRoleToken,
    id: Uuid,
    review: Uuid,
    data: ReviewData,
) -> Result<ReviewBook, Problem> {
    data.validate()?;

    let record = db
        .update_record::<T, _>(id, |record| {
            reviewable(record, auth)?;
            record
                .body
                .reviews_mut()
                .edit(review, auth.user, data.clone())?;
            Ok(())
        })
        .await?
        .ok_or_else(|| not_found::<T>(id))?;

    Ok(record.body.reviews().clone())
}

/// The author or an admin may remove a review.
pub async fn remove<T: Reviewed>(
    db: &(dyn Store + 'static),
    auth: &UserRoleToken,
    id: Uuid,
    review: Uuid,
) -> Result<ReviewBook, Problem> {
    let record = db
        .update_record::<T, _>(id, |record| {
            reviewable(record, auth)?;
            record
                .body
                .reviews_mut()
                .remove(review, auth.user, auth.is_admin())?;
            Ok(())
        })
        .await?
        .ok_or_else(|| not_found::<T>(id))?;
    tracing::debug!("review {} removed from {} {}", review, T::NAME, id);

    Ok(record.body.reviews().clone())
}

/// Generates `pub mod $module` with the review routes of a reviewed listing
/// kind, mounted next to its [`listing_routes!`] module.
macro_rules! review_routes {
    ($module:ident, $listing:ty) => {
        pub mod $module {
            use rocket::serde::json::Json;
            use rocket::State;
            use uuid::Uuid;

            use $crate::data::review::{ReviewBook, ReviewData};
            use $crate::data::store::Db;
            use $crate::resp::jwt::UserRoleToken;
            use $crate::resp::problem::Problem;
            use $crate::route::reviews;

            #[rocket::get("/<id>/reviews")]
            #[tracing::instrument(skip(db))]
            pub async fn list(
                id: Uuid,
                auth: Option<UserRoleToken>,
                db: &State<Db>,
            ) -> Result<Json<ReviewBook>, Problem> {
                reviews::list::<$listing>(db.inner().as_ref(), auth.as_ref(), id)
                    .await
                    .map(Json)
            }

            #[rocket::post("/<id>/reviews", format = "json", data = "<data>")]
            #[tracing::instrument(skip(db))]
            pub async fn add(
                id: Uuid,
                data: Json<ReviewData>,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
            ) -> Result<Json<ReviewBook>, Problem> {
                reviews::add::<$listing>(db.inner().as_ref(), &auth?, id, data.into_inner())
                    .await
                    .map(Json)
            }

            #[rocket::put("/<id>/reviews/<review>", format = "json", data = "<data>")]
            #[tracing::instrument(skip(db))]
            pub async fn edit(
                id: Uuid,
                review: Uuid,
                data: Json<ReviewData>,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
            ) -> Result<Json<ReviewBook>, Problem> {
                reviews::edit::<$listing>(db.inner().as_ref(), &auth?, id, review, data.into_inner())
                    .await
                    .map(Json)
            }

            #[rocket::delete("/<id>/reviews/<review>")]
            #[tracing::instrument(skip(db))]
            pub async fn remove(
                id: Uuid,
                review: Uuid,
                auth: Result<UserRoleToken, Problem>,
                db: &State<Db>,
            ) -> Result<Json<ReviewBook>, Problem> {
                reviews::remove::<$listing>(db.inner().as_ref(), &auth?, id, review)
                    .await
                    .map(Json)
            }

            pub fn routes() -> Vec<rocket::Route> {
                rocket::routes![list, add, edit, remove]
            }
        }
    };
}
