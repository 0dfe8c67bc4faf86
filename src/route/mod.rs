use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::{Build, Request, Rocket, Route};

#[macro_use]
pub mod listing;
#[macro_use]
pub mod reviews;

pub mod admin;
pub mod applications;
pub mod files;
pub mod users;

#[cfg(test)]
pub mod testing;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    data::{
        application, coaching, non_teacher, parent, review, school, student, teacher, tuition,
        user::db::{UserLoginData, UserSignupData},
        user::UserResponse,
        vacancy,
    },
    resp::{
        jwt::doc::JWTAuth,
        problem::{problems, Problem},
    },
    role::Role,
};

listing_routes!(
    teachers,
    crate::data::teacher::Teacher,
    crate::data::teacher::TeacherFilter
);
listing_routes!(
    non_teachers,
    crate::data::non_teacher::NonTeacher,
    crate::data::non_teacher::NonTeacherFilter
);
listing_routes!(
    coaching_centres,
    crate::data::coaching::Coaching,
    crate::data::coaching::CoachingFilter
);
listing_routes!(
    schools,
    crate::data::school::School,
    crate::data::school::SchoolFilter
);
listing_routes!(
    students,
    crate::data::student::Student,
    crate::data::student::StudentFilter
);
listing_routes!(
    parents,
    crate::data::parent::Parent,
    crate::data::parent::ParentFilter
);
listing_routes!(
    home_tuition,
    crate::data::tuition::TuitionPost,
    crate::data::tuition::TuitionFilter
);
listing_routes!(
    vacancies,
    crate::data::vacancy::Vacancy,
    crate::data::vacancy::VacancyFilter
);

review_routes!(coaching_reviews, crate::data::coaching::Coaching);
review_routes!(school_reviews, crate::data::school::School);

#[derive(OpenApi)]
#[openapi(
    paths(
        users::user_create,
        users::login_submit,
        users::logout,
        users::user_me,
        users::user_get,
        users::user_delete,
        applications::application_create,
        applications::application_list_for_vacancy,
        applications::application_mine,
        applications::application_get,
        applications::application_status,
        applications::application_delete,
        admin::admin_users,
        admin::admin_set_role,
        admin::admin_stats,
        files::app
    ),
    components(schemas(
        Role,
        teacher::Teacher,
        non_teacher::NonTeacher,
        coaching::CoachingData,
        coaching::Coaching,
        school::SchoolData,
        school::School,
        student::Student,
        parent::Parent,
        parent::Child,
        tuition::TuitionPost,
        tuition::TuitionMode,
        vacancy::Vacancy,
        vacancy::StaffKind,
        vacancy::EmploymentType,
        application::Application,
        application::ApplicationData,
        application::ApplicationStatus,
        application::StatusChange,
        review::Review,
        review::ReviewData,
        review::ReviewBook,
        listing::Flag,
        admin::RoleChange,
        admin::Stats,
        admin::CollectionStats,
        UserResponse,
        UserLoginData,
        UserSignupData<'_>,
        Problem
    )),
    modifiers(&JWTAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            // the frontend lives at the root
            if path == "/" {
                new_paths.insert(path, item);
            } else {
                new_paths.insert(self.0.to_string() + path.as_ref(), item);
            }
        }

        openapi.paths.paths = new_paths;
    }
}

#[catch(404)]
fn not_found_catcher(req: &Request) -> Problem {
    Problem::new_untyped(Status::NotFound, "Resource not found.").instance_uri(req.uri())
}

#[catch(422)]
fn unprocessable_catcher(req: &Request) -> Problem {
    problems::parse_problem().instance_uri(req.uri())
}

#[catch(401)]
fn unauthorized_catcher() -> Problem {
    crate::resp::jwt::auth_problem("Authorization is required.")
}

#[catch(403)]
fn forbidden_catcher() -> Problem {
    problems::forbidden("Access denied.")
}

#[catch(500)]
fn internal_catcher() -> Problem {
    Problem::new_untyped(Status::InternalServerError, "Internal server error.")
}

#[catch(default)]
fn default_catcher(status: Status, req: &Request) -> Problem {
    Problem::new_untyped(status, status.reason().unwrap_or("Request failed."))
        .instance_uri(req.uri())
}

pub fn api_v1() -> Vec<Route> {
    routes![
        users::user_create,
        users::login_submit,
        users::logout,
        users::user_me,
        users::user_get,
        users::user_delete,
        applications::application_create,
        applications::application_list_for_vacancy,
        applications::application_mine,
        applications::application_get,
        applications::application_status,
        applications::application_delete,
        admin::admin_users,
        admin::admin_set_role,
        admin::admin_stats,
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api/v1", api_v1())
        .mount("/api/v1/teachers", teachers::routes())
        .mount("/api/v1/non-teachers", non_teachers::routes())
        .mount("/api/v1/coaching", coaching_centres::routes())
        .mount("/api/v1/coaching", coaching_reviews::routes())
        .mount("/api/v1/schools", schools::routes())
        .mount("/api/v1/schools", school_reviews::routes())
        .mount("/api/v1/students", students::routes())
        .mount("/api/v1/parents", parents::routes())
        .mount("/api/v1/home-tuition", home_tuition::routes())
        .mount("/api/v1/vacancies", vacancies::routes())
        .register(
            "/",
            catchers![
                not_found_catcher,
                unprocessable_catcher,
                unauthorized_catcher,
                forbidden_catcher,
                internal_catcher,
                default_catcher
            ],
        )
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
        )
        .mount("/", routes![files::app, files::app_path])
}
