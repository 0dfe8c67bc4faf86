use rocket::FromForm;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{ListFilter, Listing};
use super::store::Query;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::role::Role;

pub const STUDENT_COLLECTION_NAME: &str = "students";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Student {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: String,
    pub grade: String,
    pub school_name: Option<String>,
    #[serde(default)]
    pub subjects_of_interest: Vec<String>,
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub bio: String,
    pub photo_url: Option<String>,
}

impl Validate for Student {
    fn validate(&self) -> Result<(), Problem> {
        Checks::new()
            .required("name", &self.name)
            .email("email", &self.email)
            .optional_phone("phone", &self.phone)
            .required("city", &self.city)
            .required("grade", &self.grade)
            .entries("subjects_of_interest", &self.subjects_of_interest)
            .text("bio", &self.bio)
            .optional_url("photo_url", &self.photo_url)
            .finish()
    }
}

impl Listing for Student {
    const COLLECTION: &'static str = STUDENT_COLLECTION_NAME;
    const NAME: &'static str = "Student profile";
    const ONE_PER_OWNER: bool = true;
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name", "city", "school_name", "subjects_of_interest"];

    type Payload = Student;

    fn may_create(role: Role) -> bool {
        role == Role::Student
    }

    fn from_payload(payload: Student) -> Self {
        payload
    }

    fn apply(&mut self, payload: Student) {
        *self = payload;
    }
}

#[derive(Debug, Default, FromForm)]
pub struct StudentFilter {
    pub q: Option<String>,
    pub approved: Option<bool>,
    pub city: Option<String>,
    pub grade: Option<String>,
    pub subject: Option<String>,
}

impl ListFilter for StudentFilter {
    fn narrow(&self, query: Query) -> Query {
        query
            .text_if("city", self.city.as_ref())
            .text_if("grade", self.grade.as_ref())
            .text_if("subjects_of_interest", self.subject.as_ref())
    }

    fn term(&self) -> Option<&str> {
        self.q.as_deref()
    }

    fn approved(&self) -> Option<bool> {
        self.approved
    }
}
