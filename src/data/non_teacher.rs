use rocket::FromForm;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{ListFilter, Listing};
use super::store::Query;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::role::Role;

pub const NON_TEACHER_COLLECTION_NAME: &str = "non_teachers";

/// Profile of non-teaching staff: accountants, lab assistants, librarians...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NonTeacher {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub position: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub experience_years: u32,
    pub expected_salary: Option<u32>,
    #[serde(default)]
    pub bio: String,
    pub photo_url: Option<String>,
    pub resume_url: Option<String>,
}

impl Validate for NonTeacher {
    fn validate(&self) -> Result<(), Problem> {
        Checks::new()
            .required("name", &self.name)
            .email("email", &self.email)
            .phone("phone", &self.phone)
            .required("city", &self.city)
            .required("position", &self.position)
            .entries("skills", &self.skills)
            .entries("qualifications", &self.qualifications)
            .experience("experience_years", self.experience_years)
            .text("bio", &self.bio)
            .optional_url("photo_url", &self.photo_url)
            .optional_url("resume_url", &self.resume_url)
            .finish()
    }
}

impl Listing for NonTeacher {
    const COLLECTION: &'static str = NON_TEACHER_COLLECTION_NAME;
    const NAME: &'static str = "Staff profile";
    const ONE_PER_OWNER: bool = true;
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "city", "position", "skills", "bio"];

    type Payload = NonTeacher;

    fn may_create(role: Role) -> bool {
        role == Role::NonTeacher
    }

    fn from_payload(payload: NonTeacher) -> Self {
        payload
    }

    fn apply(&mut self, payload: NonTeacher) {
        *self = payload;
    }
}

#[derive(Debug, Default, FromForm)]
pub struct NonTeacherFilter {
    pub q: Option<String>,
    pub approved: Option<bool>,
    pub city: Option<String>,
    pub position: Option<String>,
    pub skill: Option<String>,
    pub min_experience: Option<u32>,
    pub verified: Option<bool>,
}

impl ListFilter for NonTeacherFilter {
    fn narrow(&self, query: Query) -> Query {
        query
            .text_if("city", self.city.as_ref())
            .text_if("position", self.position.as_ref())
            .text_if("skills", self.skill.as_ref())
            .gte_if("experience_years", self.min_experience.map(i64::from))
            .eq_if("is_verified", self.verified)
    }

    fn term(&self) -> Option<&str> {
        self.q.as_deref()
    }

    fn approved(&self) -> Option<bool> {
        self.approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_is_required() {
        let staff = NonTeacher {
            name: "Ravi Kumar".to_string(),
            email: "ravi@example.com".to_string(),
            phone: "9876543210".to_string(),
            city: "Nagpur".to_string(),
            position: " ".to_string(),
            skills: vec!["Tally".to_string()],
            qualifications: vec![],
            experience_years: 3,
            expected_salary: None,
            bio: String::new(),
            photo_url: None,
            resume_url: Some("not a url".to_string()),
        };

        let problem = staff.validate().unwrap_err();
        let fields: Vec<&str> = problem.body["invalid_fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|it| it["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["position", "resume_url"]);
    }
}
