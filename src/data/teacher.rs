use rocket::FromForm;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{ListFilter, Listing};
use super::store::Query;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::role::Role;

pub const TEACHER_COLLECTION_NAME: &str = "teachers";

/// Public profile of a teacher looking for a job or students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Teacher {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub address: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    /// E.g. "primary", "secondary", "higher secondary".
    #[serde(default)]
    pub teaching_levels: Vec<String>,
    #[serde(default)]
    pub experience_years: u32,
    pub expected_salary: Option<u32>,
    pub gender: Option<String>,
    #[serde(default)]
    pub bio: String,
    pub photo_url: Option<String>,
    pub resume_url: Option<String>,
    #[serde(default)]
    pub available_for_home_tuition: bool,
}

impl Validate for Teacher {
    fn validate(&self) -> Result<(), Problem> {
        Checks::new()
            .required("name", &self.name)
            .email("email", &self.email)
            .phone("phone", &self.phone)
            .required("city", &self.city)
            .entries("subjects", &self.subjects)
            .entries("qualifications", &self.qualifications)
            .entries("teaching_levels", &self.teaching_levels)
            .experience("experience_years", self.experience_years)
            .text("bio", &self.bio)
            .optional_url("photo_url", &self.photo_url)
            .optional_url("resume_url", &self.resume_url)
            .finish()
    }
}

impl Listing for Teacher {
    const COLLECTION: &'static str = TEACHER_COLLECTION_NAME;
    const NAME: &'static str = "Teacher profile";
    const ONE_PER_OWNER: bool = true;
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name", "city", "subjects", "qualifications", "bio"];

    type Payload = Teacher;

    fn may_create(role: Role) -> bool {
        role == Role::Teacher
    }

    fn from_payload(payload: Teacher) -> Self {
        payload
    }

    fn apply(&mut self, payload: Teacher) {
        *self = payload;
    }
}

#[derive(Debug, Default, FromForm)]
pub struct TeacherFilter {
    pub q: Option<String>,
    pub approved: Option<bool>,
    pub city: Option<String>,
    pub subject: Option<String>,
    pub qualification: Option<String>,
    pub level: Option<String>,
    pub min_experience: Option<u32>,
    pub home_tuition: Option<bool>,
    pub verified: Option<bool>,
}

impl ListFilter for TeacherFilter {
    fn narrow(&self, query: Query) -> Query {
        query
            .text_if("city", self.city.as_ref())
            .text_if("subjects", self.subject.as_ref())
            .text_if("qualifications", self.qualification.as_ref())
            .text_if("teaching_levels", self.level.as_ref())
            .gte_if("experience_years", self.min_experience.map(i64::from))
            .eq_if("available_for_home_tuition", self.home_tuition)
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
pub mod tests {
    use super::*;
    use crate::data::store::Condition;

    pub fn example_teacher() -> Teacher {
        Teacher {
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "+91 98765 43210".to_string(),
            city: "Pune".to_string(),
            address: None,
            subjects: vec!["Mathematics".to_string(), "Physics".to_string()],
            qualifications: vec!["M.Sc.".to_string(), "B.Ed.".to_string()],
            teaching_levels: vec!["secondary".to_string()],
            experience_years: 6,
            expected_salary: Some(45000),
            gender: Some("female".to_string()),
            bio: "Board exam specialist.".to_string(),
            photo_url: Some("https://example.com/asha.jpg".to_string()),
            resume_url: None,
            available_for_home_tuition: true,
        }
    }

    #[test]
    fn valid_teacher_passes() {
        assert!(example_teacher().validate().is_ok());
    }

    #[test]
    fn bad_contact_is_rejected() {
        let mut teacher = example_teacher();
        teacher.email = "asha".to_string();
        teacher.phone = "call me".to_string();
        teacher.experience_years = 70;

        let problem = teacher.validate().unwrap_err();
        assert_eq!(problem.body["invalid_fields"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn filter_builds_conditions() {
        let filter = TeacherFilter {
            city: Some("pune".to_string()),
            min_experience: Some(5),
            subject: Some("  ".to_string()),
            ..Default::default()
        };
        let query = filter.narrow(Query::new());

        assert_eq!(
            query.conditions,
            vec![
                Condition::Text("city".to_string(), "pune".to_string()),
                Condition::Gte("experience_years".to_string(), bson::Bson::Int64(5)),
            ]
        );
    }
}
