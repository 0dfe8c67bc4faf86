use rocket::{FromForm, FromFormField};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{ListFilter, Listing};
use super::store::Query;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::role::Role;

pub const TUITION_COLLECTION_NAME: &str = "home_tuition";

pub const MAX_SESSIONS_PER_WEEK: u32 = 14;

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, FromFormField, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TuitionMode {
    #[field(value = "online")]
    Online,
    #[field(value = "at_home")]
    AtHome,
    #[field(value = "either")]
    Either,
}

impl TuitionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TuitionMode::Online => "online",
            TuitionMode::AtHome => "at_home",
            TuitionMode::Either => "either",
        }
    }
}

/// A parent or student looking for a home tutor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TuitionPost {
    pub title: String,
    pub student_name: String,
    pub grade: String,
    pub subjects: Vec<String>,
    pub mode: TuitionMode,
    pub city: String,
    pub locality: Option<String>,
    pub budget_per_month: Option<u32>,
    pub sessions_per_week: Option<u32>,
    pub preferred_gender: Option<String>,
    pub contact_phone: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "crate::util::default_true")]
    pub is_open: bool,
}

impl Validate for TuitionPost {
    fn validate(&self) -> Result<(), Problem> {
        let mut checks = Checks::new();
        checks
            .required("title", &self.title)
            .required("student_name", &self.student_name)
            .required("grade", &self.grade)
            .non_empty("subjects", &self.subjects)
            .required("city", &self.city)
            .phone("contact_phone", &self.contact_phone)
            .text("description", &self.description);

        if let Some(sessions) = self.sessions_per_week {
            checks.check(
                (1..=MAX_SESSIONS_PER_WEEK).contains(&sessions),
                "sessions_per_week",
                format!("Sessions per week must be between 1 and {}.", MAX_SESSIONS_PER_WEEK),
            );
        }

        checks.finish()
    }
}

impl Listing for TuitionPost {
    const COLLECTION: &'static str = TUITION_COLLECTION_NAME;
    const NAME: &'static str = "Home tuition post";
    const ONE_PER_OWNER: bool = false;
    const SEARCH_FIELDS: &'static [&'static str] =
        &["title", "city", "locality", "subjects", "description"];

    type Payload = TuitionPost;

    fn may_create(role: Role) -> bool {
        matches!(role, Role::Parent | Role::Student)
    }

    fn from_payload(payload: TuitionPost) -> Self {
        payload
    }

    fn apply(&mut self, payload: TuitionPost) {
        *self = payload;
    }
}

#[derive(Debug, Default, FromForm)]
pub struct TuitionFilter {
    pub q: Option<String>,
    pub approved: Option<bool>,
    pub city: Option<String>,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub mode: Option<TuitionMode>,
    pub open: Option<bool>,
    pub max_budget: Option<u32>,
}

impl ListFilter for TuitionFilter {
    fn narrow(&self, query: Query) -> Query {
        query
            .text_if("city", self.city.as_ref())
            .text_if("subjects", self.subject.as_ref())
            .text_if("grade", self.grade.as_ref())
            .eq_if("mode", self.mode.map(TuitionMode::as_str))
            .eq_if("is_open", self.open)
            .lte_if("budget_per_month", self.max_budget.map(i64::from))
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

    pub fn example_post() -> TuitionPost {
        TuitionPost {
            title: "Maths tutor for class 8".to_string(),
            student_name: "Aarav".to_string(),
            grade: "8".to_string(),
            subjects: vec!["Mathematics".to_string()],
            mode: TuitionMode::AtHome,
            city: "Pune".to_string(),
            locality: Some("Kothrud".to_string()),
            budget_per_month: Some(4000),
            sessions_per_week: Some(3),
            preferred_gender: None,
            contact_phone: "9822012345".to_string(),
            description: String::new(),
            is_open: true,
        }
    }

    #[test]
    fn subjects_must_not_be_empty() {
        assert!(example_post().validate().is_ok());

        let mut post = example_post();
        post.subjects.clear();
        post.sessions_per_week = Some(15);
        let problem = post.validate().unwrap_err();
        assert_eq!(problem.body["invalid_fields"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn mode_is_snake_case_on_the_wire() {
        let json = serde_json::to_value(example_post()).unwrap();
        assert_eq!(json["mode"], "at_home");
        assert_eq!(
            serde_json::to_value(TuitionMode::AtHome).unwrap(),
            serde_json::Value::from(TuitionMode::AtHome.as_str())
        );
    }
}
