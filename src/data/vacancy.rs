use chrono::{NaiveDate, Utc};
use rocket::{FromForm, FromFormField};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::application::APPLICATION_COLLECTION_NAME;
use super::record::{ListFilter, Listing};
use super::store::Query;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::role::Role;

pub const VACANCY_COLLECTION_NAME: &str = "vacancies";

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, FromFormField, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StaffKind {
    #[field(value = "teaching")]
    Teaching,
    #[field(value = "non_teaching")]
    NonTeaching,
}

impl StaffKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StaffKind::Teaching => "teaching",
            StaffKind::NonTeaching => "non_teaching",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, FromFormField, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    #[field(value = "full_time")]
    FullTime,
    #[field(value = "part_time")]
    PartTime,
    #[field(value = "contract")]
    Contract,
}

impl EmploymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full_time",
            EmploymentType::PartTime => "part_time",
            EmploymentType::Contract => "contract",
        }
    }
}

/// A job opening posted by a school or coaching institute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vacancy {
    pub title: String,
    pub institution_name: String,
    pub staff_kind: StaffKind,
    pub position: String,
    pub subject: Option<String>,
    pub employment_type: EmploymentType,
    pub city: String,
    pub salary_min: Option<u32>,
    pub salary_max: Option<u32>,
    #[serde(default)]
    pub min_experience_years: u32,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Last day applications are accepted.
    pub deadline: Option<NaiveDate>,
    #[serde(default = "crate::util::default_true")]
    pub is_open: bool,
}

impl Vacancy {
    /// Whether applications are currently accepted.
    pub fn accepts_applications(&self) -> bool {
        self.is_open
            && self
                .deadline
                .map(|d| d >= Utc::now().date_naive())
                .unwrap_or(true)
    }
}

impl Validate for Vacancy {
    fn validate(&self) -> Result<(), Problem> {
        let mut checks = Checks::new();
        checks
            .required("title", &self.title)
            .required("institution_name", &self.institution_name)
            .required("position", &self.position)
            .required("city", &self.city)
            .experience("min_experience_years", self.min_experience_years)
            .entries("qualifications", &self.qualifications)
            .text("description", &self.description);

        if let (Some(min), Some(max)) = (self.salary_min, self.salary_max) {
            checks.check(
                min <= max,
                "salary_max",
                "Maximum salary can't be lower than the minimum.",
            );
        }

        checks.finish()
    }
}

impl Listing for Vacancy {
    const COLLECTION: &'static str = VACANCY_COLLECTION_NAME;
    const NAME: &'static str = "Vacancy";
    const ONE_PER_OWNER: bool = false;
    const SEARCH_FIELDS: &'static [&'static str] =
        &["title", "institution_name", "position", "city", "description"];

    type Payload = Vacancy;

    fn may_create(role: Role) -> bool {
        role.is_institution()
    }

    fn from_payload(payload: Vacancy) -> Self {
        payload
    }

    /// An expired vacancy may still be edited, e.g. to close it.
    fn validate_new(payload: &Vacancy) -> Result<(), Problem> {
        Checks::new().not_past("deadline", payload.deadline).finish()
    }

    fn apply(&mut self, payload: Vacancy) {
        *self = payload;
    }

    fn dependents(id: Uuid) -> Vec<(&'static str, Query)> {
        vec![(
            APPLICATION_COLLECTION_NAME,
            Query::new().eq("vacancy", id.to_string()),
        )]
    }
}

#[derive(Debug, Default, FromForm)]
pub struct VacancyFilter {
    pub q: Option<String>,
    pub approved: Option<bool>,
    pub city: Option<String>,
    pub subject: Option<String>,
    pub staff_kind: Option<StaffKind>,
    pub employment_type: Option<EmploymentType>,
    pub position: Option<String>,
    pub open: Option<bool>,
}

impl ListFilter for VacancyFilter {
    fn narrow(&self, query: Query) -> Query {
        query
            .text_if("city", self.city.as_ref())
            .text_if("subject", self.subject.as_ref())
            .eq_if("staff_kind", self.staff_kind.map(StaffKind::as_str))
            .eq_if(
                "employment_type",
                self.employment_type.map(EmploymentType::as_str),
            )
            .text_if("position", self.position.as_ref())
            .eq_if("is_open", self.open)
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
    use chrono::Duration;

    pub fn example_vacancy() -> Vacancy {
        Vacancy {
            title: "Physics teacher".to_string(),
            institution_name: "Green Valley High School".to_string(),
            staff_kind: StaffKind::Teaching,
            position: "PGT Physics".to_string(),
            subject: Some("Physics".to_string()),
            employment_type: EmploymentType::FullTime,
            city: "Mumbai".to_string(),
            salary_min: Some(40000),
            salary_max: Some(60000),
            min_experience_years: 3,
            qualifications: vec!["M.Sc. Physics".to_string()],
            description: String::new(),
            deadline: Some(Utc::now().date_naive() + Duration::days(30)),
            is_open: true,
        }
    }

    #[test]
    fn salary_range_must_be_ordered() {
        assert!(example_vacancy().validate().is_ok());

        let mut vacancy = example_vacancy();
        vacancy.salary_min = Some(70000);
        assert!(vacancy.validate().is_err());
    }

    #[test]
    fn closed_or_expired_vacancies_refuse_applications() {
        let mut vacancy = example_vacancy();
        assert!(vacancy.accepts_applications());

        vacancy.deadline = Some(Utc::now().date_naive() - Duration::days(1));
        assert!(!vacancy.accepts_applications());
        assert!(vacancy.validate().is_ok());
        assert!(Vacancy::validate_new(&vacancy).is_err());

        vacancy.deadline = None;
        vacancy.is_open = false;
        assert!(!vacancy.accepts_applications());
    }
}
