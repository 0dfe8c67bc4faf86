use rocket::FromForm;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{ListFilter, Listing};
use super::review::{ReviewBook, Reviewed};
use super::store::Query;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::role::Role;

pub const COACHING_COLLECTION_NAME: &str = "coaching";

/// Descriptive part of a coaching institute, as submitted by its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CoachingData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub address: String,
    pub contact_person: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    /// E.g. "JEE", "NEET", "Spoken English".
    #[serde(default)]
    pub courses: Vec<String>,
    pub established_year: Option<u32>,
    #[serde(default)]
    pub description: String,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Validate for CoachingData {
    fn validate(&self) -> Result<(), Problem> {
        Checks::new()
            .required("name", &self.name)
            .email("email", &self.email)
            .phone("phone", &self.phone)
            .required("city", &self.city)
            .required("address", &self.address)
            .entries("subjects", &self.subjects)
            .entries("courses", &self.courses)
            .established("established_year", self.established_year)
            .text("description", &self.description)
            .optional_url("website", &self.website)
            .optional_url("logo_url", &self.logo_url)
            .urls("images", &self.images)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coaching {
    #[serde(flatten)]
    pub info: CoachingData,
    #[serde(default)]
    pub reviews: ReviewBook,
}

impl Listing for Coaching {
    const COLLECTION: &'static str = COACHING_COLLECTION_NAME;
    const NAME: &'static str = "Coaching institute";
    const ONE_PER_OWNER: bool = true;
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name", "city", "subjects", "courses", "description"];

    type Payload = CoachingData;

    fn may_create(role: Role) -> bool {
        role == Role::Coaching
    }

    fn from_payload(payload: CoachingData) -> Self {
        Coaching {
            info: payload,
            reviews: ReviewBook::default(),
        }
    }

    fn apply(&mut self, payload: CoachingData) {
        self.info = payload;
    }
}

impl Reviewed for Coaching {
    fn reviews(&self) -> &ReviewBook {
        &self.reviews
    }

    fn reviews_mut(&mut self) -> &mut ReviewBook {
        &mut self.reviews
    }
}

#[derive(Debug, Default, FromForm)]
pub struct CoachingFilter {
    pub q: Option<String>,
    pub approved: Option<bool>,
    pub city: Option<String>,
    pub subject: Option<String>,
    pub course: Option<String>,
    pub min_rating: Option<f64>,
    pub verified: Option<bool>,
}

impl ListFilter for CoachingFilter {
    fn narrow(&self, query: Query) -> Query {
        query
            .text_if("city", self.city.as_ref())
            .text_if("subjects", self.subject.as_ref())
            .text_if("courses", self.course.as_ref())
            .gte_if("reviews.average", self.min_rating)
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

    pub fn example_coaching() -> CoachingData {
        CoachingData {
            name: "Bright Minds Academy".to_string(),
            email: "contact@brightminds.example.com".to_string(),
            phone: "020-2567-1234".to_string(),
            city: "Pune".to_string(),
            address: "FC Road".to_string(),
            contact_person: Some("Meera Joshi".to_string()),
            subjects: vec!["Chemistry".to_string()],
            courses: vec!["NEET".to_string()],
            established_year: Some(2009),
            description: "Medical entrance preparation.".to_string(),
            website: Some("https://brightminds.example.com".to_string()),
            logo_url: None,
            images: vec![],
        }
    }

    #[test]
    fn update_keeps_reviews() {
        let mut coaching = Coaching::from_payload(example_coaching());
        coaching.reviews.count = 3;

        let mut changed = example_coaching();
        changed.city = "Mumbai".to_string();
        coaching.apply(changed);

        assert_eq!(coaching.info.city, "Mumbai");
        assert_eq!(coaching.reviews.count, 3);
    }

    #[test]
    fn future_establishment_is_rejected() {
        let mut data = example_coaching();
        data.established_year = Some(3000);
        data.images = vec!["img.png".to_string()];

        let problem = data.validate().unwrap_err();
        assert_eq!(problem.body["invalid_fields"].as_array().unwrap().len(), 2);
    }
}
