use rocket::FromForm;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{ListFilter, Listing};
use super::review::{ReviewBook, Reviewed};
use super::store::Query;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::role::Role;

pub const SCHOOL_COLLECTION_NAME: &str = "schools";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SchoolData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub address: String,
    /// Affiliation, e.g. "CBSE", "ICSE", "State".
    pub board: String,
    /// Language of instruction.
    pub medium: Option<String>,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    pub principal_name: Option<String>,
    pub established_year: Option<u32>,
    #[serde(default)]
    pub description: String,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Validate for SchoolData {
    fn validate(&self) -> Result<(), Problem> {
        Checks::new()
            .required("name", &self.name)
            .email("email", &self.email)
            .phone("phone", &self.phone)
            .required("city", &self.city)
            .required("address", &self.address)
            .required("board", &self.board)
            .entries("levels", &self.levels)
            .entries("facilities", &self.facilities)
            .established("established_year", self.established_year)
            .text("description", &self.description)
            .optional_url("website", &self.website)
            .optional_url("logo_url", &self.logo_url)
            .urls("images", &self.images)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct School {
    #[serde(flatten)]
    pub info: SchoolData,
    #[serde(default)]
    pub reviews: ReviewBook,
}

impl Listing for School {
    const COLLECTION: &'static str = SCHOOL_COLLECTION_NAME;
    const NAME: &'static str = "School";
    const ONE_PER_OWNER: bool = true;
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name", "city", "board", "facilities", "description"];

    type Payload = SchoolData;

    fn may_create(role: Role) -> bool {
        role == Role::School
    }

    fn from_payload(payload: SchoolData) -> Self {
        School {
            info: payload,
            reviews: ReviewBook::default(),
        }
    }

    fn apply(&mut self, payload: SchoolData) {
        self.info = payload;
    }
}

impl Reviewed for School {
    fn reviews(&self) -> &ReviewBook {
        &self.reviews
    }

    fn reviews_mut(&mut self) -> &mut ReviewBook {
        &mut self.reviews
    }
}

#[derive(Debug, Default, FromForm)]
pub struct SchoolFilter {
    pub q: Option<String>,
    pub approved: Option<bool>,
    pub city: Option<String>,
    pub board: Option<String>,
    pub level: Option<String>,
    pub medium: Option<String>,
    pub min_rating: Option<f64>,
    pub verified: Option<bool>,
}

impl ListFilter for SchoolFilter {
    fn narrow(&self, query: Query) -> Query {
        query
            .text_if("city", self.city.as_ref())
            .text_if("board", self.board.as_ref())
            .text_if("levels", self.level.as_ref())
            .text_if("medium", self.medium.as_ref())
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

    pub fn example_school() -> SchoolData {
        SchoolData {
            name: "Green Valley High School".to_string(),
            email: "office@greenvalley.example.com".to_string(),
            phone: "+91 22 2345 6789".to_string(),
            city: "Mumbai".to_string(),
            address: "Andheri West".to_string(),
            board: "CBSE".to_string(),
            medium: Some("English".to_string()),
            levels: vec!["primary".to_string(), "secondary".to_string()],
            facilities: vec!["Library".to_string(), "Science lab".to_string()],
            principal_name: None,
            established_year: Some(1987),
            description: "Co-educational day school.".to_string(),
            website: None,
            logo_url: None,
            images: vec!["https://greenvalley.example.com/campus.jpg".to_string()],
        }
    }

    #[test]
    fn board_is_required() {
        assert!(example_school().validate().is_ok());

        let mut school = example_school();
        school.board = String::new();
        assert!(school.validate().is_err());
    }
}
