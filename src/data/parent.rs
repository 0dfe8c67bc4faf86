use rocket::FromForm;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::record::{ListFilter, Listing};
use super::store::Query;
use super::validate::{Checks, Validate};
use crate::resp::problem::Problem;
use crate::role::Role;

pub const PARENT_COLLECTION_NAME: &str = "parents";

pub const MAX_CHILDREN: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Child {
    pub name: String,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Parent {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub address: Option<String>,
    pub occupation: Option<String>,
    #[serde(default)]
    pub children: Vec<Child>,
}

impl Validate for Parent {
    fn validate(&self) -> Result<(), Problem> {
        let mut checks = Checks::new();
        checks
            .required("name", &self.name)
            .email("email", &self.email)
            .phone("phone", &self.phone)
            .required("city", &self.city)
            .check(
                self.children.len() <= MAX_CHILDREN,
                "children",
                format!("At most {} children can be listed.", MAX_CHILDREN),
            );

        for child in &self.children {
            if child.name.trim().is_empty() || child.grade.trim().is_empty() {
                checks.fail("children", "Every child needs a name and a grade.");
                break;
            }
        }

        checks.finish()
    }
}

impl Listing for Parent {
    const COLLECTION: &'static str = PARENT_COLLECTION_NAME;
    const NAME: &'static str = "Parent profile";
    const ONE_PER_OWNER: bool = true;
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "city", "occupation"];

    type Payload = Parent;

    fn may_create(role: Role) -> bool {
        role == Role::Parent
    }

    fn from_payload(payload: Parent) -> Self {
        payload
    }

    fn apply(&mut self, payload: Parent) {
        *self = payload;
    }
}

#[derive(Debug, Default, FromForm)]
pub struct ParentFilter {
    pub q: Option<String>,
    pub approved: Option<bool>,
    pub city: Option<String>,
}

impl ListFilter for ParentFilter {
    fn narrow(&self, query: Query) -> Query {
        query.text_if("city", self.city.as_ref())
    }

    fn term(&self) -> Option<&str> {
        self.q.as_deref()
    }

    fn approved(&self) -> Option<bool> {
        self.approved
    }
}
