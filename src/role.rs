use rocket::FromFormField;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account type. Every user has exactly one.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, FromFormField, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[field(value = "teacher")]
    Teacher,
    #[field(value = "non_teacher")]
    NonTeacher,
    #[field(value = "coaching")]
    Coaching,
    #[field(value = "school")]
    School,
    #[field(value = "parent")]
    Parent,
    #[field(value = "student")]
    Student,
    #[field(value = "admin")]
    Admin,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Teacher,
        Role::NonTeacher,
        Role::Coaching,
        Role::School,
        Role::Parent,
        Role::Student,
        Role::Admin,
    ];

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    /// Indicates whether the role is allowed to post job vacancies.
    pub fn is_institution(self) -> bool {
        matches!(self, Role::Coaching | Role::School)
    }

    /// Indicates whether the role can apply to job vacancies.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Teacher | Role::NonTeacher)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::NonTeacher => "non_teacher",
            Role::Coaching => "coaching",
            Role::School => "school",
            Role::Parent => "parent",
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}
