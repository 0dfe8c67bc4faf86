use base64::Engine;
use chrono::{DateTime, Utc};
use crypto::bcrypt::bcrypt;
use crypto::util::fixed_time_eq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::role::Role;
use crate::util::{self, base64_engine, date_time_millis};

pub mod db;

pub static USER_COLLECTION_NAME: &str = "users";

pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

pub type Salt = [u8; 16];

/// bcrypt over a SHA-256 pre-hash with a per-user salt.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash {
    pub cost: u32,
    pub salt: String,
    pub hash: String,
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PasswordHash(cost = {})", self.cost)
    }
}

fn derive(password: &str, salt: &Salt, cost: u32) -> [u8; 24] {
    let mut pw_hash: [u8; 24] = [0; 24];

    let mut sha = Sha256::new();
    sha2::Digest::update(&mut sha, password.as_bytes());

    bcrypt(cost, salt, sha.finalize().as_slice(), &mut pw_hash);

    pw_hash
}

impl PasswordHash {
    pub fn new(password: impl AsRef<str>, cost: u32) -> PasswordHash {
        let cost = cost.clamp(MIN_COST, MAX_COST);
        let salt: Salt = rand::random();
        let hash = derive(password.as_ref(), &salt, cost);

        PasswordHash {
            cost,
            salt: base64_engine().encode(salt),
            hash: base64_engine().encode(hash),
        }
    }

    pub fn verify(&self, password: impl AsRef<str>) -> bool {
        let salt: Salt = match base64_engine()
            .decode(&self.salt)
            .ok()
            .and_then(|it| it.try_into().ok())
        {
            Some(it) => it,
            None => return false,
        };
        let expected = match base64_engine().decode(&self.hash) {
            Ok(it) => it,
            Err(_) => return false,
        };

        let actual = derive(password.as_ref(), &salt, self.cost.clamp(MIN_COST, MAX_COST));
        fixed_time_eq(&actual, &expected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub pw_hash: PasswordHash,
    pub role: Role,
    #[serde(with = "date_time_millis")]
    pub created: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: impl ToString,
        email: impl AsRef<str>,
        password: impl AsRef<str>,
        role: Role,
        cost: u32,
    ) -> User {
        let id = Uuid::new_v4();
        tracing::info!("Creating a new user with UUID: {}", id);

        User {
            id,
            name: name.to_string().trim().to_string(),
            email: normalize_email(email),
            pw_hash: PasswordHash::new(password, cost),
            role,
            created: util::now(),
        }
    }
}

pub fn normalize_email(email: impl AsRef<str>) -> String {
    email.as_ref().trim().to_lowercase()
}

/// Public view of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created: user.created,
        }
    }
}
