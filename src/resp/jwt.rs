use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::problem::Problem;
use crate::config::Config;
use crate::data::store::Db;
use crate::data::user::db::UserDbExt;
use crate::data::user::User;
use crate::role::Role;
use crate::security::Security;
use crate::util::date_time_as_unix_seconds;

pub static AUTH_COOKIE_NAME: &str = "jwt_auth";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub user: Uuid,
    pub email: String,
    pub role: Role,
}

impl UserRoleToken {
    pub fn new(user: &User, lifetime: Duration) -> UserRoleToken {
        let now = Utc::now();
        UserRoleToken {
            iat: now,
            exp: now + lifetime,
            user: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Takes role and e-mail from the stored account, which wins over
    /// whatever the token was issued with.
    pub fn refreshed(mut self, user: &User) -> UserRoleToken {
        self.email = user.email.clone();
        self.role = user.role;
        self
    }

    /// Whether the token holder may manage something owned by `owner`.
    pub fn may_manage(&self, owner: Uuid) -> bool {
        self.user == owner || self.is_admin()
    }

    pub fn encode_jwt(&self, secret: impl AsRef<[u8]>) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(secret.as_ref());

        encode(&header, &self, &key)
    }

    pub fn cookie(
        &self,
        secret: impl AsRef<[u8]>,
        secure: bool,
    ) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(Cookie::build((AUTH_COOKIE_NAME, self.encode_jwt(secret)?))
            .secure(secure)
            .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
            .path("/")
            .http_only(true)
            .build())
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.").detail(detail)
}

/// Cookie that replaces the auth cookie on logout.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE_NAME).path("/").build()
}

pub fn decode_claims(token: &str, secret: impl AsRef<[u8]>) -> Result<UserRoleToken, Problem> {
    match decode::<UserRoleToken>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    {
        Ok(it) => {
            tracing::debug!("decoded user roles token for user: {}", it.user);
            Ok(it)
        }
        Err(e) => match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(Problem::from(e)),
            _ => Err(auth_problem("JWT was malformed.")),
        },
    }
}

pub fn extract_claims(
    cookies: &CookieJar,
    authorization: Option<&str>,
    secret: impl AsRef<[u8]>,
) -> Result<UserRoleToken, Problem> {
    let bearer = authorization.and_then(|it| it.strip_prefix("Bearer "));

    let token = match (cookies.get(AUTH_COOKIE_NAME), bearer) {
        (Some(jwt), _) => jwt.value().to_owned(),
        (None, Some(bearer)) => bearer.trim().to_owned(),
        (None, None) => {
            return Err(auth_problem("No JWT auth cookie."));
        }
    };
    tracing::trace!("extracted jwt auth from request");

    decode_claims(&token, secret)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserRoleToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security = match req.rocket().state::<Security>() {
            Some(it) => it,
            None => {
                tracing::error!("security information isn't managed by rocket");
                return request::Outcome::Error((
                    Status::InternalServerError,
                    Problem::new_untyped(Status::InternalServerError, "Server misconfigured."),
                ));
            }
        };

        tracing::trace!("extracting user roles token from request");
        let authorization = req.headers().get_one("Authorization");
        let claims = match extract_claims(req.cookies(), authorization, &security.jwt_secret) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("unable to extract claims from request");
                return request::Outcome::Error((Status::Unauthorized, e));
            }
        };

        let db = match req.rocket().state::<Db>() {
            Some(it) => it,
            None => {
                tracing::error!("store isn't managed by rocket");
                return request::Outcome::Error((
                    Status::InternalServerError,
                    Problem::new_untyped(Status::InternalServerError, "Server misconfigured."),
                ));
            }
        };

        match db.get_user(claims.user).await {
            Ok(Some(user)) => request::Outcome::Success(claims.refreshed(&user)),
            Ok(None) => {
                tracing::debug!("token of deleted user {} rejected", claims.user);
                request::Outcome::Error((
                    Status::Unauthorized,
                    auth_problem("Account no longer exists."),
                ))
            }
            Err(e) => {
                tracing::error!("unable to load token user: {}", e);
                let problem = Problem::from(e);
                request::Outcome::Error((problem.status, problem))
            }
        }
    }
}

/// Token validity from configuration.
pub fn token_lifetime(config: &Config) -> Duration {
    Duration::hours(config.token_lifetime_hours.max(1))
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl From<JWTAuth> for SecurityScheme {
        fn from(_: JWTAuth) -> Self {
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            )
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme("jwt", *self)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    fn example_token(exp: Duration) -> UserRoleToken {
        let now = Utc::now().round_subsecs(0);
        UserRoleToken {
            iat: now,
            exp: now + exp,
            user: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        }
    }

    #[test]
    fn jwt_configured_properly() {
        let urt = example_token(Duration::weeks(1));
        let security = Security::ephemeral();

        let token = urt
            .encode_jwt(&security.jwt_secret)
            .expect("encoding should work for example");
        let decoded = decode_claims(&token, &security.jwt_secret).expect("token should decode");

        assert_eq!(urt.iat, decoded.iat);
        assert_eq!(urt.exp, decoded.exp);
        assert_eq!(urt.user, decoded.user);
        assert_eq!(decoded.role, Role::Admin);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let urt = example_token(Duration::weeks(1));
        let token = urt.encode_jwt(Security::ephemeral().jwt_secret).unwrap();

        let err = decode_claims(&token, Security::ephemeral().jwt_secret).unwrap_err();
        assert_eq!(err.status, Status::Unauthorized);
    }

    #[test]
    fn expired_token_is_rejected() {
        let urt = example_token(Duration::hours(-2));
        let security = Security::ephemeral();
        let token = urt.encode_jwt(&security.jwt_secret).unwrap();

        let err = decode_claims(&token, &security.jwt_secret).unwrap_err();
        assert_eq!(err.title, "Expired JWT signature.");
    }

    #[test]
    fn may_manage_own_or_as_admin() {
        let mut urt = example_token(Duration::hours(1));
        let other = Uuid::new_v4();
        assert!(urt.may_manage(other));

        urt.role = Role::Teacher;
        assert!(!urt.may_manage(other));
        assert!(urt.may_manage(urt.user));
    }
}
