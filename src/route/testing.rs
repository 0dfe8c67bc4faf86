//! Helpers for endpoint tests running against an in-memory store.

use rocket::http::{ContentType, Cookie, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use serde::Serialize;

use crate::config::Config;
use crate::data::store::MemoryStore;
use crate::data::user::UserResponse;
use crate::resp::jwt::AUTH_COOKIE_NAME;
use crate::role::Role;
use crate::security::Security;

/// Cookies aren't tracked; requests carry the cookie they are made with.
pub async fn client() -> Client {
    let rocket = crate::build(
        Config::for_tests(),
        Security::ephemeral(),
        MemoryStore::shared(),
    )
    .await
    .expect("invalid backend");

    Client::untracked(rocket)
        .await
        .expect("invalid rocket instance")
}

/// Signup form for `<name>@example.com`.
pub fn signup_form(name: &str, role: Role) -> String {
    format!(
        "name={}&email={}@example.com&password=password123&role={}",
        name, name, role
    )
}

pub async fn signup(client: &Client, name: &str, role: Role) -> (Cookie<'static>, UserResponse) {
    let response = client
        .post("/api/v1/user")
        .header(ContentType::Form)
        .body(signup_form(name, role))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok, "signup of {} failed", name);

    let cookie = response
        .cookies()
        .get(AUTH_COOKIE_NAME)
        .cloned()
        .expect("jwt_auth cookie wasn't present");
    let user = response.into_json().await.expect("invalid response json");

    (cookie, user)
}

pub async fn post_json<'c, T: Serialize>(
    client: &'c Client,
    uri: impl AsRef<str>,
    cookie: &Cookie<'static>,
    body: &T,
) -> LocalResponse<'c> {
    client
        .post(uri.as_ref().to_string())
        .header(ContentType::JSON)
        .cookie(cookie.clone())
        .body(serde_json::to_string(body).expect("serializable body"))
        .dispatch()
        .await
}

pub async fn put_json<'c, T: Serialize>(
    client: &'c Client,
    uri: impl AsRef<str>,
    cookie: &Cookie<'static>,
    body: &T,
) -> LocalResponse<'c> {
    client
        .put(uri.as_ref().to_string())
        .header(ContentType::JSON)
        .cookie(cookie.clone())
        .body(serde_json::to_string(body).expect("serializable body"))
        .dispatch()
        .await
}

pub async fn get_json(
    client: &Client,
    uri: impl AsRef<str>,
    cookie: Option<&Cookie<'static>>,
) -> (Status, serde_json::Value) {
    let mut request = client.get(uri.as_ref().to_string());
    if let Some(cookie) = cookie {
        request = request.cookie(cookie.clone());
    }

    let response = request.dispatch().await;
    let status = response.status();
    let body = response
        .into_json()
        .await
        .unwrap_or(serde_json::Value::Null);

    (status, body)
}
