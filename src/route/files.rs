use std::path::PathBuf;

use rocket::fs::NamedFile;
use rocket::State;

use crate::config::Config;

pub async fn app_index_file(c: &State<Config>) -> Option<NamedFile> {
    let index = c.public_content.as_path().join("index.html");
    match NamedFile::open(&index).await {
        Ok(file) => Some(file),
        Err(_) => {
            tracing::warn!("'{}' does not exist!", index.display());
            None
        }
    }
}

/// Serves the single page frontend
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Frontend index page"),
        (status = 404, description = "No frontend is deployed"),
    )
)]
#[get("/")]
pub async fn app(c: &State<Config>) -> Option<NamedFile> {
    app_index_file(c).await
}

/// Unknown paths fall back to the index so the frontend router can handle
/// them. Unmatched API paths stay 404.
#[get("/<path..>", rank = 10)]
pub async fn app_path(path: PathBuf, c: &State<Config>) -> Option<NamedFile> {
    if path.starts_with("api") {
        return None;
    }

    match NamedFile::open(c.public_content.as_path().join(path.as_path())).await {
        Ok(file) => Some(file),
        Err(_) => app_index_file(c).await,
    }
}
