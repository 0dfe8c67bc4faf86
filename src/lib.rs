#[macro_use]
extern crate rocket;

use std::sync::Arc;

use error::BackendError;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::data::application::{APPLICATION_COLLECTION_NAME, APPLICATION_UNIQUE_KEY};
use crate::data::store::{Db, MemoryStore, MongoStore};
use crate::data::user::USER_COLLECTION_NAME;
use crate::data::PROFILE_COLLECTIONS;
use crate::error::ConfigurationError;
use crate::route::mount_api;
use crate::security::Security;

pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod util;

pub const MEMORY_STORE_URI: &str = "memory://";

/// Loads configuration and secrets from disk and connects to the configured store.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        if tracing_log::LogTracer::init().is_err() {
            eprintln!("Unable to forward log records to tracing.");
        }

        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    tracing::info!("Initializing security information...");
    let security = Security::load()?;

    let db: Db = if c.mongodb_uri.starts_with(MEMORY_STORE_URI) {
        tracing::warn!("Using in-memory store. Data is lost on shutdown.");
        MemoryStore::shared()
    } else {
        tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
        let store = MongoStore::connect(&c.mongodb_uri, &c.mongodb_db).await?;
        tracing::info!("Using MongoDB database: {}", c.mongodb_db);
        Arc::new(store)
    };

    build(c, security, db).await
}

/// Assembles the server around an already opened store.
pub async fn build(c: Config, security: Security, db: Db) -> Result<Rocket<Build>, BackendError> {
    tracing::info!("Ensuring unique indexes...");
    db.ensure_unique(USER_COLLECTION_NAME, &["email"]).await?;
    db.ensure_unique(APPLICATION_COLLECTION_NAME, &APPLICATION_UNIQUE_KEY)
        .await?;
    for collection in PROFILE_COLLECTIONS {
        db.ensure_unique(collection, &["owner"]).await?;
    }

    tracing::info!("Starting HTTP server...");
    let mut r = rocket::build().manage(c).manage(security).manage(db);

    tracing::info!("Setting up CORS...");
    let allowed_origins = AllowedOrigins::All;

    let cors = rocket_cors::CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    r = r.attach(cors);
    r = mount_api(r);

    Ok(r)
}
