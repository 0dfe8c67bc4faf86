use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("JWT secret not found in '{0}'")]
    MissingSecret(PathBuf),
    #[error("JWT secret in '{0}' is shorter than {1} bytes")]
    WeakSecret(PathBuf, usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of the document store seam.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for unique key in '{collection}'")]
    Duplicate { collection: String },
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    BsonSerialize(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDeserialize(#[from] bson::de::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Store(#[from] StoreError),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}
