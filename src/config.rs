use crate::error::ConfigurationError;
use crate::util;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or_else(|_| "teaching_community".to_string())
}

fn default_public_content() -> PathBuf {
    PathBuf::from(env::var("PUBLIC_CONTENT_PATH").unwrap_or_else(|_| "./public".to_string()))
}

#[cfg(debug_assertions)]
fn default_admin_emails() -> Vec<String> {
    vec![String::from("admin@example.com")]
}
#[cfg(not(debug_assertions))]
fn default_admin_emails() -> Vec<String> {
    vec![]
}

fn default_password_cost() -> u32 {
    12
}

fn default_token_lifetime_hours() -> i64 {
    24 * 7
}

fn default_max_page_length() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    /// `mongodb://...` or `memory://` for an in-process store.
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    #[serde(default = "default_public_content")]
    pub public_content: PathBuf,

    /// Signups with these e-mails are granted the admin role.
    #[serde(default = "default_admin_emails")]
    pub admin_emails: Vec<String>,

    /// bcrypt cost for new password hashes.
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
    #[serde(default = "default_token_lifetime_hours")]
    pub token_lifetime_hours: i64,
    #[serde(default = "util::default_true")]
    pub cookie_secure: bool,

    /// Skip the moderation queue for new listings.
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default = "default_max_page_length")]
    pub max_page_length: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            public_content: default_public_content(),
            admin_emails: default_admin_emails(),
            password_cost: default_password_cost(),
            token_lifetime_hours: default_token_lifetime_hours(),
            cookie_secure: util::default_true(),
            auto_approve: false,
            max_page_length: default_max_page_length(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or_else(|_| "./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|it| it.eq_ignore_ascii_case(email))
    }

    /// Configuration for in-process tests: memory store, cheap hashing, plain cookies.
    #[cfg(test)]
    pub fn for_tests() -> Config {
        Config {
            file_path: PathBuf::new(),
            mongodb_uri: "memory://".to_string(),
            mongodb_db: "teaching_community_test".to_string(),
            public_content: PathBuf::from("./public"),
            admin_emails: vec!["admin@example.com".to_string()],
            password_cost: 4,
            token_lifetime_hours: 1,
            cookie_secure: false,
            auto_approve: false,
            max_page_length: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_yaml::from_str("mongodb_db: elsewhere\nauto_approve: true\n")
            .expect("valid yaml");
        assert_eq!(config.mongodb_db, "elsewhere");
        assert!(config.auto_approve);
        assert_eq!(config.password_cost, 12);
        assert_eq!(config.max_page_length, 100);
        assert!(config.cookie_secure);
    }

    #[test]
    fn admin_emails_compare_case_insensitively() {
        let config = Config::for_tests();
        assert!(config.is_admin_email("Admin@Example.com"));
        assert!(!config.is_admin_email("someone@example.com"));
    }
}
