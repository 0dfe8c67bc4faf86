use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::error::SecurityError;

const JWT_SECRET: &str = "jwt.secret";
pub const MIN_SECRET_LEN: usize = 32;

/// Signing material for session tokens.
#[derive(Clone)]
pub struct Security {
    pub jwt_secret: Vec<u8>,
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Security { .. }")
    }
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or_else(|_| "./security".to_string()))
}

impl Security {
    /// Loads the JWT secret from `JWT_SECRET` or `$SECURITY_DIR/jwt.secret`,
    /// generating and persisting one when the `generate-security` feature is on.
    pub fn load() -> Result<Security, SecurityError> {
        if let Ok(secret) = env::var("JWT_SECRET") {
            tracing::info!("Using JWT secret from environment.");
            return Security::from_secret(secret.into_bytes(), Path::new("$JWT_SECRET"));
        }

        let dir = security_dir();
        let path = dir.join(JWT_SECRET);

        tracing::info!("Loading JWT signing secret...");
        match fs::read(&path) {
            Ok(secret) => {
                tracing::info!("JWT secret found and loaded.");
                Security::from_secret(secret, &path)
            }
            Err(_) if cfg!(feature = "generate-security") => {
                tracing::info!(
                    "JWT secret not found in '{}'. Generating a new one.",
                    path.display()
                );
                fs::create_dir_all(&dir)?;
                let secret = random_secret();
                fs::write(&path, &secret)?;
                Ok(Security { jwt_secret: secret })
            }
            Err(_) => Err(SecurityError::MissingSecret(path)),
        }
    }

    /// A throwaway secret; tokens signed with it die with the process.
    pub fn ephemeral() -> Security {
        Security {
            jwt_secret: random_secret(),
        }
    }

    fn from_secret(secret: Vec<u8>, origin: &Path) -> Result<Security, SecurityError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SecurityError::WeakSecret(
                origin.to_path_buf(),
                MIN_SECRET_LEN,
            ));
        }
        Ok(Security { jwt_secret: secret })
    }
}

fn random_secret() -> Vec<u8> {
    (0..64).map(|_| rand::random::<u8>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secrets_are_rejected() {
        let result = Security::from_secret(b"short".to_vec(), Path::new("test"));
        assert!(matches!(result, Err(SecurityError::WeakSecret(_, MIN_SECRET_LEN))));
    }

    #[test]
    fn ephemeral_secrets_differ() {
        assert_ne!(Security::ephemeral().jwt_secret, Security::ephemeral().jwt_secret);
    }
}
