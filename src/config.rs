use std::{env, path::PathBuf};

use thiserror::Error;

const DEFAULT_UPLOAD_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub jwt_secret: String,
    pub csrf_secret: String,
    /// Web root. Uploaded images land in `<public_dir>/images`.
    pub public_dir: PathBuf,
    pub upload_limit_bytes: usize,
    pub seed_tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_database_url() -> String {
    "sqlite://newsroom.db".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3001".into()
}

impl AppConfig {
    /// Reads the configuration from the process environment. `main` loads
    /// `.env` into it beforehand.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url());
        let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| default_listen_addr());
        let jwt_secret = required("JWT_SECRET")?;
        let csrf_secret = required("CSRF_SECRET")?;
        let public_dir = env::var("PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));

        let upload_limit_bytes = match env::var("UPLOAD_LIMIT_BYTES") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                ConfigError::Invalid(format!("UPLOAD_LIMIT_BYTES is not a byte count: {raw}"))
            })?,
            Err(_) => DEFAULT_UPLOAD_LIMIT,
        };

        let seed_tags = env::var("SEED_TAGS")
            .map(|raw| parse_tag_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            listen_addr,
            jwt_secret,
            csrf_secret,
            public_dir,
            upload_limit_bytes,
            seed_tags,
        })
    }

    /// Configuration for a local instance with fixed secrets.
    pub fn local(database_url: impl Into<String>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url: database_url.into(),
            listen_addr: default_listen_addr(),
            jwt_secret: "local-jwt-secret".into(),
            csrf_secret: "local-csrf-secret".into(),
            public_dir: public_dir.into(),
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT,
            seed_tags: Vec::new(),
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse_tag_list(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if !tags.iter().any(|known| known == name) {
            tags.push(name.to_string());
        }
    }
    tags
}
