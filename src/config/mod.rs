use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory with the static client (HTML/JS/CSS), served as fallback
    #[serde(default = "default_client_dir")]
    pub client_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            client_dir: default_client_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_client_dir() -> PathBuf {
    PathBuf::from("./client")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Key used to sign session tokens. Generated at startup when absent.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Session token lifetime in days
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_days: default_token_ttl_days(),
        }
    }
}

fn default_token_ttl_days() -> i64 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory where uploaded files are written
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    /// Maximum accepted file size in bytes (default: 5 MiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// URL prefix the upload directory is served under
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_file_size: default_max_file_size(),
            url_prefix: default_url_prefix(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_file_size() -> usize {
    5 * 1024 * 1024
}

fn default_url_prefix() -> String {
    "/uploads".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Apply `JWT_SECRET`, `MAX_FILE_SIZE` and `PORT` from the environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                self.auth.jwt_secret = Some(secret);
            }
        }

        if let Ok(size) = std::env::var("MAX_FILE_SIZE") {
            self.upload.max_file_size = size
                .trim()
                .parse()
                .with_context(|| format!("Invalid MAX_FILE_SIZE: {}", size))?;
        }

        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT: {}", port))?;
        }

        Ok(())
    }

    /// Return the configured signing key, or generate a random one.
    pub fn jwt_secret_or_generate(&self) -> String {
        match &self.auth.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("No jwt_secret configured; generated a random key, sessions will not survive a restart");
                let bytes: [u8; 32] = rand::random();
                hex::encode(bytes)
            }
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
