use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub share: ShareConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default = "default_access_token_expire")]
    pub access_token_expire_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory encrypted blobs are written to. Never inside a served
    /// static root.
    #[serde(default = "default_encrypted_path")]
    pub encrypted_path: String,
}

/// Bounds for share link lifetimes
#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    #[serde(default = "default_min_share_minutes")]
    pub min_duration_minutes: i64,
    #[serde(default = "default_max_share_minutes")]
    pub max_duration_minutes: i64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1421
}

fn default_db_path() -> String {
    "data/sealdrop.db".to_string()
}

fn default_jwt_secret() -> String {
    // Replaced by a generated secret on first start
    "change-me".to_string()
}

fn default_access_token_expire() -> u64 {
    15 // 15 minutes
}

fn default_encrypted_path() -> String {
    "data/encrypted".to_string()
}

fn default_min_share_minutes() -> i64 {
    30
}

fn default_max_share_minutes() -> i64 {
    10080 // 7 days
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            access_token_expire_minutes: default_access_token_expire(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            encrypted_path: default_encrypted_path(),
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: default_min_share_minutes(),
            max_duration_minutes: default_max_share_minutes(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            storage: StorageConfig::default(),
            share: ShareConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.validate()?;
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        Ok(config)
    }

    /// Ensure JWT secret is secure and persisted
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret == default_jwt_secret() || self.jwt.secret.is_empty() {
            let secret_path = Path::new("data/.jwt_secret");

            if secret_path.exists() {
                let secret = fs::read_to_string(secret_path)?;
                self.jwt.secret = secret.trim().to_string();
                tracing::info!("Loaded persisted JWT secret from data/.jwt_secret");
            } else {
                let secret = uuid::Uuid::new_v4().to_string();

                if let Some(parent) = secret_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                fs::write(secret_path, &secret)?;
                self.jwt.secret = secret;
                tracing::info!("Generated and persisted new JWT secret to data/.jwt_secret");
            }
        }
        Ok(())
    }

    /// Load configuration from config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: SD_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SD_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("SD_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        if let Ok(val) = env::var("SD_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Ok(val) = env::var("SD_CONF_JWT_SECRET") {
            self.jwt.secret = val;
        }
        if let Ok(val) = env::var("SD_CONF_JWT_ACCESS_EXPIRE") {
            if let Ok(minutes) = val.parse() {
                self.jwt.access_token_expire_minutes = minutes;
            }
        }

        if let Ok(val) = env::var("SD_CONF_STORAGE_ENCRYPTED_PATH") {
            self.storage.encrypted_path = val;
        }

        if let Ok(val) = env::var("SD_CONF_SHARE_MIN_DURATION") {
            if let Ok(minutes) = val.parse() {
                self.share.min_duration_minutes = minutes;
            }
        }
        if let Ok(val) = env::var("SD_CONF_SHARE_MAX_DURATION") {
            if let Ok(minutes) = val.parse() {
                self.share.max_duration_minutes = minutes;
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.share.min_duration_minutes < 1 {
            anyhow::bail!("share.min_duration_minutes must be at least 1");
        }
        if self.share.max_duration_minutes < self.share.min_duration_minutes {
            anyhow::bail!("share.max_duration_minutes must not be below share.min_duration_minutes");
        }
        Ok(())
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::create_dir_all(&self.storage.encrypted_path)?;

        Ok(())
    }
}
