//! Application configuration.
//!
//! Loaded from `config/supplydesk.toml` (optional) and then from
//! `SUPPLYDESK__*` environment variables, e.g.
//! `SUPPLYDESK__DATABASE__URL=postgres://...`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "config/supplydesk.toml";
pub const DEV_JWT_SECRET: &str = "supplydesk-dev-secret";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub borrowing: BorrowingConfig,
    pub sweep: SweepConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: Option<String>,
}

impl AuthConfig {
    /// Configured secret, or the development default.
    pub fn secret_or_dev(&self) -> (&str, bool) {
        match self.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => (s, false),
            None => (DEV_JWT_SECRET, true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Absent => in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub root: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: "media".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BorrowingConfig {
    pub due_soon_threshold_days: i64,
    pub default_duration_days: u32,
}

impl Default for BorrowingConfig {
    fn default() -> Self {
        Self {
            due_soon_threshold_days: supplydesk_borrowing::DEFAULT_DUE_SOON_THRESHOLD_DAYS,
            default_duration_days: supplydesk_borrowing::DEFAULT_BORROW_DURATION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SweepConfig {
    /// 0 disables the in-process periodic sweep.
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { json: true }
    }
}

impl AppConfig {
    /// Load from the default file location and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SUPPLYDESK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_sources() {
        let cfg = AppConfig::load_from("does/not/exist.toml").unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.borrowing.due_soon_threshold_days, 3);
        assert_eq!(cfg.borrowing.default_duration_days, 3);
        assert_eq!(cfg.sweep.interval_secs, 0);
        assert!(cfg.log.json);
        assert_eq!(cfg.auth.secret_or_dev(), (DEV_JWT_SECRET, true));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nbind = \"127.0.0.1:9000\"\n[sweep]\ninterval_secs = 3600\n[auth]\njwt_secret = \"abc\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:9000");
        assert_eq!(cfg.sweep.interval_secs, 3600);
        assert_eq!(cfg.auth.secret_or_dev(), ("abc", false));
        assert_eq!(cfg.media.root, "media");
    }
}
