//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `farm.toml`.
//!     loads configuration from file or falls back to defaults,
//!     then applies environment overrides (PORT, FIREBASE_*).
//!
//! structure:
//!     - ServerConfig: bind address for the api.
//!     - StoreConfig: which remote store backend, where it lives, how long to wait.
//!     - MockConfig: fallback reading served when the store has nothing.
//!     - HistoryConfig: defaults and limits for /api/historical-data.
//!     - LoggingConfig: tracing filter and payload logging toggle.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::MockState;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub mock: MockConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Firebase,
    Memory,
    Offline,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// e.g. https://<project>-default-rtdb.firebaseio.com
    pub database_url: Option<String>,
    pub credential_path: PathBuf,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MockConfig {
    pub water_level: f64,
    pub temperature: i64,
    pub humidity: i64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct HistoryConfig {
    pub default_hours: u32,
    pub max_hours: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_payloads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 5000 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Firebase,
            database_url: None,
            credential_path: PathBuf::from("Backend/api/firebase-credentials.json"),
            timeout_ms: 3000,
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        let mock = MockState::default();
        Self { water_level: mock.water_level, temperature: mock.temperature, humidity: mock.humidity }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { default_hours: 24, max_hours: 24 * 365 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), log_payloads: true }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl MockConfig {
    pub fn to_state(&self) -> MockState {
        MockState { water_level: self.water_level, temperature: self.temperature, humidity: self.humidity }
    }
}

impl ApiConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: ApiConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback, then apply environment overrides
    pub fn load_or_default() -> Self {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var("FARM_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("farm.toml"));
        paths.push(PathBuf::from("..").join("config").join("farm.toml"));

        let mut config = None;
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(loaded) => {
                        tracing::info!("[CONFIG] Loaded from {}", path.display());
                        config = Some(loaded);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("[CONFIG] Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            tracing::warn!("[CONFIG] No config file found - using defaults");
            Self::default()
        });
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply PORT / FIREBASE_CRED_PATH / FIREBASE_DATABASE_URL overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("[CONFIG] Ignoring invalid PORT={:?}", port),
            }
        }
        if let Some(path) = lookup("FIREBASE_CRED_PATH") {
            self.store.credential_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("FIREBASE_DATABASE_URL") {
            self.store.database_url = Some(url);
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│           API CONFIGURATION             │");
        tracing::info!("├─────────────────────────────────────────┤");
        tracing::info!("│ Bind: {}", self.bind_addr());
        tracing::info!("│ Store: {:?} ({})", self.store.backend,
            self.store.database_url.as_deref().unwrap_or("no url"));
        tracing::info!("│ Store timeout: {}ms", self.store.timeout_ms);
        tracing::info!("│ History: default {}h, max {}h", self.history.default_hours, self.history.max_hours);
        tracing::info!("│ Log Level: {}", self.logging.level);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}
