//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SW_CACHE_*)
//! 2. TOML config file (if SW_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::StoreNames;

mod validation;

pub use validation::ConfigError;

/// How a batch of pre-cached resources is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPolicy {
    /// Store every resource that fetched successfully, log the rest.
    #[default]
    BestEffort,
    /// Fail the whole batch if any resource fails or returns a non-2xx status.
    AllOrNothing,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SW_CACHE_*)
/// 2. TOML config file (if SW_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding every store.
    ///
    /// Set via SW_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the worker is registered for. Relative resource paths resolve against it.
    ///
    /// Set via SW_CACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Leading segment of every store name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version marker embedded in every store name. Bump it to invalidate all cached content.
    ///
    /// Set via SW_CACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upper bound for a single network attempt, in milliseconds.
    ///
    /// Set via SW_CACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Commit policy for install-time pre-caching and background sync.
    #[serde(default)]
    pub install_policy: InstallPolicy,

    /// Application entry paths pre-cached into the critical store.
    #[serde(default = "default_critical_resources")]
    pub critical_resources: Vec<String>,

    /// Assets pre-cached into the static store.
    #[serde(default = "default_static_resources")]
    pub static_resources: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sw-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:5173".into()
}

fn default_cache_prefix() -> String {
    "iafy".into()
}

fn default_cache_version() -> String {
    "v3".into()
}

fn default_user_agent() -> String {
    "sw-cache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_critical_resources() -> Vec<String> {
    ["/", "/src/main.tsx", "/src/index.css", "/5841271165010691996-removebg.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_static_resources() -> Vec<String> {
    [
        "/src/App.tsx",
        "/src/components/Hero.tsx",
        "/src/components/UrgentProblem.tsx",
        "/src/components/ImmediateSolution.tsx",
        "/src/components/ROICalculator.tsx",
        "/src/components/RiskFreeOffer.tsx",
        "/src/components/CalendlySection.tsx",
        "/src/components/FloatingCTA.tsx",
        "/src/components/Footer.tsx",
        "/src/components/ChatBot.tsx",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            install_policy: InstallPolicy::default(),
            critical_resources: default_critical_resources(),
            static_resources: default_static_resources(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Store names for the configured prefix and version marker.
    pub fn store_names(&self) -> StoreNames {
        StoreNames::new(&self.cache_prefix, &self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SW_CACHE_`
    /// 2. TOML file from `SW_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SW_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SW_CACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
