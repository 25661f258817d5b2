//! Worker configuration with layered loading.
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
use url::Url;

use crate::partition::{CacheRole, PartitionNames};

mod validation;

pub use validation::ConfigError;

/// What install does when a precache asset cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecachePolicy {
    /// Any failure aborts install and nothing is stored.
    Strict,
    /// Failures are logged; everything that did load is stored.
    #[default]
    Tolerant,
}

/// Strategy used for web font requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontStrategy {
    #[default]
    StaleWhileRevalidate,
    CacheFirst,
}

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SW_CACHE_*)
/// 2. TOML config file (if SW_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Cache generation identifier. Changing it retires every partition of
    /// the previous generation on the next activation.
    ///
    /// Set via SW_CACHE_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Prefix shared by every partition name.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Registration scope; precache paths and the shell document resolve
    /// against it and its origin defines "same origin".
    ///
    /// Set via SW_CACHE_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Shell assets fetched at install, relative to `scope`.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Document served for offline navigations, relative to `scope`.
    #[serde(default = "default_shell_document")]
    pub shell_document: String,

    #[serde(default)]
    pub precache_policy: PrecachePolicy,

    /// Ask the host to enable navigation preload during activate.
    #[serde(default = "default_true")]
    pub navigation_preload: bool,

    /// URL patterns (regex, matched against the full URL) that always go to
    /// the network and are never cached.
    #[serde(default = "default_always_online")]
    pub always_online: Vec<String>,

    /// Host patterns (regex) of the web font provider.
    #[serde(default = "default_font_hosts")]
    pub font_hosts: Vec<String>,

    #[serde(default)]
    pub font_strategy: FontStrategy,

    /// Host patterns (regex) of external media providers.
    #[serde(default = "default_media_hosts")]
    pub media_hosts: Vec<String>,

    /// File extensions treated as images, without the dot.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Partition for same-origin assets: `shell` or `runtime`.
    #[serde(default = "default_same_origin_partition")]
    pub same_origin_partition: CacheRole,

    /// Entry ceiling for the media partition.
    #[serde(default = "default_media_ceiling")]
    pub media_ceiling: usize,

    /// Max age for media entries, in seconds.
    #[serde(default = "default_media_max_age_secs")]
    pub media_max_age_secs: u64,

    /// Whether `media_max_age_secs` is enforced on lookups.
    #[serde(default)]
    pub enforce_max_age: bool,

    /// Title used on the synthetic offline page.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SW_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_generation() -> String {
    "v1".into()
}

fn default_prefix() -> String {
    "app".into()
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_precache() -> Vec<String> {
    ["./", "./index.html", "./manifest.webmanifest", "./icons/icon-192.png", "./icons/icon-512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_shell_document() -> String {
    "./index.html".into()
}

fn default_true() -> bool {
    true
}

fn default_always_online() -> Vec<String> {
    vec![
        r"googleapis\.com/(firestore|identitytoolkit|securetoken)".into(),
        r"^https?://(firestore|identitytoolkit|securetoken)\.googleapis\.com/".into(),
        r"gstatic\.com/firebasejs".into(),
        r"\.firebaseio\.com".into(),
    ]
}

fn default_font_hosts() -> Vec<String> {
    vec![r"^fonts\.(googleapis|gstatic)\.com$".into()]
}

fn default_media_hosts() -> Vec<String> {
    vec![r"(^|\.)i\.ytimg\.com$".into(), r"(^|\.)youtube-nocookie\.com$".into()]
}

fn default_image_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_same_origin_partition() -> CacheRole {
    CacheRole::Shell
}

fn default_media_ceiling() -> usize {
    60
}

fn default_media_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_app_name() -> String {
    "App".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sw-cache.sqlite")
}

fn default_user_agent() -> String {
    "sw-cache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            generation: default_generation(),
            prefix: default_prefix(),
            scope: default_scope(),
            precache: default_precache(),
            shell_document: default_shell_document(),
            precache_policy: PrecachePolicy::default(),
            navigation_preload: true,
            always_online: default_always_online(),
            font_hosts: default_font_hosts(),
            font_strategy: FontStrategy::default(),
            media_hosts: default_media_hosts(),
            image_extensions: default_image_extensions(),
            same_origin_partition: default_same_origin_partition(),
            media_ceiling: default_media_ceiling(),
            media_max_age_secs: default_media_max_age_secs(),
            enforce_max_age: false,
            app_name: default_app_name(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl WorkerConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Max age applied to media lookups, if enforced.
    pub fn media_max_age(&self) -> Option<Duration> {
        self.enforce_max_age
            .then(|| Duration::from_secs(self.media_max_age_secs))
    }

    /// Partition names for the configured generation.
    pub fn partition_names(&self) -> PartitionNames {
        PartitionNames::new(&self.prefix, &self.generation)
    }

    /// Parsed registration scope.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `scope` is not an absolute URL.
    pub fn scope_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.scope).map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })
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

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
