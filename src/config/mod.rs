//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables named `SCHOLARETL__<SECTION>__<KEY>`.
//!
//! ```toml
//! [grobid]
//! url = "http://localhost:8070"
//! timeout_secs = 60
//! connect_timeout_secs = 10
//!
//! [pdf]
//! chunk_size = 1000
//!
//! [extraction]
//! boilerplate_sections = ["author contributions", "acknowledgements"]
//!
//! [logging]
//! level = "info"
//! external_packages = "warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::utils::{DEFAULT_BOILERPLATE_SECTIONS, DEFAULT_ISSN_PATTERN};

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "SCHOLARETL";

/// Separator between prefix, section and key in environment variables
pub const ENV_SEPARATOR: &str = "__";

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "scholaretl.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid grobid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("chunk size must be positive")]
    InvalidChunkSize,

    #[error("invalid grobid settings: {0}")]
    Grobid(#[from] crate::parsers::UpstreamError),

    #[error("failed to render settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Grobid collaborator
    #[serde(default)]
    pub grobid: GrobidConfig,

    /// Plain PDF extraction
    #[serde(default)]
    pub pdf: PdfConfig,

    /// Normalization policy tables
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Grobid service settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrobidConfig {
    /// Base URL of the service; unset means Grobid parsing is unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Total request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for GrobidConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl GrobidConfig {
    /// Config pointing at a base URL with default timeouts
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// The configured base URL, treating a blank value as unset
    pub fn base_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Plain PDF extraction settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfConfig {
    /// Characters per text chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Default characters per PDF chunk
pub fn default_chunk_size() -> usize {
    1000
}

/// Normalization policy tables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionConfig {
    /// Section names removed from abstracts and bodies
    #[serde(default = "default_boilerplate_sections")]
    pub boilerplate_sections: Vec<String>,

    /// Regex matching a trailing ISSN; groups 1 and 2 hold the two halves
    #[serde(default = "default_issn_pattern")]
    pub issn_pattern: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            boilerplate_sections: default_boilerplate_sections(),
            issn_pattern: default_issn_pattern(),
        }
    }
}

fn default_boilerplate_sections() -> Vec<String> {
    DEFAULT_BOILERPLATE_SECTIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_issn_pattern() -> String {
    DEFAULT_ISSN_PATTERN.to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Level for this crate
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Level for every other crate
    #[serde(default = "default_external_level")]
    pub external_packages: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            external_packages: default_external_level(),
        }
    }
}

impl LoggingConfig {
    /// `EnvFilter` directive: external level as default, crate level for this crate
    pub fn filter_directive(&self, level_override: Option<&str>) -> String {
        let level = level_override.unwrap_or(&self.level);
        format!("{},{}={}", self.external_packages, env!("CARGO_CRATE_NAME"), level)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_external_level() -> String {
    "warn".to_string()
}

impl Settings {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = self.grobid.base_url() {
            url::Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
                url: url.to_string(),
                source,
            })?;
        }
        if self.pdf.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        regex::Regex::new(&self.extraction.issn_pattern)?;
        Ok(())
    }

    /// Render the settings as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Locate a settings file: `./scholaretl.toml`, then the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("config.toml"))
        .filter(|path| path.is_file())
}

/// Load settings from defaults, a TOML file and the process environment.
///
/// An explicit `path` must exist; otherwise [`find_config_file`] is consulted.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    load_settings_from(path, None)
}

/// Same as [`load_settings`] but with an explicit environment map
pub fn load_settings_from(
    path: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<Settings, ConfigError> {
    let mut builder =
        config::Config::builder().add_source(config::Config::try_from(&Settings::default())?);

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(found) = find_config_file() {
                tracing::debug!("Loading settings from {}", found.display());
                builder = builder.add_source(config::File::from(found).required(false));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .list_separator(",")
            .with_list_parse_key("extraction.boilerplate_sections")
            .try_parsing(true)
            .source(env),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
