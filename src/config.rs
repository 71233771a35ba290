//! Run configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Validation mirrors the CLI ranges so a value that
//! the CLI would reject cannot sneak in through the config file.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::provider::BUILTIN_PROVIDERS;

/// Default output directory for artifacts and reports.
pub const DEFAULT_OUTPUT_DIR: &str = "paper_downloads";

/// Default worker count.
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Default number of extra retry rounds after the first pass.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default contact address sent to providers with a polite-use policy.
pub const DEFAULT_CONTACT_EMAIL: &str = "paperfetch@example.com";

const MAX_WORKERS_LIMIT: usize = 64;
const MAX_RETRIES_LIMIT: u32 = 10;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Path that failed.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        /// Dotted field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Top-level configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Directory receiving artifacts and reports (created if absent).
    pub output_dir: PathBuf,
    /// Maximum number of identifiers processed in parallel.
    pub max_workers: usize,
    /// Extra retry rounds after the first pass over all providers.
    pub max_retries: u32,
    /// Probe timeout for providers without their own `timeout_secs`.
    pub request_timeout_secs: u64,
    /// Timeout for fetching an artifact from a resolved URL.
    pub download_timeout_secs: u64,
    /// Courtesy delay after each unsuccessful provider attempt.
    pub inter_provider_delay_ms: u64,
    /// Courtesy delay between retry rounds.
    pub inter_retry_delay_ms: u64,
    /// Run the PDF validator before committing an artifact.
    pub validate_pdf: bool,
    /// Default log filter when neither `RUST_LOG` nor CLI verbosity is given.
    pub log_level: Option<String>,
    /// Report outputs.
    pub report: ReportConfig,
    /// Proxy routing.
    pub routing: RoutingConfig,
    /// Provider chain.
    pub providers: ProvidersConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_workers: DEFAULT_MAX_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout_secs: 30,
            download_timeout_secs: 60,
            inter_provider_delay_ms: 500,
            inter_retry_delay_ms: 2000,
            validate_pdf: true,
            log_level: None,
            report: ReportConfig::default(),
            routing: RoutingConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Which report files are written after a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Write `download_summary.txt`.
    pub text_summary: bool,
    /// Write `download_report.json`.
    pub json_report: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            text_summary: true,
            json_report: true,
        }
    }
}

/// Outbound proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    /// When false every provider goes direct.
    pub proxy_enabled: bool,
    /// Explicit proxy URL; environment variables and a local default apply otherwise.
    pub proxy_url: Option<String>,
    /// Providers that always bypass the proxy.
    pub direct_providers: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            proxy_enabled: true,
            proxy_url: None,
            direct_providers: crate::routing::DEFAULT_DIRECT_PROVIDERS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

/// Provider priority order and per-provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Provider names in the order they are tried within a round.
    pub priority: Vec<String>,
    /// Per-provider overrides keyed by provider name.
    pub settings: BTreeMap<String, ProviderSettings>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            priority: BUILTIN_PROVIDERS.iter().map(|n| (*n).to_string()).collect(),
            settings: BTreeMap::new(),
        }
    }
}

impl ProvidersConfig {
    /// Returns settings for `name`, or defaults when none are configured.
    #[must_use]
    pub fn settings_for(&self, name: &str) -> ProviderSettings {
        self.settings.get(name).cloned().unwrap_or_default()
    }

    /// Returns enabled provider names in priority order.
    #[must_use]
    pub fn enabled(&self) -> Vec<&str> {
        self.priority
            .iter()
            .map(String::as_str)
            .filter(|name| self.settings.get(*name).is_none_or(|s| s.enabled))
            .collect()
    }
}

/// Settings understood by individual providers. Fields a provider has no use
/// for are ignored by it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    /// Whether the provider takes part in the chain.
    pub enabled: bool,
    /// Contact address for polite-use APIs.
    pub email: Option<String>,
    /// Probe timeout override.
    pub timeout_secs: Option<u64>,
    /// Endpoint override (self-hosted API mirrors, tests).
    pub base_url: Option<String>,
    /// Static mirror list for the mirror-rotating provider.
    pub mirrors: Vec<String>,
    /// Try to discover live mirrors before falling back to `mirrors`.
    pub discover_mirrors: bool,
    /// Page listing live mirrors.
    pub discovery_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            email: None,
            timeout_secs: None,
            base_url: None,
            mirrors: Vec::new(),
            discover_mirrors: true,
            discovery_url: None,
        }
    }
}

impl ProviderSettings {
    /// Contact address, falling back to [`DEFAULT_CONTACT_EMAIL`].
    #[must_use]
    pub fn contact_email(&self) -> &str {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_CONTACT_EMAIL)
    }
}

impl FetchConfig {
    /// Parses configuration from a TOML string and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Loads the config at the default location if it exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an existing default file is invalid.
    pub fn load_default() -> Result<Self, ConfigError> {
        match resolve_default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Checks ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_WORKERS_LIMIT).contains(&self.max_workers) {
            return Err(ConfigError::invalid(
                "max_workers",
                format!("{} (expected 1..={MAX_WORKERS_LIMIT})", self.max_workers),
            ));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::invalid(
                "max_retries",
                format!("{} (expected 0..={MAX_RETRIES_LIMIT})", self.max_retries),
            ));
        }
        validate_timeout("request_timeout_secs", self.request_timeout_secs, 600)?;
        validate_timeout("download_timeout_secs", self.download_timeout_secs, 3600)?;

        for name in &self.providers.priority {
            if !BUILTIN_PROVIDERS.contains(&name.as_str()) {
                return Err(ConfigError::invalid(
                    "providers.priority",
                    format!("unknown provider '{name}'"),
                ));
            }
        }
        for (name, settings) in &self.providers.settings {
            if !BUILTIN_PROVIDERS.contains(&name.as_str()) {
                return Err(ConfigError::invalid(
                    "providers.settings",
                    format!("unknown provider '{name}'"),
                ));
            }
            if let Some(email) = &settings.email
                && email.chars().any(char::is_control)
            {
                return Err(ConfigError::invalid(
                    format!("providers.settings.{name}.email"),
                    "contains control characters",
                ));
            }
            if let Some(timeout) = settings.timeout_secs {
                validate_timeout(&format!("providers.settings.{name}.timeout_secs"), timeout, 600)?;
            }
        }
        if self.providers.enabled().is_empty() {
            return Err(ConfigError::invalid(
                "providers.priority",
                "no enabled providers",
            ));
        }
        Ok(())
    }
}

fn validate_timeout(field: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("{value} (expected 1..={max})"),
        ))
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/paperfetch/config.toml`
/// 2. `$HOME/.config/paperfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("paperfetch").join("config.toml"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("paperfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = FetchConfig::from_toml_str("").unwrap();
        assert_eq!(config, FetchConfig::default());
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.max_retries, 2);
        assert!(config.validate_pdf);
        assert_eq!(config.providers.priority.len(), BUILTIN_PROVIDERS.len());
    }

    #[test]
    fn test_partial_toml_overrides_only_given_fields() {
        let raw = r#"
max_workers = 8
validate_pdf = false

[routing]
proxy_enabled = false

[providers]
priority = ["arxiv", "unpaywall"]

[providers.settings.unpaywall]
email = "me@lab.org"
"#;
        let config = FetchConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.max_workers, 8);
        assert!(!config.validate_pdf);
        assert!(!config.routing.proxy_enabled);
        assert_eq!(config.providers.enabled(), vec!["arxiv", "unpaywall"]);
        assert_eq!(
            config.providers.settings_for("unpaywall").contact_email(),
            "me@lab.org"
        );
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_disabled_provider_removed_from_enabled_chain() {
        let raw = r#"
[providers.settings.scihub]
enabled = false
"#;
        let config = FetchConfig::from_toml_str(raw).unwrap();
        let enabled = config.providers.enabled();
        assert!(!enabled.contains(&"scihub"));
        assert_eq!(enabled.len(), BUILTIN_PROVIDERS.len() - 1);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FetchConfig::from_toml_str("max_wrkers = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_out_of_range_workers_rejected() {
        let err = FetchConfig::from_toml_str("max_workers = 0").unwrap_err();
        assert!(err.to_string().contains("max_workers"), "{err}");
        let err = FetchConfig::from_toml_str("max_workers = 65").unwrap_err();
        assert!(err.to_string().contains("max_workers"), "{err}");
    }

    #[test]
    fn test_retries_over_limit_rejected() {
        let err = FetchConfig::from_toml_str("max_retries = 11").unwrap_err();
        assert!(err.to_string().contains("max_retries"), "{err}");
    }

    #[test]
    fn test_unknown_provider_in_priority_rejected() {
        let err = FetchConfig::from_toml_str("[providers]\npriority = [\"libgen\"]").unwrap_err();
        assert!(err.to_string().contains("libgen"), "{err}");
    }

    #[test]
    fn test_all_providers_disabled_rejected() {
        let raw = r#"
[providers]
priority = ["arxiv"]

[providers.settings.arxiv]
enabled = false
"#;
        let err = FetchConfig::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("no enabled providers"), "{err}");
    }

    #[test]
    fn test_email_with_newline_rejected() {
        let raw = "[providers.settings.unpaywall]\nemail = \"a@b.c\\nX-Injected: 1\"";
        let err = FetchConfig::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("control characters"), "{err}");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = FetchConfig::from_toml_str("download_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("download_timeout_secs"), "{err}");
    }

    #[test]
    fn test_contact_email_defaults_when_blank() {
        let settings = ProviderSettings {
            email: Some("   ".to_string()),
            ..ProviderSettings::default()
        };
        assert_eq!(settings.contact_email(), DEFAULT_CONTACT_EMAIL);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_retries = 0\n").unwrap();
        let config = FetchConfig::load(&path).unwrap();
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FetchConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
