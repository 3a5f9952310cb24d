//! Configuration and settings management
//!
//! Loads settings from config files and environment variables, and holds the
//! constants shared by the core and the transports.

use crate::admission::{
    GateConfig, GateConfigError, DEFAULT_IDLE_WINDOWS, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS,
};
use crate::i18n::Language;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default AudD endpoint used for audio fingerprint lookups
pub const DEFAULT_AUDD_API_URL: &str = "https://api.audd.io/";
/// Default Deezer API base used for catalog lookups
pub const DEFAULT_DEEZER_API_URL: &str = "https://api.deezer.com";
/// Timeout for a single music service HTTP request
pub const DEFAULT_MUSIC_HTTP_TIMEOUT_SECS: u64 = 30;
/// Janitor period for the admission gate
pub const DEFAULT_JANITOR_SECS: u64 = 300;

/// Settings that failed validation after loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Loading or deserializing failed
    #[error("Configuration error: {0}")]
    Load(#[from] ConfigError),
    /// Rate limit parameters are unusable
    #[error("Invalid rate limit settings: {0}")]
    Gate(#[from] GateConfigError),
    /// Any other invalid value
    #[error("Invalid setting `{key}`: {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Build the layered configuration source shared by all settings structs.
///
/// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP_`-prefixed environment with `__` separators, and
/// plain environment variables (empty values are treated as unset).
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Core settings: rate limiting, music service access, localization.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoreSettings {
    /// Language used until a user picks one
    #[serde(default)]
    pub default_language: Language,

    /// Toggle for the admission gate
    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,
    /// Sliding window length in seconds
    #[serde(default = "default_window_secs")]
    pub rate_limit_window_secs: u64,
    /// Admitted requests per user per window
    #[serde(default = "default_max_requests")]
    pub rate_limit_max_requests: u32,
    /// Idle window lengths before a user's entry is reclaimed
    #[serde(default = "default_idle_windows")]
    pub rate_limit_idle_windows: u32,
    /// Janitor period in seconds, 0 disables the janitor
    #[serde(default = "default_janitor_secs")]
    pub rate_limit_janitor_secs: u64,

    /// AudD API token for audio recognition
    pub audd_api_token: Option<String>,
    /// AudD endpoint
    #[serde(default = "default_audd_api_url")]
    pub audd_api_url: String,
    /// Deezer API base URL
    #[serde(default = "default_deezer_api_url")]
    pub deezer_api_url: String,
    /// Per-request timeout towards the music service
    #[serde(default = "default_music_http_timeout_secs")]
    pub music_http_timeout_secs: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECS
}

const fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

const fn default_idle_windows() -> u32 {
    DEFAULT_IDLE_WINDOWS
}

const fn default_janitor_secs() -> u64 {
    DEFAULT_JANITOR_SECS
}

fn default_audd_api_url() -> String {
    DEFAULT_AUDD_API_URL.to_string()
}

fn default_deezer_api_url() -> String {
    DEFAULT_DEEZER_API_URL.to_string()
}

const fn default_music_http_timeout_secs() -> u64 {
    DEFAULT_MUSIC_HTTP_TIMEOUT_SECS
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            default_language: Language::default(),
            rate_limit_enabled: true,
            rate_limit_window_secs: DEFAULT_WINDOW_SECS,
            rate_limit_max_requests: DEFAULT_MAX_REQUESTS,
            rate_limit_idle_windows: DEFAULT_IDLE_WINDOWS,
            rate_limit_janitor_secs: DEFAULT_JANITOR_SECS,
            audd_api_token: None,
            audd_api_url: default_audd_api_url(),
            deezer_api_url: default_deezer_api_url(),
            music_http_timeout_secs: DEFAULT_MUSIC_HTTP_TIMEOUT_SECS,
        }
    }
}

impl CoreSettings {
    /// Load core settings from files and environment.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tunebot_core::config::CoreSettings;
    ///
    /// let settings = CoreSettings::new().expect("Failed to load configuration");
    /// settings.validate().expect("Invalid configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        // Environment::default() does not always pick up tokens that look numeric
        if settings.audd_api_token.is_none() {
            if let Ok(val) = std::env::var("AUDD_API_TOKEN") {
                if !val.is_empty() {
                    settings.audd_api_token = Some(val);
                }
            }
        }

        Ok(settings)
    }

    /// Parameters for the admission gate.
    #[must_use]
    pub const fn gate_config(&self) -> GateConfig {
        GateConfig {
            enabled: self.rate_limit_enabled,
            window: Duration::from_secs(self.rate_limit_window_secs),
            max_requests: self.rate_limit_max_requests,
            idle_windows: self.rate_limit_idle_windows,
        }
    }

    /// Janitor period, `None` when disabled.
    #[must_use]
    pub const fn janitor_period(&self) -> Option<Duration> {
        if self.rate_limit_janitor_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.rate_limit_janitor_secs))
        }
    }

    /// Fail fast on values that would only break at the first request.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` describing the first invalid value.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.gate_config().validate()?;

        if self.music_http_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                key: "music_http_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if reqwest::Url::parse(&self.audd_api_url).is_err() {
            return Err(SettingsError::Invalid {
                key: "audd_api_url",
                reason: format!("`{}` is not a valid URL", self.audd_api_url),
            });
        }
        if reqwest::Url::parse(&self.deezer_api_url).is_err() {
            return Err(SettingsError::Invalid {
                key: "deezer_api_url",
                reason: format!("`{}` is not a valid URL", self.deezer_api_url),
            });
        }
        Ok(())
    }
}

/// Parse a list of Telegram IDs separated by commas, semicolons or spaces.
/// Tokens that are not integers are skipped.
///
/// # Examples
///
/// ```
/// use tunebot_core::config::parse_id_list;
///
/// let ids = parse_id_list("123; 456, abc 789");
/// assert_eq!(ids.len(), 3);
/// assert!(ids.contains(&456));
/// ```
#[must_use]
pub fn parse_id_list(raw: &str) -> std::collections::HashSet<i64> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|id| id.parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_defaults_validate() {
        let settings = CoreSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.gate_config(), GateConfig::default());
        assert_eq!(settings.janitor_period(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_zero_limit_fails_fast() {
        let settings = CoreSettings {
            rate_limit_max_requests: 0,
            ..CoreSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Gate(GateConfigError::ZeroLimit))
        ));

        let settings = CoreSettings {
            rate_limit_window_secs: 0,
            ..CoreSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Gate(GateConfigError::ZeroWindow))
        ));
    }

    #[test]
    fn test_bad_urls_are_rejected() {
        let settings = CoreSettings {
            deezer_api_url: "not a url".to_string(),
            ..CoreSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid {
                key: "deezer_api_url",
                ..
            })
        ));
    }

    #[test]
    fn test_janitor_can_be_disabled() {
        let settings = CoreSettings {
            rate_limit_janitor_secs: 0,
            ..CoreSettings::default()
        };
        assert_eq!(settings.janitor_period(), None);
    }

    #[test]
    fn test_list_parsing() {
        let ids = parse_id_list("123,456");
        assert!(ids.contains(&123));
        assert!(ids.contains(&456));
        assert_eq!(ids.len(), 2);

        let ids = parse_id_list("333; 444, 555");
        assert_eq!(ids.len(), 3);

        let ids = parse_id_list("abc, 777");
        assert!(ids.contains(&777));
        assert_eq!(ids.len(), 1);

        assert!(parse_id_list("").is_empty());
    }

    // Environment variables are process-wide; keep every env mutation in
    // this single test.
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("RATE_LIMIT_MAX_REQUESTS", "5");
        env::set_var("RATE_LIMIT_ENABLED", "false");
        env::set_var("DEFAULT_LANGUAGE", "fa");
        env::set_var("AUDD_API_TOKEN", "test-token");

        let settings = CoreSettings::new()?;
        assert_eq!(settings.rate_limit_max_requests, 5);
        assert!(!settings.rate_limit_enabled);
        assert_eq!(settings.default_language, Language::Fa);
        assert_eq!(settings.audd_api_token.as_deref(), Some("test-token"));
        assert_eq!(settings.rate_limit_window_secs, DEFAULT_WINDOW_SECS);

        env::remove_var("RATE_LIMIT_MAX_REQUESTS");
        env::remove_var("RATE_LIMIT_ENABLED");
        env::remove_var("DEFAULT_LANGUAGE");
        env::remove_var("AUDD_API_TOKEN");

        env::set_var("AUDD_API_TOKEN", "");
        let settings = CoreSettings::new()?;
        assert_eq!(settings.audd_api_token, None);
        env::remove_var("AUDD_API_TOKEN");
        Ok(())
    }
}
