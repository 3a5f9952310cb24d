//! Telegram transport settings.

use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tunebot_core::config::{parse_id_list, CoreSettings, SettingsError};

/// Default upload cap for recognition, in bytes (20 MiB, the Bot API
/// download limit).
pub const DEFAULT_MAX_AUDIO_FILE_SIZE: u64 = 20 * 1024 * 1024;
/// Default number of inline results per query.
pub const DEFAULT_MAX_INLINE_RESULTS: usize = 10;
/// Telegram rejects more than 50 inline results.
pub const TELEGRAM_MAX_INLINE_RESULTS: usize = 50;
/// Default bot name shown in help texts.
pub const DEFAULT_BOT_USERNAME: &str = "TuneBot";

/// Cooldown period (seconds) between "Access Denied" messages for same user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Time-to-live (seconds) for cache entries.
/// Default: 2 hours.
pub const UNAUTHORIZED_CACHE_TTL_SECS: u64 = 7200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// Bot username without `@`, used in help texts.
    #[serde(default = "default_bot_username")]
    pub bot_username: String,

    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_audio_file_size")]
    pub max_audio_file_size: u64,
    /// Inline results returned per query.
    #[serde(default = "default_max_inline_results")]
    pub max_inline_results: usize,

    /// Recognize uploaded audio.
    #[serde(default = "default_true")]
    pub enable_audio_recognition: bool,
    /// Answer inline queries.
    #[serde(default = "default_true")]
    pub enable_inline_mode: bool,
    /// Offer `/language` and the language keyboard.
    #[serde(default = "default_true")]
    pub enable_language_selection: bool,
    /// Offer `/track`.
    #[serde(default = "default_true")]
    pub enable_track_info: bool,
    /// Offer `/artist` and similar-track buttons.
    #[serde(default = "default_true")]
    pub enable_artist_info: bool,
    /// Offer `/charts`.
    #[serde(default = "default_true")]
    pub enable_charts: bool,

    /// Serve only the users listed in `admin_user_ids`.
    #[serde(default)]
    pub admin_only_mode: bool,
    /// Comma-separated list of admin user IDs.
    #[serde(rename = "admin_user_ids")]
    pub admin_user_ids_str: Option<String>,

    /// Seconds between two "Access denied" replies to the same user.
    #[serde(default = "default_unauthorized_cooldown")]
    pub unauthorized_cooldown_secs: u64,
    /// Lifetime of a cooldown entry.
    #[serde(default = "default_unauthorized_cache_ttl")]
    pub unauthorized_cache_ttl_secs: u64,
    /// Maximum tracked unauthorized users.
    #[serde(default = "default_unauthorized_cache_max_size")]
    pub unauthorized_cache_max_size: u64,
}

const fn default_true() -> bool {
    true
}

fn default_bot_username() -> String {
    DEFAULT_BOT_USERNAME.to_string()
}

const fn default_max_audio_file_size() -> u64 {
    DEFAULT_MAX_AUDIO_FILE_SIZE
}

const fn default_max_inline_results() -> usize {
    DEFAULT_MAX_INLINE_RESULTS
}

const fn default_unauthorized_cooldown() -> u64 {
    UNAUTHORIZED_COOLDOWN_SECS
}

const fn default_unauthorized_cache_ttl() -> u64 {
    UNAUTHORIZED_CACHE_TTL_SECS
}

const fn default_unauthorized_cache_max_size() -> u64 {
    UNAUTHORIZED_CACHE_MAX_SIZE
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            bot_username: default_bot_username(),
            max_audio_file_size: DEFAULT_MAX_AUDIO_FILE_SIZE,
            max_inline_results: DEFAULT_MAX_INLINE_RESULTS,
            enable_audio_recognition: true,
            enable_inline_mode: true,
            enable_language_selection: true,
            enable_track_info: true,
            enable_artist_info: true,
            enable_charts: true,
            admin_only_mode: false,
            admin_user_ids_str: None,
            unauthorized_cooldown_secs: UNAUTHORIZED_COOLDOWN_SECS,
            unauthorized_cache_ttl_secs: UNAUTHORIZED_CACHE_TTL_SECS,
            unauthorized_cache_max_size: UNAUTHORIZED_CACHE_MAX_SIZE,
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        tunebot_core::config::build_config()?.try_deserialize()
    }

    /// Returns the set of admin user IDs.
    #[must_use]
    pub fn admin_user_ids(&self) -> HashSet<i64> {
        self.admin_user_ids_str
            .as_deref()
            .map(parse_id_list)
            .unwrap_or_default()
    }

    /// Upload cap in whole megabytes, for user-facing texts.
    #[must_use]
    pub const fn max_file_mb(&self) -> u64 {
        self.max_audio_file_size / (1024 * 1024)
    }

    /// Check values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` naming the offending key.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.telegram_token.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "telegram_token",
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_audio_file_size == 0 {
            return Err(SettingsError::Invalid {
                key: "max_audio_file_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(1..=TELEGRAM_MAX_INLINE_RESULTS).contains(&self.max_inline_results) {
            return Err(SettingsError::Invalid {
                key: "max_inline_results",
                reason: format!("must be between 1 and {TELEGRAM_MAX_INLINE_RESULTS}"),
            });
        }
        if self.admin_only_mode && self.admin_user_ids().is_empty() {
            return Err(SettingsError::Invalid {
                key: "admin_user_ids",
                reason: "admin-only mode needs at least one admin".to_string(),
            });
        }
        Ok(())
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Core settings shared across transport handlers.
    pub core: Arc<CoreSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
    admins: Arc<HashSet<i64>>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(core: CoreSettings, telegram: TelegramSettings) -> Self {
        let admins = telegram.admin_user_ids();
        Self {
            core: Arc::new(core),
            telegram: Arc::new(telegram),
            admins: Arc::new(admins),
        }
    }

    /// Validate both halves.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.core.validate()?;
        self.telegram.validate()
    }

    /// Whether `user_id` is listed as an admin.
    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    /// Whether `user_id` may use the bot at all.
    #[must_use]
    pub fn is_allowed(&self, user_id: i64) -> bool {
        !self.telegram.admin_only_mode || self.is_admin(user_id)
    }
}
