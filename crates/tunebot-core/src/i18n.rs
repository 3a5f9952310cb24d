//! Localized user-facing texts.
//!
//! English and Persian string tables plus a bounded per-user language
//! preference store. All texts are Telegram HTML.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English
    #[default]
    En,
    /// Persian
    Fa,
}

impl Language {
    /// All languages offered in the language picker.
    pub const ALL: [Self; 2] = [Self::En, Self::Fa];

    /// Short code used in settings and callback data.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fa => "fa",
        }
    }

    /// Button label with flag.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::En => "🇺🇸 English",
            Self::Fa => "🇮🇷 فارسی",
        }
    }

    /// Language name as shown to users.
    #[must_use]
    pub const fn native_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Fa => "فارسی",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unknown language code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language code: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "fa" => Ok(Self::Fa),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

/// User-visible failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorText {
    /// The audio did not match any track
    AudioRecognitionFailed,
    /// Upload exceeds the size cap
    FileTooLarge,
    /// Attachment is not a supported audio format
    UnsupportedFormat,
    /// Search returned nothing
    NoResults,
    /// Admission gate denied the request
    RateLimited,
    /// Upstream or transport failure
    ApiError,
}

/// Labels used on track and artist cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardLabels {
    /// "Artist"
    pub artist: &'static str,
    /// "Album"
    pub album: &'static str,
    /// "Genre"
    pub genre: &'static str,
    /// "Year"
    pub year: &'static str,
    /// "Fans"
    pub fans: &'static str,
    /// "Albums"
    pub albums: &'static str,
    /// Placeholder for a missing title
    pub unknown_title: &'static str,
    /// Placeholder for a missing artist
    pub unknown_artist: &'static str,
    /// Placeholder for a missing album
    pub unknown_album: &'static str,
}

const CARD_LABELS_EN: CardLabels = CardLabels {
    artist: "Artist",
    album: "Album",
    genre: "Genre",
    year: "Year",
    fans: "Fans",
    albums: "Albums",
    unknown_title: "Unknown Title",
    unknown_artist: "Unknown Artist",
    unknown_album: "Unknown Album",
};

const CARD_LABELS_FA: CardLabels = CardLabels {
    artist: "هنرمند",
    album: "آلبوم",
    genre: "سبک",
    year: "سال",
    fans: "طرفداران",
    albums: "آلبوم‌ها",
    unknown_title: "عنوان نامشخص",
    unknown_artist: "هنرمند نامشخص",
    unknown_album: "آلبوم نامشخص",
};

/// Card labels for `lang`.
#[must_use]
pub const fn card_labels(lang: Language) -> &'static CardLabels {
    match lang {
        Language::En => &CARD_LABELS_EN,
        Language::Fa => &CARD_LABELS_FA,
    }
}

/// Text for a failure category.
#[must_use]
pub fn error_text(lang: Language, kind: ErrorText, max_file_mb: u64) -> String {
    match (lang, kind) {
        (Language::En, ErrorText::AudioRecognitionFailed) => {
            "❌ Sorry, I couldn't identify this audio. Please try a clearer recording.".to_string()
        }
        (Language::En, ErrorText::FileTooLarge) => {
            format!("❌ File is too large! Maximum size is {max_file_mb}MB.")
        }
        (Language::En, ErrorText::UnsupportedFormat) => {
            "❌ Unsupported file format! Please send MP3, WAV, OGG, M4A or FLAC files.".to_string()
        }
        (Language::En, ErrorText::NoResults) => "❌ No results found for your search.".to_string(),
        (Language::En, ErrorText::RateLimited) => {
            "⚠️ Too many requests! Please wait a moment before trying again.".to_string()
        }
        (Language::En, ErrorText::ApiError) => {
            "❌ Something went wrong. Please try again later.".to_string()
        }
        (Language::Fa, ErrorText::AudioRecognitionFailed) => {
            "❌ متأسفم، نتوانستم این صدا را شناسایی کنم. لطفاً با یک فایل واضح‌تر تلاش کنید."
                .to_string()
        }
        (Language::Fa, ErrorText::FileTooLarge) => {
            format!("❌ فایل خیلی بزرگ است! حداکثر حجم {max_file_mb} مگابایت است.")
        }
        (Language::Fa, ErrorText::UnsupportedFormat) => {
            "❌ فرمت فایل پشتیبانی نمی‌شود! لطفاً فایل MP3، WAV، OGG، M4A یا FLAC ارسال کنید."
                .to_string()
        }
        (Language::Fa, ErrorText::NoResults) => "❌ نتیجه‌ای برای جستجوی شما یافت نشد.".to_string(),
        (Language::Fa, ErrorText::RateLimited) => {
            "⚠️ درخواست‌های زیادی ارسال کرده‌اید! لطفاً لحظه‌ای صبر کنید.".to_string()
        }
        (Language::Fa, ErrorText::ApiError) => {
            "❌ خطایی رخ داد. لطفاً بعداً دوباره تلاش کنید.".to_string()
        }
    }
}

/// Welcome text for `/start`.
#[must_use]
pub fn start_text(lang: Language, bot_username: &str) -> String {
    let bot = html_escape::encode_text(bot_username);
    match lang {
        Language::En => format!(
            "🎵 <b>Welcome!</b>\n\n\
             I identify songs from audio and look up tracks, artists and charts.\n\n\
             • Send me an audio file or a voice message\n\
             • Inline mode in any chat: <code>@{bot} song name</code>\n\
             • /track, /artist and /charts for lookups\n\n\
             /language - change language\n\
             /help - how to use me\n\
             /about - about this bot\n\n\
             Pick your language below 👇"
        ),
        Language::Fa => format!(
            "🎵 <b>خوش آمدید!</b>\n\n\
             من آهنگ‌ها را از روی صدا شناسایی می‌کنم و آهنگ، هنرمند و چارت‌ها را جستجو می‌کنم.\n\n\
             • یک فایل صوتی یا پیام صوتی ارسال کنید\n\
             • حالت اینلاین در هر چت: <code>@{bot} نام آهنگ</code>\n\
             • دستورات /track، /artist و /charts برای جستجو\n\n\
             /language - تغییر زبان\n\
             /help - راهنما\n\
             /about - درباره ربات\n\n\
             زبان خود را انتخاب کنید 👇"
        ),
    }
}

/// Usage text for `/help`.
#[must_use]
pub fn help_text(lang: Language, bot_username: &str, max_file_mb: u64) -> String {
    let bot = html_escape::encode_text(bot_username);
    match lang {
        Language::En => format!(
            "🎵 <b>Help</b>\n\n\
             <b>1. Audio recognition</b>\n\
             Send an audio file, a voice message or an audio document \
             (MP3, WAV, OGG, M4A, FLAC) up to {max_file_mb}MB.\n\n\
             <b>2. Inline mode</b>\n\
             In any chat type <code>@{bot} Queen Bohemian Rhapsody</code> and pick a result.\n\n\
             <b>3. Search</b>\n\
             /track &lt;song&gt; - find a track\n\
             /artist &lt;name&gt; - find an artist\n\
             /charts - global top tracks\n\n\
             <b>4. Language</b>\n\
             /language - English or Persian"
        ),
        Language::Fa => format!(
            "🎵 <b>راهنما</b>\n\n\
             <b>۱. شناسایی صوتی</b>\n\
             یک فایل صوتی، پیام صوتی یا سند صوتی \
             (MP3، WAV، OGG، M4A، FLAC) تا {max_file_mb} مگابایت ارسال کنید.\n\n\
             <b>۲. حالت اینلاین</b>\n\
             در هر چتی تایپ کنید <code>@{bot} Queen Bohemian Rhapsody</code> و یک نتیجه را انتخاب کنید.\n\n\
             <b>۳. جستجو</b>\n\
             /track &lt;نام آهنگ&gt; - جستجوی آهنگ\n\
             /artist &lt;نام هنرمند&gt; - جستجوی هنرمند\n\
             /charts - آهنگ‌های برتر جهان\n\n\
             <b>۴. زبان</b>\n\
             /language - انگلیسی یا فارسی"
        ),
    }
}

/// Text for `/about`.
#[must_use]
pub const fn about_text(lang: Language) -> &'static str {
    match lang {
        Language::En => {
            "🎵 <b>Music identification assistant</b>\n\n\
             • Identify music from audio files\n\
             • Search songs and artists\n\
             • Global charts\n\
             • Inline mode for chats\n\
             • English and Persian"
        }
        Language::Fa => {
            "🎵 <b>دستیار شناسایی موسیقی</b>\n\n\
             • شناسایی موسیقی از فایل‌های صوتی\n\
             • جستجوی آهنگ‌ها و هنرمندان\n\
             • چارت‌های جهانی\n\
             • حالت اینلاین برای چت‌ها\n\
             • انگلیسی و فارسی"
        }
    }
}

/// Prompt shown by `/language`.
#[must_use]
pub fn language_prompt(current: Language) -> String {
    match current {
        Language::En => format!(
            "🌐 Current language: {}\n\nPlease select your preferred language:",
            current.native_name()
        ),
        Language::Fa => format!(
            "🌐 زبان فعلی: {}\n\nلطفاً زبان مورد نظر خود را انتخاب کنید:",
            current.native_name()
        ),
    }
}

/// Confirmation after a language switch, in the new language.
#[must_use]
pub fn language_changed(lang: Language) -> String {
    match lang {
        Language::En => format!("✅ Language changed to {}", lang.native_name()),
        Language::Fa => format!("✅ زبان به {} تغییر کرد", lang.native_name()),
    }
}

/// Placeholder while an upload is being recognized.
#[must_use]
pub const fn processing_text(lang: Language) -> &'static str {
    match lang {
        Language::En => "🎵 Processing audio file...",
        Language::Fa => "🎵 در حال پردازش فایل صوتی...",
    }
}

/// Usage hint for `/track` without arguments.
#[must_use]
pub const fn track_usage(lang: Language) -> &'static str {
    match lang {
        Language::En => "Please provide a track name. Usage: /track &lt;song name&gt;",
        Language::Fa => "لطفاً نام آهنگ را وارد کنید. استفاده: /track &lt;نام آهنگ&gt;",
    }
}

/// Usage hint for `/artist` without arguments.
#[must_use]
pub const fn artist_usage(lang: Language) -> &'static str {
    match lang {
        Language::En => "Please provide an artist name. Usage: /artist &lt;artist name&gt;",
        Language::Fa => "لطفاً نام هنرمند را وارد کنید. استفاده: /artist &lt;نام هنرمند&gt;",
    }
}

/// Heading of the `/charts` reply.
#[must_use]
pub fn charts_title(lang: Language, count: usize) -> String {
    match lang {
        Language::En => format!("🌍 <b>Top {count} Global Tracks</b>"),
        Language::Fa => format!("🌍 <b>{count} آهنگ برتر جهان</b>"),
    }
}

/// Heading of the similar-tracks reply.
#[must_use]
pub fn similar_title(lang: Language, artist: &str) -> String {
    let artist = html_escape::encode_text(artist);
    match lang {
        Language::En => format!("🎵 <b>Similar to {artist}</b>"),
        Language::Fa => format!("🎵 <b>مشابه {artist}</b>"),
    }
}

/// Label of the similar-tracks button.
#[must_use]
pub const fn similar_button(lang: Language) -> &'static str {
    match lang {
        Language::En => "🎵 Similar Songs",
        Language::Fa => "🎵 آهنگ‌های مشابه",
    }
}

/// Reply for users outside the admin list in admin-only mode.
pub const ACCESS_DENIED: &str = "⛔️ Access denied";

/// Per-user language preferences.
///
/// Bounded in-memory store; users who have not interacted for `idle_ttl`
/// fall back to the default language.
#[derive(Clone)]
pub struct LanguagePreferences {
    cache: Cache<i64, Language>,
    default_language: Language,
}

impl LanguagePreferences {
    /// Creates a store with the given fallback, capacity and idle TTL.
    #[must_use]
    pub fn new(default_language: Language, max_capacity: u64, idle_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(idle_ttl)
            .build();
        Self {
            cache,
            default_language,
        }
    }

    /// The user's chosen language or the default.
    pub async fn get(&self, user_id: i64) -> Language {
        self.cache
            .get(&user_id)
            .await
            .unwrap_or(self.default_language)
    }

    /// Remember the user's choice.
    pub async fn set(&self, user_id: i64, lang: Language) {
        self.cache.insert(user_id, lang).await;
    }

    /// Fallback language.
    #[must_use]
    pub const fn default_language(&self) -> Language {
        self.default_language
    }
}
