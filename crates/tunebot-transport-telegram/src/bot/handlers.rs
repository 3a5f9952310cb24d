use crate::bot::views::{language_keyboard, track_keyboard, CallbackAction};
use crate::bot::UnauthorizedCache;
use crate::config::{BotSettings, TelegramSettings};
use anyhow::Result;
use reqwest::Url;
use std::sync::Arc;
use std::time::Instant;
use teloxide::{
    prelude::*,
    types::{
        BotCommand, ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
        ParseMode,
    },
    utils::command::BotCommands,
};
use tracing::{info, warn};
use tunebot_core::format;
use tunebot_core::i18n::{self, ErrorText, Language, LanguagePreferences};
use tunebot_core::music::{Artist, Track};
use tunebot_core::relay::{Relay, RelayError};

/// Number of tracks shown by `/charts`.
const CHART_SIZE: usize = 10;

/// Helper function to get user name from Message
pub(crate) fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Welcome message and language picker
    #[command(description = "Start the bot.")]
    Start,
    /// Usage guide
    #[command(description = "How to use the bot.")]
    Help,
    /// About the bot
    #[command(description = "About this bot.")]
    About,
    /// Change interface language
    #[command(description = "Change language.")]
    Language,
    /// Look up a track by name
    #[command(description = "Find a track.")]
    Track(String),
    /// Look up an artist by name
    #[command(description = "Find an artist.")]
    Artist(String),
    /// Global top tracks
    #[command(description = "Global top tracks.")]
    Charts,
    /// Admin statistics
    #[command(description = "Show bot statistics.", hide)]
    Stats,
}

impl Command {
    /// Whether the feature behind this command is switched on.
    #[must_use]
    pub const fn is_enabled(&self, settings: &TelegramSettings) -> bool {
        match self {
            Self::Language => settings.enable_language_selection,
            Self::Track(_) => settings.enable_track_info,
            Self::Artist(_) => settings.enable_artist_info,
            Self::Charts => settings.enable_charts,
            Self::Start | Self::Help | Self::About | Self::Stats => true,
        }
    }
}

/// Public command list for `set_my_commands`, without disabled features.
#[must_use]
pub fn visible_commands(settings: &TelegramSettings) -> Vec<BotCommand> {
    Command::bot_commands()
        .into_iter()
        .filter(|c| match c.command.trim_start_matches('/') {
            "language" => settings.enable_language_selection,
            "track" => settings.enable_track_info,
            "artist" => settings.enable_artist_info,
            "charts" => settings.enable_charts,
            _ => true,
        })
        .collect()
}

async fn send_html(bot: &Bot, chat_id: ChatId, text: impl Into<String>) -> Result<()> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Reply with the localized text for a failure category.
pub(crate) async fn send_error(
    bot: &Bot,
    chat_id: ChatId,
    lang: Language,
    kind: ErrorText,
    settings: &BotSettings,
) -> Result<()> {
    let text = i18n::error_text(lang, kind, settings.telegram.max_file_mb());
    send_html(bot, chat_id, text).await
}

/// Map a relay failure to its user-facing reply.
pub(crate) async fn send_relay_error(
    bot: &Bot,
    chat_id: ChatId,
    lang: Language,
    err: &RelayError,
    settings: &BotSettings,
) -> Result<()> {
    let kind = match err {
        RelayError::RateLimited { .. } => ErrorText::RateLimited,
        RelayError::Upstream(e) => {
            warn!("Music service request failed: {e}");
            ErrorText::ApiError
        }
    };
    send_error(bot, chat_id, lang, kind, settings).await
}

async fn send_card(
    bot: &Bot,
    chat_id: ChatId,
    caption: String,
    image: Option<&str>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    if let Some(url) = image.and_then(|u| Url::parse(u).ok()) {
        let mut req = bot
            .send_photo(chat_id, InputFile::url(url))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html);
        if let Some(kb) = keyboard.clone() {
            req = req.reply_markup(kb);
        }
        match req.await {
            Ok(_) => return Ok(()),
            // Telegram could not fetch the artwork; the text alone still helps.
            Err(e) => warn!("Sending artwork failed, falling back to text: {e}"),
        }
    }

    let mut req = bot.send_message(chat_id, caption).parse_mode(ParseMode::Html);
    if let Some(kb) = keyboard {
        req = req.reply_markup(kb);
    }
    req.await?;
    Ok(())
}

/// Send a track card, with artwork when available.
pub(crate) async fn send_track(
    bot: &Bot,
    chat_id: ChatId,
    track: &Track,
    lang: Language,
    settings: &BotSettings,
) -> Result<()> {
    let keyboard = track_keyboard(track, lang, settings.telegram.enable_artist_info);
    send_card(
        bot,
        chat_id,
        format::track_card(track, lang),
        track.artwork_url.as_deref(),
        keyboard,
    )
    .await
}

fn artist_keyboard(artist: &Artist, lang: Language) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        i18n::similar_button(lang),
        CallbackAction::Similar(artist.id).encode(),
    )]])
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(
    bot: Bot,
    msg: Message,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!(
        "User {user_id} ({}) initiated /start command.",
        get_user_name(&msg)
    );

    let lang = prefs.get(user_id).await;
    let text = i18n::start_text(lang, &settings.telegram.bot_username);
    let mut req = bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html);
    if settings.telegram.enable_language_selection {
        req = req.reply_markup(language_keyboard());
    }
    req.await?;
    Ok(())
}

/// Help handler
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn help(
    bot: Bot,
    msg: Message,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let lang = prefs.get(get_user_id_safe(&msg)).await;
    let text = i18n::help_text(
        lang,
        &settings.telegram.bot_username,
        settings.telegram.max_file_mb(),
    );
    send_html(&bot, msg.chat.id, text).await
}

/// About handler
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn about(bot: Bot, msg: Message, prefs: Arc<LanguagePreferences>) -> Result<()> {
    let lang = prefs.get(get_user_id_safe(&msg)).await;
    send_html(&bot, msg.chat.id, i18n::about_text(lang)).await
}

/// Language picker
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn language(bot: Bot, msg: Message, prefs: Arc<LanguagePreferences>) -> Result<()> {
    let lang = prefs.get(get_user_id_safe(&msg)).await;
    bot.send_message(msg.chat.id, i18n::language_prompt(lang))
        .reply_markup(language_keyboard())
        .await?;
    Ok(())
}

/// `/track <query>`
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn track(
    bot: Bot,
    msg: Message,
    query: String,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let lang = prefs.get(user_id).await;
    let query = query.trim();
    if query.is_empty() {
        return send_html(&bot, msg.chat.id, i18n::track_usage(lang)).await;
    }

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    match relay.find_track(user_id, query).await {
        Ok(Some(track)) => send_track(&bot, msg.chat.id, &track, lang, &settings).await,
        Ok(None) => send_error(&bot, msg.chat.id, lang, ErrorText::NoResults, &settings).await,
        Err(e) => send_relay_error(&bot, msg.chat.id, lang, &e, &settings).await,
    }
}

/// `/artist <query>`
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn artist(
    bot: Bot,
    msg: Message,
    query: String,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let lang = prefs.get(user_id).await;
    let query = query.trim();
    if query.is_empty() {
        return send_html(&bot, msg.chat.id, i18n::artist_usage(lang)).await;
    }

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    match relay.find_artist(user_id, query).await {
        Ok(Some(artist)) => {
            send_card(
                &bot,
                msg.chat.id,
                format::artist_card(&artist, lang),
                artist.picture_url.as_deref(),
                Some(artist_keyboard(&artist, lang)),
            )
            .await
        }
        Ok(None) => send_error(&bot, msg.chat.id, lang, ErrorText::NoResults, &settings).await,
        Err(e) => send_relay_error(&bot, msg.chat.id, lang, &e, &settings).await,
    }
}

/// `/charts`
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn charts(
    bot: Bot,
    msg: Message,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let lang = prefs.get(user_id).await;

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    match relay.top_tracks(user_id, CHART_SIZE).await {
        Ok(tracks) if tracks.is_empty() => {
            send_error(&bot, msg.chat.id, lang, ErrorText::NoResults, &settings).await
        }
        Ok(tracks) => send_html(&bot, msg.chat.id, format::chart_list(&tracks, lang)).await,
        Err(e) => send_relay_error(&bot, msg.chat.id, lang, &e, &settings).await,
    }
}

/// Admin statistics text.
fn stats_text(relay: &Relay, cache: &UnauthorizedCache) -> String {
    let gate = relay.gate();
    let status = if gate.is_enabled() { "on" } else { "off" };
    format!(
        "📊 <b>Bot statistics</b>\n\n\
         Rate limiting: {status} ({} requests / {}s)\n\
         Tracked users: {}\n\
         Unauthorized users in cooldown: {}\n\
         Silenced unauthorized attempts: {}",
        gate.max_requests(),
        gate.window().as_secs(),
        gate.tracked_users(),
        cache.entry_count(),
        cache.silenced_count(),
    )
}

/// Stats handler, admins only
///
/// # Errors
///
/// Returns an error if the stats message cannot be sent.
pub async fn stats(
    bot: Bot,
    msg: Message,
    relay: Arc<Relay>,
    cache: Arc<UnauthorizedCache>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    if !settings.is_admin(user_id) {
        info!("Ignoring /stats from non-admin user {user_id}");
        return Ok(());
    }

    info!(
        tracked = relay.gate().tracked_users(),
        remaining = relay.gate().remaining(&user_id, Instant::now()),
        "Stats requested by admin {user_id}"
    );
    send_html(&bot, msg.chat.id, stats_text(&relay, &cache)).await
}
