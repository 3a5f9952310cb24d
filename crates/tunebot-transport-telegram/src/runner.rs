use crate::bot;
use crate::bot::handlers::{get_user_id_safe, get_user_name, visible_commands, Command};
use crate::bot::UnauthorizedCache;
use crate::config::BotSettings;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineQuery};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tunebot_core::admission::AdmissionGate;
use tunebot_core::i18n::{LanguagePreferences, ACCESS_DENIED};
use tunebot_core::music::HttpMusicService;
use tunebot_core::relay::Relay;

/// Users whose language choice is remembered at once.
const LANGUAGE_CACHE_CAPACITY: u64 = 100_000;
/// A language choice is forgotten after this long without activity.
const LANGUAGE_IDLE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Run the Telegram transport runtime.
///
/// # Errors
///
/// Returns an error if the admission gate or the music HTTP client cannot
/// be built from the settings.
pub async fn run_bot(settings: Arc<BotSettings>) -> anyhow::Result<()> {
    let relay = init_relay(&settings)?;
    let prefs = Arc::new(LanguagePreferences::new(
        settings.core.default_language,
        LANGUAGE_CACHE_CAPACITY,
        LANGUAGE_IDLE_TTL,
    ));
    let unauthorized_cache = init_unauthorized_cache(&settings);

    let shutdown = CancellationToken::new();
    let janitor = settings.core.janitor_period().map(|period| {
        Arc::clone(relay.gate()).spawn_janitor(period, shutdown.child_token())
    });

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    register_commands(&bot, &settings).await;
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay, prefs, settings, unauthorized_cache])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    if let Some(handle) = janitor {
        if let Err(e) = handle.await {
            warn!("Admission janitor ended abnormally: {e}");
        }
    }
    info!("Bot stopped.");
    Ok(())
}

fn init_relay(settings: &BotSettings) -> anyhow::Result<Arc<Relay>> {
    let gate = AdmissionGate::new(settings.core.gate_config())?;
    info!(
        "Admission gate initialized (enabled: {}, {} requests / {}s)",
        gate.is_enabled(),
        gate.max_requests(),
        gate.window().as_secs()
    );

    let service = HttpMusicService::new(&settings.core)?;
    if !service.can_recognize() {
        warn!("AUDD_API_TOKEN is not set; audio recognition requests will fail.");
    }

    Ok(Arc::new(Relay::new(Arc::new(gate), Arc::new(service))))
}

fn init_unauthorized_cache(settings: &BotSettings) -> Arc<UnauthorizedCache> {
    let cooldown = settings.telegram.unauthorized_cooldown_secs;
    let ttl = settings.telegram.unauthorized_cache_ttl_secs;
    let max_size = settings.telegram.unauthorized_cache_max_size;

    info!(
        "Initializing UnauthorizedCache (cooldown: {}s, ttl: {}s, max_size: {})",
        cooldown, ttl, max_size
    );

    Arc::new(UnauthorizedCache::new(cooldown, ttl, max_size))
}

async fn register_commands(bot: &Bot, settings: &BotSettings) {
    let commands = visible_commands(&settings.telegram);
    match bot.set_my_commands(commands).await {
        Ok(_) => info!("Bot commands registered."),
        Err(e) => error!("Failed to register bot commands: {}", e),
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_inline_query()
                .filter(|q: InlineQuery, settings: Arc<BotSettings>| {
                    settings.telegram.enable_inline_mode
                        && settings.is_allowed(q.from.id.0.cast_signed())
                })
                .endpoint(handle_inline_query),
        )
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery, settings: Arc<BotSettings>| {
                    settings.is_allowed(q.from.id.0.cast_signed())
                })
                .endpoint(handle_callback_query),
        )
        .branch(
            Update::filter_message().branch(
                // Main branch for allowed users
                dptree::filter(|msg: Message, settings: Arc<BotSettings>| {
                    settings.is_allowed(get_user_id_safe(&msg))
                })
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message, settings: Arc<BotSettings>| {
                        settings.telegram.enable_audio_recognition
                            && (msg.audio().is_some()
                                || msg.voice().is_some()
                                || msg.document().is_some())
                    })
                    .endpoint(handle_audio_message),
                ),
            ),
        )
        .branch(
            // Everyone the filter above turned away
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<BotSettings>| {
                    !settings.is_allowed(get_user_id_safe(&msg))
                })
                .endpoint(handle_unauthorized),
        )
}

async fn handle_unauthorized(
    bot: Bot,
    msg: Message,
    cache: Arc<UnauthorizedCache>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    let user_name = get_user_name(&msg);

    if cache.should_send(user_id, &user_name).await {
        info!(
            "⛔️ Unauthorized access from user {} ({}). Sending denial message.",
            user_id, user_name
        );

        if let Err(e) = bot.send_message(msg.chat.id, ACCESS_DENIED).await {
            error!("Failed to send access denied message to {}: {}", user_id, e);
        } else {
            cache.mark_sent(user_id).await;
        }
    }

    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    cache: Arc<UnauthorizedCache>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    if !cmd.is_enabled(&settings.telegram) {
        debug!("Ignoring disabled command {:?}", cmd);
        return respond(());
    }

    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, prefs, settings).await,
        Command::Help => bot::handlers::help(bot, msg, prefs, settings).await,
        Command::About => bot::handlers::about(bot, msg, prefs).await,
        Command::Language => bot::handlers::language(bot, msg, prefs).await,
        Command::Track(query) => {
            bot::handlers::track(bot, msg, query, relay, prefs, settings).await
        }
        Command::Artist(query) => {
            bot::handlers::artist(bot, msg, query, relay, prefs, settings).await
        }
        Command::Charts => bot::handlers::charts(bot, msg, relay, prefs, settings).await,
        Command::Stats => bot::handlers::stats(bot, msg, relay, cache, settings).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_audio_message(
    bot: Bot,
    msg: Message,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::audio::handle_audio(bot, msg, relay, prefs, settings).await {
        error!("Audio handler error: {}", e);
    }
    respond(())
}

async fn handle_inline_query(
    bot: Bot,
    q: InlineQuery,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::inline::handle_inline(bot, q, relay, prefs, settings).await {
        error!("Inline query handler error: {}", e);
    }
    respond(())
}

async fn handle_callback_query(
    bot: Bot,
    q: CallbackQuery,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::callbacks::handle_callback(bot, q, relay, prefs, settings).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}
