//! Inline keyboard button presses.

use crate::bot::handlers::{send_error, send_relay_error};
use crate::bot::views::CallbackAction;
use crate::config::BotSettings;
use anyhow::Result;
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{CallbackQuery, ParseMode},
};
use tracing::{info, warn};
use tunebot_core::format;
use tunebot_core::i18n::{self, card_labels, ErrorText, LanguagePreferences};
use tunebot_core::music::Track;
use tunebot_core::relay::Relay;

/// Tracks listed for a similar-songs press.
const SIMILAR_SIZE: usize = 10;

/// Name to put in the similar-tracks heading.
fn seed_artist_name(artist_id: u64, tracks: &[Track]) -> Option<&str> {
    tracks
        .iter()
        .find(|t| t.artist_id == Some(artist_id) && !t.artist.is_empty())
        .map(|t| t.artist.as_str())
}

/// Callback query handler
///
/// Language switches are free; similar-track lookups go through the gate.
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    // Stop the button spinner whatever the payload.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query from user {}: {e}", q.from.id);
    }

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        return Ok(());
    };

    let user_id = q.from.id.0.cast_signed();
    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .ok_or_else(|| anyhow::anyhow!("Callback message missing chat id"))?;

    match action {
        CallbackAction::SetLanguage(lang) => {
            if !settings.telegram.enable_language_selection {
                return Ok(());
            }
            prefs.set(user_id, lang).await;
            info!("User {user_id} switched language to {lang}");
            bot.send_message(chat_id, i18n::language_changed(lang))
                .await?;
            Ok(())
        }
        CallbackAction::Similar(artist_id) => {
            if !settings.telegram.enable_artist_info {
                return Ok(());
            }
            let lang = prefs.get(user_id).await;
            match relay.similar_tracks(user_id, artist_id, SIMILAR_SIZE).await {
                Ok(tracks) if tracks.is_empty() => {
                    send_error(&bot, chat_id, lang, ErrorText::NoResults, &settings).await
                }
                Ok(tracks) => {
                    let name = seed_artist_name(artist_id, &tracks)
                        .unwrap_or(card_labels(lang).unknown_artist);
                    bot.send_message(chat_id, format::similar_list(name, &tracks, lang))
                        .parse_mode(ParseMode::Html)
                        .await?;
                    Ok(())
                }
                Err(e) => send_relay_error(&bot, chat_id, lang, &e, &settings).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramSettings;
    use reqwest::Url;
    use std::time::Duration;
    use tunebot_core::admission::{AdmissionGate, GateConfig};
    use tunebot_core::config::CoreSettings;
    use tunebot_core::i18n::Language;
    use tunebot_core::music::HttpMusicService;

    /// Bot whose API endpoint refuses every connection.
    fn offline_bot() -> Bot {
        let url = Url::parse("http://127.0.0.1:9/").expect("valid url");
        Bot::new("123456789:TEST").set_api_url(url)
    }

    fn callback(data: Option<&str>) -> CallbackQuery {
        serde_json::from_value(serde_json::json!({
            "id": "4382bfdwdsb323b2d9",
            "from": { "id": 42, "is_bot": false, "first_name": "Ana" },
            "chat_instance": "-3141592653589793238",
            "data": data,
        }))
        .expect("valid callback query")
    }

    fn deps() -> (Arc<Relay>, Arc<LanguagePreferences>, Arc<BotSettings>) {
        let core = CoreSettings::default();
        let gate = AdmissionGate::new(GateConfig::default()).expect("valid config");
        let service = HttpMusicService::new(&core).expect("client builds");
        let relay = Arc::new(Relay::new(Arc::new(gate), Arc::new(service)));
        let prefs = Arc::new(LanguagePreferences::new(
            Language::En,
            16,
            Duration::from_secs(60),
        ));
        let settings = Arc::new(BotSettings::new(core, TelegramSettings::default()));
        (relay, prefs, settings)
    }

    #[tokio::test]
    async fn test_failed_acknowledgement_does_not_abort_handler() {
        let (relay, prefs, settings) = deps();

        for data in [None, Some("unknown:payload")] {
            let result = handle_callback(
                offline_bot(),
                callback(data),
                Arc::clone(&relay),
                Arc::clone(&prefs),
                Arc::clone(&settings),
            )
            .await;
            assert!(result.is_ok(), "payload {data:?} should be ignored quietly");
        }
    }

    #[test]
    fn test_seed_artist_name_prefers_matching_id() {
        let tracks = vec![
            Track {
                artist: "Justice".to_string(),
                artist_id: Some(7),
                ..Track::default()
            },
            Track {
                artist: "Daft Punk".to_string(),
                artist_id: Some(27),
                ..Track::default()
            },
        ];

        assert_eq!(seed_artist_name(27, &tracks), Some("Daft Punk"));
        assert_eq!(seed_artist_name(99, &tracks), None);
    }
}
