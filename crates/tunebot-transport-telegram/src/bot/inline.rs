//! Inline mode: `@bot query` in any chat.

use crate::config::BotSettings;
use anyhow::Result;
use reqwest::Url;
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{
        InlineQuery, InlineQueryResult, InlineQueryResultArticle, InputMessageContent,
        InputMessageContentText, ParseMode,
    },
};
use tracing::{debug, warn};
use tunebot_core::format;
use tunebot_core::i18n::{Language, LanguagePreferences};
use tunebot_core::music::Track;
use tunebot_core::relay::{Relay, RelayError};

/// Seconds Telegram may cache an answer for the same query.
pub const INLINE_CACHE_TIME: u32 = 300;

/// Turn tracks into article results.
#[must_use]
pub fn build_results(tracks: &[Track], lang: Language) -> Vec<InlineQueryResult> {
    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            // Result ids must be unique within one answer.
            let id = track
                .id
                .as_ref()
                .map_or_else(|| format!("r{i}"), |id| format!("{id}-{i}"));
            let content = InputMessageContent::Text(
                InputMessageContentText::new(format::inline_message(track, lang))
                    .parse_mode(ParseMode::Html),
            );

            let mut article =
                InlineQueryResultArticle::new(id, format::inline_title(track), content)
                    .description(format::inline_description(track, lang));
            if let Some(thumb) = track.artwork_url.as_deref().and_then(|u| Url::parse(u).ok()) {
                article = article.thumbnail_url(thumb);
            }
            InlineQueryResult::Article(article)
        })
        .collect()
}

/// Inline query handler
///
/// Rate-limited or failed queries are left unanswered; Telegram then shows
/// no results, which is all an inline surface can say.
///
/// # Errors
///
/// Returns an error if the answer cannot be delivered.
pub async fn handle_inline(
    bot: Bot,
    q: InlineQuery,
    relay: Arc<Relay>,
    prefs: Arc<LanguagePreferences>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let query = q.query.trim();
    if query.is_empty() {
        return Ok(());
    }

    let user_id = q.from.id.0.cast_signed();
    let lang = prefs.get(user_id).await;

    let tracks = match relay
        .search_tracks(user_id, query, settings.telegram.max_inline_results)
        .await
    {
        Ok(tracks) => tracks,
        Err(RelayError::RateLimited { retry_after }) => {
            debug!(
                "Inline query from user {user_id} rate limited ({}s left)",
                retry_after.as_secs()
            );
            return Ok(());
        }
        Err(e) => {
            warn!("Inline search failed for user {user_id}: {e}");
            return Ok(());
        }
    };

    bot.answer_inline_query(q.id.clone(), build_results(&tracks, lang))
        .cache_time(INLINE_CACHE_TIME)
        .await?;
    Ok(())
}
