//! Keyboards and callback data
//!
//! Inline keyboards attached to bot replies and the encoding of their
//! callback payloads.

use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tunebot_core::i18n::{similar_button, Language};
use tunebot_core::music::Track;

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Callback prefix for language buttons, followed by the language code
pub const LANG_CALLBACK_PREFIX: &str = "lang:";
/// Callback prefix for similar-track buttons, followed by the artist id
pub const SIMILAR_CALLBACK_PREFIX: &str = "similar:";

/// Decoded inline button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Switch the interface language
    SetLanguage(Language),
    /// List tracks similar to an artist
    Similar(u64),
}

impl CallbackAction {
    /// Decode callback data. Unknown or malformed payloads yield `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(code) = data.strip_prefix(LANG_CALLBACK_PREFIX) {
            return code.parse().ok().map(Self::SetLanguage);
        }
        if let Some(id) = data.strip_prefix(SIMILAR_CALLBACK_PREFIX) {
            return id.parse().ok().map(Self::Similar);
        }
        None
    }

    /// Encode as callback data (always well under Telegram's 64 bytes).
    #[must_use]
    pub fn encode(self) -> String {
        match self {
            Self::SetLanguage(lang) => format!("{LANG_CALLBACK_PREFIX}{}", lang.code()),
            Self::Similar(artist_id) => format!("{SIMILAR_CALLBACK_PREFIX}{artist_id}"),
        }
    }
}

/// One button per supported language.
#[must_use]
pub fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![Language::ALL
        .iter()
        .map(|lang| {
            InlineKeyboardButton::callback(
                lang.label(),
                CallbackAction::SetLanguage(*lang).encode(),
            )
        })
        .collect::<Vec<_>>()])
}

/// Streaming links plus a similar-tracks button, if any apply.
///
/// Links that are not valid URLs are skipped rather than failing the reply.
#[must_use]
pub fn track_keyboard(
    track: &Track,
    lang: Language,
    similar_enabled: bool,
) -> Option<InlineKeyboardMarkup> {
    let links = &track.links;
    let url_buttons: Vec<InlineKeyboardButton> = [
        ("🎧 Spotify", links.spotify.as_deref()),
        ("🍎 Apple Music", links.apple_music.as_deref()),
        ("🎶 Deezer", links.deezer.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, url)| {
        url.and_then(|u| Url::parse(u).ok())
            .map(|u| InlineKeyboardButton::url(label, u))
    })
    .collect();

    let mut rows = Vec::new();
    if !url_buttons.is_empty() {
        rows.push(url_buttons);
    }
    if let Some(artist_id) = track.artist_id.filter(|_| similar_enabled) {
        rows.push(vec![InlineKeyboardButton::callback(
            similar_button(lang),
            CallbackAction::Similar(artist_id).encode(),
        )]);
    }

    (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunebot_core::music::TrackLinks;

    #[test]
    fn test_callback_round_trip() {
        for action in [
            CallbackAction::SetLanguage(Language::Fa),
            CallbackAction::SetLanguage(Language::En),
            CallbackAction::Similar(27),
        ] {
            assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
        }
    }

    #[test]
    fn test_callback_rejects_garbage() {
        assert_eq!(CallbackAction::parse("lang:de"), None);
        assert_eq!(CallbackAction::parse("similar:abc"), None);
        assert_eq!(CallbackAction::parse("similar:-1"), None);
        assert_eq!(CallbackAction::parse("retry_no_loop"), None);
    }

    #[test]
    fn test_language_keyboard_has_all_languages() {
        let keyboard = language_keyboard();
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), Language::ALL.len());
    }

    #[test]
    fn test_track_keyboard() {
        let mut track = Track {
            artist_id: Some(27),
            links: TrackLinks {
                spotify: Some("https://open.spotify.com/track/x".to_string()),
                deezer: Some("not a url".to_string()),
                ..TrackLinks::default()
            },
            ..Track::default()
        };

        let keyboard = track_keyboard(&track, Language::En, true);
        let rows = keyboard.map(|k| k.inline_keyboard).unwrap_or_default();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[1][0].text, "🎵 Similar Songs");

        assert_eq!(
            track_keyboard(&track, Language::En, false).map(|k| k.inline_keyboard.len()),
            Some(1)
        );

        track.links = TrackLinks::default();
        assert!(track_keyboard(&track, Language::En, false).is_none());
    }
}
