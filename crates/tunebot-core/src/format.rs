//! Telegram HTML rendering of tracks, artists and track lists.
//!
//! Every upstream string is escaped here; nothing else in the bot inserts
//! catalog text into HTML.

use crate::i18n::{card_labels, charts_title, similar_title, Language};
use crate::music::{Artist, Track};
use crate::utils::{group_thousands, truncate_with_ellipsis};
use html_escape::{encode_double_quoted_attribute, encode_text};

/// Telegram's cap on media captions.
pub const CAPTION_LIMIT: usize = 1024;
/// Telegram's cap on message text.
pub const MESSAGE_LIMIT: usize = 4096;

const TITLE_MAX_CHARS: usize = 200;
const FIELD_MAX_CHARS: usize = 120;

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

fn escaped(value: &str, max_chars: usize) -> String {
    encode_text(&truncate_with_ellipsis(value.trim(), max_chars)).into_owned()
}

fn link(url: &str, label: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        encode_double_quoted_attribute(url),
        encode_text(label)
    )
}

/// Join whole lines until the next one would exceed `limit` characters.
/// Lines are never split, so tags stay balanced.
fn join_within(lines: &[String], limit: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for line in lines {
        let cost = line.chars().count() + usize::from(!out.is_empty());
        if used + cost > limit {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
        used += cost;
    }
    out
}

fn link_lines(track: &Track) -> Vec<String> {
    let links = &track.links;
    [
        ("🎧", links.spotify.as_deref(), "Spotify"),
        ("🍎", links.apple_music.as_deref(), "Apple Music"),
        ("🎶", links.deezer.as_deref(), "Deezer"),
        ("🔗", links.song_link.as_deref(), "song.link"),
    ]
    .into_iter()
    .filter_map(|(icon, url, label)| url.map(|u| format!("{icon} {}", link(u, label))))
    .collect()
}

/// Full card for a recognized or searched track, fit for a photo caption.
#[must_use]
pub fn track_card(track: &Track, lang: Language) -> String {
    let labels = card_labels(lang);
    let mut lines = vec![
        format!(
            "🎵 <b>{}</b>",
            escaped(or_placeholder(&track.title, labels.unknown_title), TITLE_MAX_CHARS)
        ),
        format!(
            "👤 <b>{}:</b> {}",
            labels.artist,
            escaped(or_placeholder(&track.artist, labels.unknown_artist), FIELD_MAX_CHARS)
        ),
        format!(
            "💿 <b>{}:</b> {}",
            labels.album,
            escaped(
                track.album.as_deref().unwrap_or(labels.unknown_album),
                FIELD_MAX_CHARS
            )
        ),
    ];

    if !track.genres.is_empty() {
        lines.push(format!(
            "🎼 <b>{}:</b> {}",
            labels.genre,
            escaped(&track.genres.join(", "), FIELD_MAX_CHARS)
        ));
    }
    if let Some(year) = track.release_year {
        lines.push(format!("📅 <b>{}:</b> {year}", labels.year));
    }

    let links = link_lines(track);
    if !links.is_empty() {
        lines.push(String::new());
        lines.extend(links);
    }

    join_within(&lines, CAPTION_LIMIT)
}

/// Artist profile card.
#[must_use]
pub fn artist_card(artist: &Artist, lang: Language) -> String {
    let labels = card_labels(lang);
    let mut lines = vec![format!(
        "👤 <b>{}</b>",
        escaped(or_placeholder(&artist.name, labels.unknown_artist), TITLE_MAX_CHARS)
    )];

    if let Some(albums) = artist.albums {
        lines.push(format!("💿 <b>{}:</b> {albums}", labels.albums));
    }
    if let Some(fans) = artist.fans {
        lines.push(format!("👥 <b>{}:</b> {}", labels.fans, group_thousands(fans)));
    }
    if let Some(url) = artist.link.as_deref() {
        lines.push(format!("🎶 {}", link(url, "Deezer")));
    }

    join_within(&lines, CAPTION_LIMIT)
}

fn numbered(tracks: &[Track], lang: Language) -> Vec<String> {
    let labels = card_labels(lang);
    tracks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                "{}. <b>{}</b> - {}",
                i + 1,
                escaped(or_placeholder(&t.title, labels.unknown_title), FIELD_MAX_CHARS),
                escaped(or_placeholder(&t.artist, labels.unknown_artist), FIELD_MAX_CHARS)
            )
        })
        .collect()
}

/// Numbered global chart.
#[must_use]
pub fn chart_list(tracks: &[Track], lang: Language) -> String {
    let mut lines = vec![charts_title(lang, tracks.len()), String::new()];
    lines.extend(numbered(tracks, lang));
    join_within(&lines, MESSAGE_LIMIT)
}

/// Numbered list of tracks similar to `artist`.
#[must_use]
pub fn similar_list(artist: &str, tracks: &[Track], lang: Language) -> String {
    let mut lines = vec![similar_title(lang, artist), String::new()];
    lines.extend(numbered(tracks, lang));
    join_within(&lines, MESSAGE_LIMIT)
}

/// Plain-text title of an inline result.
#[must_use]
pub fn inline_title(track: &Track) -> String {
    truncate_with_ellipsis(&format!("{} - {}", track.title, track.artist), TITLE_MAX_CHARS)
}

/// Plain-text description of an inline result.
#[must_use]
pub fn inline_description(track: &Track, lang: Language) -> String {
    let artist = or_placeholder(&track.artist, card_labels(lang).unknown_artist);
    let text = match lang {
        Language::En => format!("Track by {artist}"),
        Language::Fa => format!("آهنگ از {artist}"),
    };
    truncate_with_ellipsis(&text, FIELD_MAX_CHARS)
}

/// HTML message sent when an inline result is picked.
#[must_use]
pub fn inline_message(track: &Track, lang: Language) -> String {
    let labels = card_labels(lang);
    let mut lines = vec![
        format!(
            "🎵 <b>{}</b>",
            escaped(or_placeholder(&track.title, labels.unknown_title), TITLE_MAX_CHARS)
        ),
        format!(
            "👤 {}",
            escaped(or_placeholder(&track.artist, labels.unknown_artist), FIELD_MAX_CHARS)
        ),
    ];
    lines.extend(link_lines(track));
    join_within(&lines, MESSAGE_LIMIT)
}
