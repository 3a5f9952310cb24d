//! AudD recognition response decoding.

use super::{parse_year, MusicServiceError, Track, TrackLinks};
use serde::Deserialize;

/// Artwork size requested from Apple Music templates.
const ARTWORK_SIZE: &str = "600x600";

#[derive(Deserialize, Debug)]
struct AuddResponse {
    status: String,
    result: Option<AuddResult>,
    error: Option<AuddError>,
}

#[derive(Deserialize, Debug)]
struct AuddError {
    error_code: Option<i64>,
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct AuddResult {
    artist: Option<String>,
    title: Option<String>,
    album: Option<String>,
    release_date: Option<String>,
    song_link: Option<String>,
    apple_music: Option<AppleMusic>,
    spotify: Option<Spotify>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AppleMusic {
    url: Option<String>,
    #[serde(default)]
    genre_names: Vec<String>,
    artwork: Option<AppleArtwork>,
}

#[derive(Deserialize, Debug)]
struct AppleArtwork {
    url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Spotify {
    id: Option<String>,
    external_urls: Option<SpotifyUrls>,
    album: Option<SpotifyAlbum>,
}

#[derive(Deserialize, Debug)]
struct SpotifyUrls {
    spotify: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Deserialize, Debug)]
struct SpotifyImage {
    url: String,
    #[serde(default)]
    width: u32,
}

/// Decode an AudD response body. A successful lookup without a match
/// yields `Ok(None)`.
pub(super) fn parse_recognition(body: &str) -> Result<Option<Track>, MusicServiceError> {
    let response: AuddResponse = serde_json::from_str(body)?;

    if response.status != "success" {
        let (code, message) = response.error.map_or((None, None), |e| {
            (e.error_code, e.error_message)
        });
        return Err(MusicServiceError::Api(format!(
            "AudD error {}: {}",
            code.map_or_else(|| "?".to_string(), |c| c.to_string()),
            message.unwrap_or_else(|| "unknown error".to_string())
        )));
    }

    let Some(result) = response.result else {
        return Ok(None);
    };

    // Apple artwork is a template like ".../{w}x{h}bb.jpg"; the largest
    // Spotify cover is the fallback.
    let apple_artwork = result
        .apple_music
        .as_ref()
        .and_then(|a| a.artwork.as_ref())
        .and_then(|a| a.url.as_deref())
        .map(|url| url.replace("{w}x{h}", ARTWORK_SIZE));
    let spotify_artwork = result
        .spotify
        .as_ref()
        .and_then(|s| s.album.as_ref())
        .and_then(|a| a.images.iter().max_by_key(|img| img.width))
        .map(|img| img.url.clone());

    let genres = result
        .apple_music
        .as_ref()
        .map(|a| {
            a.genre_names
                .iter()
                .filter(|g| g.as_str() != "Music")
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let links = TrackLinks {
        spotify: result
            .spotify
            .as_ref()
            .and_then(|s| s.external_urls.as_ref())
            .and_then(|u| u.spotify.clone()),
        apple_music: result.apple_music.as_ref().and_then(|a| a.url.clone()),
        deezer: None,
        song_link: result.song_link.clone(),
    };

    Ok(Some(Track {
        id: result.spotify.as_ref().and_then(|s| s.id.clone()),
        title: result.title.unwrap_or_default(),
        artist: result.artist.unwrap_or_default(),
        artist_id: None,
        album: result.album.filter(|a| !a.is_empty()),
        release_year: result.release_date.as_deref().and_then(parse_year),
        genres,
        artwork_url: apple_artwork.or(spotify_artwork),
        links,
    }))
}
