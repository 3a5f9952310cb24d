//! Deezer catalog response decoding.

use super::{Artist, MusicServiceError, Track, TrackLinks};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    error: Option<DeezerError>,
}

#[derive(Deserialize, Debug)]
struct DeezerError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    code: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct DeezerTrack {
    id: Option<u64>,
    title: Option<String>,
    link: Option<String>,
    artist: Option<DeezerTrackArtist>,
    album: Option<DeezerAlbum>,
}

#[derive(Deserialize, Debug)]
struct DeezerTrackArtist {
    id: Option<u64>,
    name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct DeezerAlbum {
    title: Option<String>,
    cover_xl: Option<String>,
    cover_big: Option<String>,
}

#[derive(Deserialize, Debug)]
struct DeezerArtist {
    id: u64,
    name: String,
    link: Option<String>,
    picture_xl: Option<String>,
    nb_album: Option<u32>,
    nb_fan: Option<u64>,
}

/// Deezer reports failures in a 200 body as `{"error": {...}}`.
fn decode_page<T: for<'de> Deserialize<'de>>(body: &str) -> Result<Vec<T>, MusicServiceError> {
    let page: Page<T> = serde_json::from_str(body)?;
    if let Some(err) = page.error {
        // "no data" is how Deezer says "nothing found"
        if err.code == Some(800) {
            return Ok(Vec::new());
        }
        return Err(MusicServiceError::Api(format!(
            "Deezer {} ({}): {}",
            err.kind.unwrap_or_else(|| "error".to_string()),
            err.code.map_or_else(|| "?".to_string(), |c| c.to_string()),
            err.message.unwrap_or_default()
        )));
    }
    Ok(page.data)
}

impl From<DeezerTrack> for Track {
    fn from(t: DeezerTrack) -> Self {
        let (artist_id, artist) = t
            .artist
            .map_or((None, String::new()), |a| (a.id, a.name.unwrap_or_default()));
        let (album, artwork_url) = t.album.map_or((None, None), |a| {
            (a.title.filter(|s| !s.is_empty()), a.cover_xl.or(a.cover_big))
        });

        Self {
            id: t.id.map(|id| id.to_string()),
            title: t.title.unwrap_or_default(),
            artist,
            artist_id,
            album,
            release_year: None,
            genres: Vec::new(),
            artwork_url,
            links: TrackLinks {
                deezer: t.link,
                ..TrackLinks::default()
            },
        }
    }
}

impl From<DeezerArtist> for Artist {
    fn from(a: DeezerArtist) -> Self {
        Self {
            id: a.id,
            name: a.name,
            fans: a.nb_fan,
            albums: a.nb_album,
            picture_url: a.picture_xl,
            link: a.link,
        }
    }
}

/// Decode a page of tracks (search, chart, artist radio).
pub(super) fn parse_tracks(body: &str) -> Result<Vec<Track>, MusicServiceError> {
    Ok(decode_page::<DeezerTrack>(body)?
        .into_iter()
        .map(Track::from)
        .filter(|t| !t.title.is_empty())
        .collect())
}

/// Decode a page of artists and keep the best hit.
pub(super) fn parse_first_artist(body: &str) -> Result<Option<Artist>, MusicServiceError> {
    Ok(decode_page::<DeezerArtist>(body)?
        .into_iter()
        .next()
        .map(Artist::from))
}
