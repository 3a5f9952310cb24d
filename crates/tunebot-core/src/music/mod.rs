//! Music recognition and catalog lookups
//!
//! The bot talks to the upstream only through [`MusicService`], so handlers
//! and the relay can be tested against a mock.

mod audd;
mod client;
mod deezer;

pub use client::HttpMusicService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the music service
#[derive(Debug, Error)]
pub enum MusicServiceError {
    /// Error returned by the service's API
    #[error("API error: {0}")]
    Api(String),
    /// Error during network communication (includes timeouts)
    #[error("Network error: {0}")]
    Network(String),
    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(String),
    /// Missing credential or endpoint
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
}

impl From<reqwest::Error> for MusicServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Json(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for MusicServiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

/// Streaming and store links for a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackLinks {
    /// Spotify track page
    pub spotify: Option<String>,
    /// Apple Music track page
    pub apple_music: Option<String>,
    /// Deezer track page
    pub deezer: Option<String>,
    /// Aggregated link page covering several services
    pub song_link: Option<String>,
}

/// A matched or searched track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Provider identifier, used for inline result ids
    pub id: Option<String>,
    /// Track title
    pub title: String,
    /// Performing artist
    pub artist: String,
    /// Catalog id of the artist, when known
    pub artist_id: Option<u64>,
    /// Album title
    pub album: Option<String>,
    /// Year of release
    pub release_year: Option<u16>,
    /// Genre names
    pub genres: Vec<String>,
    /// Cover art URL
    pub artwork_url: Option<String>,
    /// External links
    pub links: TrackLinks,
}

/// An artist profile from the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    /// Catalog id
    pub id: u64,
    /// Artist name
    pub name: String,
    /// Number of fans
    pub fans: Option<u64>,
    /// Number of albums
    pub albums: Option<u32>,
    /// Portrait URL
    pub picture_url: Option<String>,
    /// Catalog page
    pub link: Option<String>,
}

/// Interface to the recognition and search backend
///
/// Every call is a single remote request; implementations do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MusicService: Send + Sync {
    /// Identify a track from raw audio bytes. `Ok(None)` means no match.
    async fn recognize_audio(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<Option<Track>, MusicServiceError>;

    /// Search tracks by free text, best match first.
    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Track>, MusicServiceError>;

    /// Find the best matching artist.
    async fn search_artist(&self, query: &str) -> Result<Option<Artist>, MusicServiceError>;

    /// Global top tracks.
    async fn top_tracks(&self, limit: usize) -> Result<Vec<Track>, MusicServiceError>;

    /// Tracks similar to the given artist's catalog.
    async fn similar_tracks(
        &self,
        artist_id: u64,
        limit: usize,
    ) -> Result<Vec<Track>, MusicServiceError>;
}

/// First four digits of a `YYYY-MM-DD` style date.
fn parse_year(date: &str) -> Option<u16> {
    date.get(..4)
        .and_then(|y| y.parse::<u16>().ok())
        .filter(|y| *y > 0)
}

#[cfg(test)]
mod tests {
    use super::parse_year;

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2014-09-18"), Some(2014));
        assert_eq!(parse_year("1975"), Some(1975));
        assert_eq!(parse_year("0000-00-00"), None);
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_year(""), None);
    }
}
