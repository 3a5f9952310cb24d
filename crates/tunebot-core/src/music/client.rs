//! HTTP implementation of [`MusicService`]: AudD for audio recognition,
//! Deezer for catalog lookups.

use super::{audd, deezer, Artist, MusicService, MusicServiceError, Track};
use crate::config::CoreSettings;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::{debug, instrument};

/// Deezer caps page sizes at 100.
const DEEZER_MAX_LIMIT: usize = 100;

/// Music service backed by the public AudD and Deezer HTTP APIs
pub struct HttpMusicService {
    http: HttpClient,
    audd_url: String,
    audd_token: Option<String>,
    deezer_url: String,
    timeout: Duration,
}

impl HttpMusicService {
    /// Create a client from core settings.
    ///
    /// The HTTP client carries the configured timeout so a stuck upstream
    /// can never hold a handler forever.
    ///
    /// # Errors
    ///
    /// Returns `MusicServiceError::Network` if the HTTP client cannot be
    /// built (e.g. the TLS backend fails to initialize).
    pub fn new(settings: &CoreSettings) -> Result<Self, MusicServiceError> {
        let timeout = Duration::from_secs(settings.music_http_timeout_secs);
        let http = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            audd_url: settings.audd_api_url.clone(),
            audd_token: settings.audd_api_token.clone(),
            deezer_url: settings.deezer_api_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Per-request timeout applied to every upstream call.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether audio recognition has credentials.
    #[must_use]
    pub const fn can_recognize(&self) -> bool {
        self.audd_token.is_some()
    }

    async fn deezer_get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<String, MusicServiceError> {
        let url = format!("{}{path}", self.deezer_url);
        let response = self.http.get(&url).query(query).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MusicServiceError::Api(format!(
                "Deezer returned {status} for {path}"
            )));
        }
        Ok(body)
    }
}

fn clamp_limit(limit: usize) -> String {
    limit.clamp(1, DEEZER_MAX_LIMIT).to_string()
}

#[async_trait]
impl MusicService for HttpMusicService {
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    async fn recognize_audio(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<Option<Track>, MusicServiceError> {
        let token = self
            .audd_token
            .clone()
            .ok_or_else(|| MusicServiceError::MissingConfig("AUDD_API_TOKEN".to_string()))?;

        let form = Form::new()
            .text("api_token", token)
            .text("return", "apple_music,spotify")
            .part("file", Part::bytes(audio).file_name(file_name.to_string()));

        let response = self.http.post(&self.audd_url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MusicServiceError::Api(format!("AudD returned {status}")));
        }

        let track = audd::parse_recognition(&body)?;
        debug!(matched = track.is_some(), "Recognition finished");
        Ok(track)
    }

    #[instrument(skip(self))]
    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Track>, MusicServiceError> {
        let body = self
            .deezer_get(
                "/search",
                &[("q", query.to_string()), ("limit", clamp_limit(limit))],
            )
            .await?;
        let mut tracks = deezer::parse_tracks(&body)?;
        tracks.truncate(limit);
        Ok(tracks)
    }

    #[instrument(skip(self))]
    async fn search_artist(&self, query: &str) -> Result<Option<Artist>, MusicServiceError> {
        let body = self
            .deezer_get(
                "/search/artist",
                &[("q", query.to_string()), ("limit", clamp_limit(1))],
            )
            .await?;
        deezer::parse_first_artist(&body)
    }

    #[instrument(skip(self))]
    async fn top_tracks(&self, limit: usize) -> Result<Vec<Track>, MusicServiceError> {
        let body = self
            .deezer_get("/chart/0/tracks", &[("limit", clamp_limit(limit))])
            .await?;
        let mut tracks = deezer::parse_tracks(&body)?;
        tracks.truncate(limit);
        Ok(tracks)
    }

    #[instrument(skip(self))]
    async fn similar_tracks(
        &self,
        artist_id: u64,
        limit: usize,
    ) -> Result<Vec<Track>, MusicServiceError> {
        let body = self
            .deezer_get(
                &format!("/artist/{artist_id}/radio"),
                &[("limit", clamp_limit(limit))],
            )
            .await?;
        let mut tracks = deezer::parse_tracks(&body)?;
        tracks.truncate(limit);
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0), "1");
        assert_eq!(clamp_limit(10), "10");
        assert_eq!(clamp_limit(1_000), "100");
    }

    #[tokio::test]
    async fn test_recognize_without_token_fails_before_network() {
        let service = HttpMusicService::new(&CoreSettings::default()).expect("client builds");
        assert!(!service.can_recognize());

        let result = service.recognize_audio(vec![0_u8; 16], "clip.ogg").await;
        assert!(matches!(result, Err(MusicServiceError::MissingConfig(_))));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let settings = CoreSettings {
            deezer_api_url: "https://api.deezer.com/".to_string(),
            ..CoreSettings::default()
        };
        let service = HttpMusicService::new(&settings).expect("client builds");
        assert_eq!(service.deezer_url, "https://api.deezer.com");
    }

    #[test]
    fn test_client_keeps_configured_timeout() {
        let settings = CoreSettings {
            music_http_timeout_secs: 7,
            ..CoreSettings::default()
        };
        let service = HttpMusicService::new(&settings).expect("client builds");
        assert_eq!(service.timeout(), Duration::from_secs(7));
    }
}
