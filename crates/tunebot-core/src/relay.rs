//! Quota-guarded access to the music service.
//!
//! Every operation asks the admission gate before the upstream call. The
//! gate decision is final by the time the request leaves the process, so a
//! handler cancelled mid-request leaves no half-applied state behind.

use crate::admission::{AdmissionGate, Decision};
use crate::music::{Artist, MusicService, MusicServiceError, Track};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument};

/// Why a relayed request did not produce a result
#[derive(Debug, Error)]
pub enum RelayError {
    /// The user's window is full. Not a system error.
    #[error("Rate limited, retry in {}s", retry_after.as_secs())]
    RateLimited {
        /// Time until a slot frees up
        retry_after: Duration,
    },
    /// The music service failed
    #[error(transparent)]
    Upstream(#[from] MusicServiceError),
}

impl RelayError {
    /// Whether this is a rate-limit rejection rather than a failure.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Gate plus service, shared by all handlers
#[derive(Clone)]
pub struct Relay {
    gate: Arc<AdmissionGate<i64>>,
    service: Arc<dyn MusicService>,
}

impl Relay {
    /// Bind a gate to a service.
    #[must_use]
    pub fn new(gate: Arc<AdmissionGate<i64>>, service: Arc<dyn MusicService>) -> Self {
        Self { gate, service }
    }

    /// The admission gate, for statistics and the janitor.
    #[must_use]
    pub const fn gate(&self) -> &Arc<AdmissionGate<i64>> {
        &self.gate
    }

    fn admit(&self, user_id: i64) -> Result<(), RelayError> {
        match self.gate.admit(user_id, Instant::now()) {
            Decision::Allowed => Ok(()),
            Decision::Denied { retry_after } => {
                debug!(
                    user_id,
                    retry_after_secs = retry_after.as_secs(),
                    "Request rejected by admission gate"
                );
                Err(RelayError::RateLimited { retry_after })
            }
        }
    }

    /// Identify a track from audio.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` when the gate denies the user, `Upstream` when
    /// the service fails.
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    pub async fn recognize(
        &self,
        user_id: i64,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<Option<Track>, RelayError> {
        self.admit(user_id)?;
        Ok(self.service.recognize_audio(audio, file_name).await?)
    }

    /// Search tracks by text.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` or `Upstream`.
    #[instrument(skip(self))]
    pub async fn search_tracks(
        &self,
        user_id: i64,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Track>, RelayError> {
        self.admit(user_id)?;
        Ok(self.service.search_tracks(query, limit).await?)
    }

    /// Best single track for a text query.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` or `Upstream`.
    pub async fn find_track(&self, user_id: i64, query: &str) -> Result<Option<Track>, RelayError> {
        Ok(self
            .search_tracks(user_id, query, 1)
            .await?
            .into_iter()
            .next())
    }

    /// Best matching artist.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` or `Upstream`.
    #[instrument(skip(self))]
    pub async fn find_artist(&self, user_id: i64, query: &str) -> Result<Option<Artist>, RelayError> {
        self.admit(user_id)?;
        Ok(self.service.search_artist(query).await?)
    }

    /// Global chart.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` or `Upstream`.
    #[instrument(skip(self))]
    pub async fn top_tracks(&self, user_id: i64, limit: usize) -> Result<Vec<Track>, RelayError> {
        self.admit(user_id)?;
        Ok(self.service.top_tracks(limit).await?)
    }

    /// Tracks similar to an artist.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` or `Upstream`.
    #[instrument(skip(self))]
    pub async fn similar_tracks(
        &self,
        user_id: i64,
        artist_id: u64,
        limit: usize,
    ) -> Result<Vec<Track>, RelayError> {
        self.admit(user_id)?;
        Ok(self.service.similar_tracks(artist_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::GateConfig;
    use crate::music::MockMusicService;
    use mockall::predicate::eq;

    fn relay_with(service: MockMusicService, max_requests: u32) -> Relay {
        let gate = AdmissionGate::new(GateConfig {
            max_requests,
            ..GateConfig::default()
        })
        .expect("valid config");
        Relay::new(Arc::new(gate), Arc::new(service))
    }

    fn track(title: &str) -> Track {
        Track {
            title: title.to_string(),
            artist: "Artist".to_string(),
            ..Track::default()
        }
    }

    #[tokio::test]
    async fn test_denied_request_never_reaches_service() {
        let mut service = MockMusicService::new();
        service
            .expect_search_tracks()
            .with(eq("queen"), eq(5))
            .times(2)
            .returning(|_, _| Ok(vec![track("Bohemian Rhapsody")]));

        let relay = relay_with(service, 2);

        assert_eq!(relay.search_tracks(1, "queen", 5).await.map(|t| t.len()).ok(), Some(1));
        assert!(relay.search_tracks(1, "queen", 5).await.is_ok());

        let third = relay.search_tracks(1, "queen", 5).await;
        assert!(matches!(third, Err(RelayError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_operations_share_one_budget() {
        let mut service = MockMusicService::new();
        service
            .expect_top_tracks()
            .times(1)
            .returning(|_| Ok(vec![track("Hit")]));
        service
            .expect_search_artist()
            .times(0);

        let relay = relay_with(service, 1);

        assert!(relay.top_tracks(7, 10).await.is_ok());
        let err = relay.find_artist(7, "queen").await.err();
        assert!(err.is_some_and(|e| e.is_rate_limited()));
    }

    #[tokio::test]
    async fn test_upstream_failure_still_consumes_quota() {
        let mut service = MockMusicService::new();
        service
            .expect_recognize_audio()
            .times(1)
            .returning(|_, _| Err(MusicServiceError::Network("timeout".to_string())));

        let relay = relay_with(service, 1);

        let first = relay.recognize(3, vec![1, 2, 3], "voice.ogg").await;
        assert!(matches!(
            first,
            Err(RelayError::Upstream(MusicServiceError::Network(_)))
        ));
        assert_eq!(relay.gate().occupancy(&3, Instant::now()), 1);

        let second = relay.recognize(3, vec![1, 2, 3], "voice.ogg").await;
        assert!(second.is_err_and(|e| e.is_rate_limited()));
    }

    #[tokio::test]
    async fn test_find_track_takes_first_hit() {
        let mut service = MockMusicService::new();
        service
            .expect_search_tracks()
            .with(eq("warriors"), eq(1))
            .returning(|_, _| Ok(vec![track("Warriors")]));

        let relay = relay_with(service, 5);
        let found = relay.find_track(9, "warriors").await.ok().flatten();

        assert_eq!(found.map(|t| t.title).as_deref(), Some("Warriors"));
    }

    #[tokio::test]
    async fn test_disabled_gate_passes_everything() {
        let mut service = MockMusicService::new();
        service
            .expect_similar_tracks()
            .with(eq(27), eq(5))
            .times(4)
            .returning(|_, _| Ok(Vec::new()));

        let relay = relay_with(service, 1);
        relay.gate().set_enabled(false);

        for _ in 0..4 {
            assert!(relay.similar_tracks(1, 27, 5).await.is_ok());
        }
    }
}
