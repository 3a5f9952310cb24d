//! Flood protection for "Access denied" replies in admin-only mode.
//!
//! Replying to every message from an unauthorized user would burn the bot's
//! own Telegram send quota, so each user gets at most one reply per
//! cooldown. Later attempts are counted and only sampled into the log.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Log one silenced attempt out of this many.
const SILENCED_LOG_EVERY: u64 = 100;

/// Last "Access denied" reply per user
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// `user_id -> instant of the last reply`, entries expire after the TTL
    last_sent: Cache<i64, Instant>,
    cooldown: Duration,
    silenced_count: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Creates a cache with the given cooldown, entry TTL and capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use tunebot_transport_telegram::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(1200, 7200, 10_000);
    /// assert_eq!(cache.cooldown().as_secs(), 1200);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, ttl_secs: u64, max_capacity: u64) -> Self {
        // An entry must outlive its cooldown or the user gets replies early.
        let ttl = ttl_secs.max(cooldown_secs);
        let last_sent = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl))
            .build();

        Self {
            last_sent,
            cooldown: Duration::from_secs(cooldown_secs),
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether the user should get a reply at `now`.
    ///
    /// `true` on the first attempt and once the cooldown has passed since
    /// the last reply. Silenced attempts are counted.
    pub async fn should_send_at(&self, user_id: i64, user_name: &str, now: Instant) -> bool {
        let Some(last) = self.last_sent.get(&user_id).await else {
            return true;
        };
        if now.saturating_duration_since(last) >= self.cooldown {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(SILENCED_LOG_EVERY) {
            debug!(
                "⛔️ Silenced {} unauthorized attempts (recent: user {} - {})",
                count, user_id, user_name
            );
        }
        false
    }

    /// [`Self::should_send_at`] with the current instant.
    pub async fn should_send(&self, user_id: i64, user_name: &str) -> bool {
        self.should_send_at(user_id, user_name, Instant::now()).await
    }

    /// Record a successful reply at `now`, starting the cooldown.
    pub async fn mark_sent_at(&self, user_id: i64, now: Instant) {
        self.last_sent.insert(user_id, now).await;
    }

    /// [`Self::mark_sent_at`] with the current instant.
    pub async fn mark_sent(&self, user_id: i64) {
        self.mark_sent_at(user_id, Instant::now()).await;
    }

    /// Users currently in cooldown or awaiting expiry.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.last_sent.entry_count()
    }

    /// Total silenced attempts since startup.
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }

    /// Configured cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_attempt_should_send() {
        let cache = UnauthorizedCache::new(60, 120, 100);
        assert!(cache.should_send(12345, "TestUser").await);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_then_expires() {
        let cache = UnauthorizedCache::new(60, 120, 100);
        let t0 = Instant::now();

        cache.mark_sent_at(12345, t0).await;
        assert!(!cache.should_send_at(12345, "TestUser", t0 + Duration::from_secs(59)).await);
        assert!(cache.should_send_at(12345, "TestUser", t0 + Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_different_users_independent() {
        let cache = UnauthorizedCache::new(60, 120, 100);

        cache.mark_sent(111).await;
        assert!(cache.should_send(222, "User2").await);
    }

    #[tokio::test]
    async fn test_silenced_count_increments() {
        let cache = UnauthorizedCache::new(60, 120, 100);
        cache.mark_sent(12345).await;

        for _ in 0..5 {
            cache.should_send(12345, "TestUser").await;
        }

        assert_eq!(cache.silenced_count(), 5);
    }

    #[tokio::test]
    async fn test_entry_count() {
        let cache = UnauthorizedCache::new(60, 120, 100);

        cache.mark_sent(111).await;
        cache.mark_sent(222).await;
        cache.last_sent.run_pending_tasks().await;

        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn test_ttl_never_shorter_than_cooldown() {
        let cache = UnauthorizedCache::new(600, 60, 100);
        assert_eq!(
            cache.last_sent.policy().time_to_live(),
            Some(Duration::from_secs(600))
        );
    }
}
