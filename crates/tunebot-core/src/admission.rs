//! Per-user sliding-window admission gate.
//!
//! Every request that would consume recognition API quota asks the gate
//! first. Each user keeps the instants of their recent admitted requests;
//! a request is admitted while fewer than `max_requests` of them are younger
//! than `window`. Expired instants age out one by one, so a burst at the
//! start of a window frees its slots individually rather than all at once.
//!
//! The check-prune-append sequence runs under the shard lock of a
//! [`DashMap`] entry, which makes it atomic per user while unrelated users
//! proceed in parallel on other shards.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default length of the sliding window in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 60;
/// Default number of admitted requests per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 30;
/// Default number of window lengths a user must stay idle before the
/// janitor reclaims their entry.
pub const DEFAULT_IDLE_WINDOWS: u32 = 5;

/// Invalid gate configuration. Raised at construction time only.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateConfigError {
    /// The sliding window has zero length
    #[error("rate limit window must be longer than zero")]
    ZeroWindow,
    /// No request would ever be admitted
    #[error("max requests per window must be greater than zero")]
    ZeroLimit,
    /// Idle entries would be evicted while still inside their window
    #[error("idle eviction multiplier must be greater than zero")]
    ZeroIdleWindows,
}

/// Gate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// When `false` every request is admitted and no history is recorded
    pub enabled: bool,
    /// Length of the sliding window
    pub window: Duration,
    /// Maximum admitted requests per user inside one window
    pub max_requests: u32,
    /// Idle entries older than `idle_windows * window` are swept
    pub idle_windows: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            max_requests: DEFAULT_MAX_REQUESTS,
            idle_windows: DEFAULT_IDLE_WINDOWS,
        }
    }
}

impl GateConfig {
    /// Check that the parameters describe a usable gate.
    ///
    /// # Errors
    ///
    /// Returns a [`GateConfigError`] for a zero window, zero limit or zero
    /// idle multiplier.
    pub const fn validate(&self) -> Result<(), GateConfigError> {
        if self.window.is_zero() {
            return Err(GateConfigError::ZeroWindow);
        }
        if self.max_requests == 0 {
            return Err(GateConfigError::ZeroLimit);
        }
        if self.idle_windows == 0 {
            return Err(GateConfigError::ZeroIdleWindows);
        }
        Ok(())
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The caller may perform exactly one unit of rate-limited work
    Allowed,
    /// The caller must not proceed
    Denied {
        /// Time until the oldest recorded request leaves the window
        retry_after: Duration,
    },
}

impl Decision {
    /// Returns `true` for [`Decision::Allowed`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Recent request history of one user.
#[derive(Debug)]
struct UserWindow {
    /// Admitted request instants, oldest first, non-decreasing
    timestamps: VecDeque<Instant>,
    /// Latest instant at which this user asked for admission
    last_seen: Instant,
}

impl UserWindow {
    fn new(now: Instant) -> Self {
        Self {
            timestamps: VecDeque::new(),
            last_seen: now,
        }
    }

    /// Drop every instant that is `window` old or older.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    fn fresh_count(&self, now: Instant, window: Duration) -> usize {
        self.timestamps
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < window)
            .count()
    }

    fn retry_after(&self, now: Instant, window: Duration) -> Duration {
        self.timestamps.front().map_or(Duration::ZERO, |oldest| {
            window.saturating_sub(now.saturating_duration_since(*oldest))
        })
    }

    fn record(&mut self, now: Instant) {
        // Callers may hand in slightly out-of-order instants; clamping keeps
        // the deque sorted so pruning from the front stays correct.
        let stamp = self
            .timestamps
            .back()
            .map_or(now, |last| (*last).max(now));
        self.timestamps.push_back(stamp);
    }
}

/// Sliding-window rate limiter keyed by user identity.
///
/// The gate never reads the clock itself: every operation takes the current
/// instant as an argument.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
/// use tunebot_core::admission::{AdmissionGate, Decision, GateConfig};
///
/// let gate = AdmissionGate::<i64>::new(GateConfig {
///     max_requests: 1,
///     ..GateConfig::default()
/// })
/// .expect("valid config");
///
/// let t0 = Instant::now();
/// assert_eq!(gate.admit(7, t0), Decision::Allowed);
/// assert!(!gate.admit(7, t0 + Duration::from_secs(1)).is_allowed());
/// assert!(gate.admit(7, t0 + Duration::from_secs(60)).is_allowed());
/// ```
#[derive(Debug)]
pub struct AdmissionGate<K = i64>
where
    K: Eq + Hash,
{
    windows: DashMap<K, UserWindow>,
    enabled: AtomicBool,
    window: Duration,
    max_requests: usize,
    idle_windows: u32,
}

impl<K> AdmissionGate<K>
where
    K: Eq + Hash,
{
    /// Build a gate from validated parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`GateConfigError`] if `config` is not usable.
    pub fn new(config: GateConfig) -> Result<Self, GateConfigError> {
        config.validate()?;
        Ok(Self {
            windows: DashMap::new(),
            enabled: AtomicBool::new(config.enabled),
            window: config.window,
            max_requests: config.max_requests as usize,
            idle_windows: config.idle_windows,
        })
    }

    /// Decide whether `user_id` may issue one more request at `now`.
    ///
    /// Denied attempts leave the recorded history untouched, so retrying
    /// while over the limit never pushes the user's recovery further out.
    pub fn admit(&self, user_id: K, now: Instant) -> Decision {
        if !self.is_enabled() {
            return Decision::Allowed;
        }

        // The entry guard holds the shard write lock until it is dropped.
        let mut entry = self
            .windows
            .entry(user_id)
            .or_insert_with(|| UserWindow::new(now));
        let window = entry.value_mut();

        window.last_seen = window.last_seen.max(now);
        window.prune(now, self.window);

        if window.timestamps.len() >= self.max_requests {
            let retry_after = window.retry_after(now, self.window);
            debug!(
                retry_after_ms = retry_after.as_millis(),
                "Admission denied: window is full"
            );
            return Decision::Denied { retry_after };
        }

        window.record(now);
        Decision::Allowed
    }

    /// Number of admitted requests of `user_id` still inside the window at
    /// `now`. Read-only.
    pub fn occupancy(&self, user_id: &K, now: Instant) -> usize {
        self.windows
            .get(user_id)
            .map_or(0, |w| w.fresh_count(now, self.window))
    }

    /// Free slots left for `user_id` at `now`.
    pub fn remaining(&self, user_id: &K, now: Instant) -> usize {
        self.max_requests
            .saturating_sub(self.occupancy(user_id, now))
    }

    /// Enable or bypass the gate at runtime. History is kept either way.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Whether admissions are currently enforced.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Length of the sliding window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Admitted requests per window.
    #[must_use]
    pub const fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Number of users that currently own a window entry.
    pub fn tracked_users(&self) -> usize {
        self.windows.len()
    }

    /// Remove entries that are empty after pruning and have not been seen
    /// for `idle_windows` window lengths. Returns the number removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let window = self.window;
        let idle_after = window.saturating_mul(self.idle_windows);
        let before = self.windows.len();

        self.windows.retain(|_, entry| {
            entry.prune(now, window);
            !(entry.timestamps.is_empty()
                && now.saturating_duration_since(entry.last_seen) >= idle_after)
        });

        before.saturating_sub(self.windows.len())
    }
}

impl<K> AdmissionGate<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    /// Spawn the background janitor that calls [`AdmissionGate::sweep`]
    /// every `period` until `cancel` fires.
    ///
    /// Sweeps read the tokio clock, so a paused runtime drives them.
    pub fn spawn_janitor(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Admission janitor started (period: {}s, idle after {} windows)",
                period.as_secs(),
                self.idle_windows
            );
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep(tokio::time::Instant::now().into_std());
                        if removed > 0 {
                            debug!(
                                removed,
                                tracked = self.tracked_users(),
                                "Admission janitor reclaimed idle windows"
                            );
                        }
                    }
                }
            }
            info!("Admission janitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(max_requests: u32, window_secs: u64) -> AdmissionGate<i64> {
        AdmissionGate::new(GateConfig {
            enabled: true,
            window: Duration::from_secs(window_secs),
            max_requests,
            idle_windows: 2,
        })
        .expect("valid config")
    }

    fn at(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let zero_window = GateConfig {
            window: Duration::ZERO,
            ..GateConfig::default()
        };
        assert_eq!(
            AdmissionGate::<i64>::new(zero_window).err(),
            Some(GateConfigError::ZeroWindow)
        );

        let zero_limit = GateConfig {
            max_requests: 0,
            ..GateConfig::default()
        };
        assert_eq!(
            AdmissionGate::<i64>::new(zero_limit).err(),
            Some(GateConfigError::ZeroLimit)
        );

        let zero_idle = GateConfig {
            idle_windows: 0,
            ..GateConfig::default()
        };
        assert_eq!(zero_idle.validate(), Err(GateConfigError::ZeroIdleWindows));
    }

    #[test]
    fn test_sixty_second_window_scenario() {
        let gate = gate(3, 60);
        let t0 = Instant::now();

        assert_eq!(gate.admit(1, at(t0, 0)), Decision::Allowed);
        assert_eq!(gate.admit(1, at(t0, 1_000)), Decision::Allowed);
        assert_eq!(gate.admit(1, at(t0, 2_000)), Decision::Allowed);
        assert!(!gate.admit(1, at(t0, 3_000)).is_allowed());
        // Only the t=0 request has aged out.
        assert_eq!(gate.admit(1, at(t0, 60_500)), Decision::Allowed);
        assert!(!gate.admit(1, at(t0, 60_900)).is_allowed());
        // t=1 reaches the boundary and frees the next slot.
        assert_eq!(gate.admit(1, at(t0, 61_000)), Decision::Allowed);
        assert!(!gate.admit(1, at(t0, 61_500)).is_allowed());
    }

    #[test]
    fn test_boundary_timestamp_is_expired() {
        let gate = gate(1, 60);
        let t0 = Instant::now();

        assert!(gate.admit(1, t0).is_allowed());
        assert!(!gate.admit(1, at(t0, 59_999)).is_allowed());
        assert!(gate.admit(1, at(t0, 60_000)).is_allowed());
    }

    #[test]
    fn test_retry_after_points_at_oldest_request() {
        let gate = gate(2, 60);
        let t0 = Instant::now();

        gate.admit(1, at(t0, 0));
        gate.admit(1, at(t0, 10_000));

        assert_eq!(
            gate.admit(1, at(t0, 15_000)),
            Decision::Denied {
                retry_after: Duration::from_secs(45)
            }
        );
    }

    #[test]
    fn test_users_are_independent() {
        let gate = gate(1, 60);
        let t0 = Instant::now();

        assert!(gate.admit(1, t0).is_allowed());
        assert!(gate.admit(2, t0).is_allowed());
        assert!(!gate.admit(1, t0).is_allowed());
        assert_eq!(gate.tracked_users(), 2);
    }

    #[test]
    fn test_denied_attempts_do_not_count() {
        let gate = gate(2, 60);
        let t0 = Instant::now();

        gate.admit(1, at(t0, 0));
        gate.admit(1, at(t0, 1_000));
        for i in 0..10 {
            assert!(!gate.admit(1, at(t0, 2_000 + i * 100)).is_allowed());
        }

        assert_eq!(gate.occupancy(&1, at(t0, 5_000)), 2);
        // Both slots free up on schedule, unaffected by the denied burst.
        assert_eq!(gate.occupancy(&1, at(t0, 61_000)), 0);
        assert!(gate.admit(1, at(t0, 61_000)).is_allowed());
        assert!(gate.admit(1, at(t0, 61_000)).is_allowed());
    }

    #[test]
    fn test_disabled_gate_keeps_history() {
        let gate = gate(1, 60);
        let t0 = Instant::now();

        assert!(gate.admit(1, t0).is_allowed());

        gate.set_enabled(false);
        for i in 0..5 {
            assert_eq!(gate.admit(1, at(t0, i * 100)), Decision::Allowed);
        }
        assert!(gate.admit(99, t0).is_allowed());
        assert_eq!(gate.tracked_users(), 1);

        gate.set_enabled(true);
        assert!(!gate.admit(1, at(t0, 1_000)).is_allowed());
        assert!(gate.admit(1, at(t0, 60_000)).is_allowed());
    }

    #[test]
    fn test_long_absence_prunes_everything() {
        let gate = gate(3, 60);
        let t0 = Instant::now();

        for i in 0..3 {
            gate.admit(1, at(t0, i));
        }
        assert!(!gate.admit(1, at(t0, 10)).is_allowed());

        let much_later = t0 + Duration::from_secs(60 * 60 * 24);
        assert_eq!(gate.remaining(&1, much_later), 3);
        for _ in 0..3 {
            assert!(gate.admit(1, much_later).is_allowed());
        }
    }

    #[test]
    fn test_out_of_order_instant_keeps_window_sorted() {
        let gate = gate(2, 60);
        let t0 = Instant::now();

        assert!(gate.admit(1, at(t0, 5_000)).is_allowed());
        // An earlier instant is recorded as the latest one seen.
        assert!(gate.admit(1, at(t0, 1_000)).is_allowed());
        assert_eq!(gate.occupancy(&1, at(t0, 64_999)), 2);
        assert_eq!(gate.occupancy(&1, at(t0, 65_000)), 0);
    }

    #[test]
    fn test_sweep_evicts_only_idle_empty_windows() {
        let gate = gate(2, 10);
        let t0 = Instant::now();

        gate.admit(1, t0);
        gate.admit(2, at(t0, 15_000));

        // User 1 expired at 10s but has only been idle for 15s (< 20s).
        assert_eq!(gate.sweep(at(t0, 15_000)), 0);
        assert_eq!(gate.tracked_users(), 2);

        // User 1 idle 21s: gone. User 2 idle 6s with a fresh entry: stays.
        assert_eq!(gate.sweep(at(t0, 21_000)), 1);
        assert_eq!(gate.tracked_users(), 1);
        assert_eq!(gate.occupancy(&2, at(t0, 21_000)), 1);
    }

    #[test]
    fn test_swept_user_starts_fresh() {
        let gate = gate(1, 10);
        let t0 = Instant::now();

        gate.admit(1, t0);
        assert_eq!(gate.sweep(at(t0, 30_000)), 1);
        assert!(gate.admit(1, at(t0, 30_000)).is_allowed());
        assert!(!gate.admit(1, at(t0, 30_001)).is_allowed());
    }

    #[tokio::test]
    async fn test_janitor_stops_on_cancel() {
        let gate = Arc::new(gate(1, 10));
        let cancel = CancellationToken::new();

        let handle = gate
            .clone()
            .spawn_janitor(Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        assert!(handle.await.is_ok());
    }
}
