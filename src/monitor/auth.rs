//! Memoized login state with single-flight refresh.
//!
//! ```text
//!            check_status()
//!   Idle ────────────────────▶ Checking ──(probe done or dropped)──▶ Idle
//!     ▲                          │
//!     └── other callers read ────┘  the cached value while Checking
//! ```
//!
//! A probe error counts as logged out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::monitor::events::{EventBus, MonitorEvent};
use crate::services::AuthProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Checking,
}

#[derive(Debug)]
struct AuthState {
    authenticated: bool,
    last_checked_at: Option<DateTime<Utc>>,
    phase: Phase,
}

/// Point-in-time view of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub checking: bool,
}

pub struct AuthStatusCache {
    probe: Arc<dyn AuthProbe>,
    state: Mutex<AuthState>,
    revalidate_after: Option<Duration>,
    events: Option<EventBus>,
}

/// Returns the cache to `Idle` when the probing future finishes or is dropped.
struct CheckingGuard<'a> {
    cache: &'a AuthStatusCache,
}

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.cache.lock().phase = Phase::Idle;
    }
}

impl AuthStatusCache {
    /// Starts unauthenticated and unchecked.
    pub fn new(probe: Arc<dyn AuthProbe>) -> Self {
        Self {
            probe,
            state: Mutex::new(AuthState {
                authenticated: false,
                last_checked_at: None,
                phase: Phase::Idle,
            }),
            revalidate_after: None,
            events: None,
        }
    }

    /// Re-probe a cached `true` once it is older than `age`.
    pub fn with_revalidate_after(mut self, age: Option<Duration>) -> Self {
        self.revalidate_after = age;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let state = self.lock();
        AuthSnapshot {
            authenticated: state.authenticated,
            last_checked_at: state.last_checked_at,
            checking: state.phase == Phase::Checking,
        }
    }

    /// Probe the session, unless a probe is already running, in which case
    /// the last cached value is returned immediately.
    pub async fn check_status(&self) -> bool {
        let guard = {
            let mut state = self.lock();
            if state.phase == Phase::Checking {
                log::debug!("Auth probe in flight, returning cached {}", state.authenticated);
                return state.authenticated;
            }
            state.phase = Phase::Checking;
            CheckingGuard { cache: self }
        };

        let authenticated = match self.probe.check().await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                log::warn!("Auth probe failed, treating session as logged out: {e}");
                false
            }
        };

        let previous = {
            let mut state = self.lock();
            let previous = state.authenticated;
            state.authenticated = authenticated;
            state.last_checked_at = Some(Utc::now());
            previous
        };
        drop(guard);

        if previous != authenticated {
            log::info!(
                "Session is now {}",
                if authenticated { "logged in" } else { "logged out" }
            );
            self.emit(authenticated);
        }
        authenticated
    }

    /// Cached `true` when known-good and fresh, otherwise a fresh probe.
    pub async fn ensure_authenticated(&self) -> bool {
        {
            let state = self.lock();
            if state.authenticated && !self.is_stale(&state) {
                return true;
            }
        }
        self.check_status().await
    }

    /// Forget a known-good session so the next `ensure_authenticated` probes.
    pub fn invalidate(&self) {
        let was_authenticated = {
            let mut state = self.lock();
            std::mem::replace(&mut state.authenticated, false)
        };
        if was_authenticated {
            self.emit(false);
        }
    }

    fn is_stale(&self, state: &AuthState) -> bool {
        let Some(max_age) = self.revalidate_after else {
            return false;
        };
        state.last_checked_at.is_none_or(|checked| {
            (Utc::now() - checked)
                .to_std()
                .is_ok_and(|age| age >= max_age)
        })
    }

    fn emit(&self, authenticated: bool) {
        if let Some(events) = &self.events {
            events.emit(MonitorEvent::AuthStatusChanged { authenticated });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{CountingProbe, ProbeOutcome};

    fn cache(probe: &Arc<CountingProbe>) -> AuthStatusCache {
        AuthStatusCache::new(probe.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight() {
        let probe = Arc::new(
            CountingProbe::new(ProbeOutcome::LoggedIn).with_latency(Duration::from_secs(3)),
        );
        let cache = cache(&probe);

        let (first, second) = tokio::join!(cache.check_status(), cache.check_status());

        assert_eq!(probe.calls(), 1);
        assert!(first);
        // The concurrent caller saw the stale cached value
        assert!(!second);
        assert!(cache.snapshot().authenticated);
        assert!(!cache.snapshot().checking);
    }

    #[tokio::test]
    async fn test_fail_closed() {
        let probe = Arc::new(CountingProbe::new(ProbeOutcome::LoggedIn));
        let cache = cache(&probe);
        assert!(cache.check_status().await);

        probe.set_outcome(ProbeOutcome::Fails);
        assert!(!cache.check_status().await);
        assert!(!cache.snapshot().authenticated);
        assert!(cache.snapshot().last_checked_at.is_some());
    }

    #[tokio::test]
    async fn test_ensure_uses_cached_true() {
        let probe = Arc::new(CountingProbe::new(ProbeOutcome::LoggedIn));
        let cache = cache(&probe);

        assert!(cache.ensure_authenticated().await);
        assert!(cache.ensure_authenticated().await);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_reprobes_when_logged_out() {
        let probe = Arc::new(CountingProbe::new(ProbeOutcome::LoggedOut));
        let cache = cache(&probe);

        assert!(!cache.ensure_authenticated().await);
        probe.set_outcome(ProbeOutcome::LoggedIn);
        assert!(cache.ensure_authenticated().await);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_probe() {
        let probe = Arc::new(CountingProbe::new(ProbeOutcome::LoggedIn));
        let cache = cache(&probe);
        assert!(cache.ensure_authenticated().await);

        cache.invalidate();
        assert!(!cache.snapshot().authenticated);
        assert!(cache.ensure_authenticated().await);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_revalidate_after() {
        let probe = Arc::new(CountingProbe::new(ProbeOutcome::LoggedIn));
        let cache = cache(&probe).with_revalidate_after(Some(Duration::ZERO));

        assert!(cache.ensure_authenticated().await);
        assert!(cache.ensure_authenticated().await);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_releases_checking() {
        let probe = Arc::new(
            CountingProbe::new(ProbeOutcome::LoggedIn).with_latency(Duration::from_secs(30)),
        );
        let cache = cache(&probe);

        let timed_out = tokio::time::timeout(Duration::from_secs(1), cache.check_status()).await;
        assert!(timed_out.is_err());
        assert!(!cache.snapshot().checking);

        probe.set_outcome(ProbeOutcome::LoggedOut);
        assert!(!cache.check_status().await);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_status_changes_are_published() {
        let probe = Arc::new(CountingProbe::new(ProbeOutcome::LoggedIn));
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let cache = cache(&probe).with_events(events);

        cache.check_status().await;
        cache.check_status().await;
        probe.set_outcome(ProbeOutcome::Fails);
        cache.check_status().await;

        assert_eq!(
            rx.try_recv().unwrap(),
            MonitorEvent::AuthStatusChanged { authenticated: true }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            MonitorEvent::AuthStatusChanged { authenticated: false }
        );
        assert!(rx.try_recv().is_err());
    }
}
