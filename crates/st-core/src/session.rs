//! The session state machine.
//!
//! A [`SessionController`] is either Idle or Active on exactly one
//! `(domain, tab)` pair. Every transition that leaves Active produces a
//! [`SessionEnd`], which is either a [`Commit`] to be written to the usage
//! store or a discarded duration that fell outside the [`SessionPolicy`]
//! bounds. The controller never touches storage itself; see
//! [`Tracker`](crate::Tracker) for that.

use chrono::{DateTime, Utc};

use crate::classify::UrlClassifier;
use crate::event::Tab;
use crate::types::{Domain, TabId, ValidationError};

/// Sessions shorter than this are tab-flicker noise. Default: 1 second.
pub const DEFAULT_MIN_SESSION_MS: i64 = 1_000;

/// Sessions this long mean a teardown event was missed. Default: 12 hours.
pub const DEFAULT_MAX_SESSION_MS: i64 = 12 * 60 * 60 * 1_000;

/// The domain currently being viewed and when viewing began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub domain: Domain,
    pub tab_id: TabId,
    pub start: DateTime<Utc>,
}

impl Session {
    /// Milliseconds between the session start and `now`. Negative if the
    /// wall clock moved backwards.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start).num_milliseconds()
    }
}

/// Duration bounds a session must fall within to be committed.
///
/// The accepted range is half-open: `min_session_ms <= d < max_session_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    min_session_ms: i64,
    max_session_ms: i64,
}

impl SessionPolicy {
    /// Creates a policy after validating the bounds.
    pub const fn new(min_session_ms: i64, max_session_ms: i64) -> Result<Self, ValidationError> {
        if min_session_ms < 0 || min_session_ms >= max_session_ms {
            return Err(ValidationError::InvalidSessionBounds {
                min_ms: min_session_ms,
                max_ms: max_session_ms,
            });
        }
        Ok(Self {
            min_session_ms,
            max_session_ms,
        })
    }

    pub const fn min_session_ms(&self) -> i64 {
        self.min_session_ms
    }

    pub const fn max_session_ms(&self) -> i64 {
        self.max_session_ms
    }

    /// Returns `true` if a session of `duration_ms` should be committed.
    pub const fn accepts(&self, duration_ms: i64) -> bool {
        self.min_session_ms <= duration_ms && duration_ms < self.max_session_ms
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            min_session_ms: DEFAULT_MIN_SESSION_MS,
            max_session_ms: DEFAULT_MAX_SESSION_MS,
        }
    }
}

/// Elapsed time that should be added to the usage store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub domain: Domain,
    pub duration_ms: u64,
    /// End of the committed interval; becomes the domain's last-seen time.
    pub at: DateTime<Utc>,
}

/// What happened to the time of a session that was ended or flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The duration was within bounds.
    Committed(Commit),
    /// The duration was outside bounds and has been dropped.
    Discarded { domain: Domain, duration_ms: i64 },
}

impl SessionEnd {
    /// The commit to persist, if any.
    pub const fn commit(&self) -> Option<&Commit> {
        match self {
            Self::Committed(commit) => Some(commit),
            Self::Discarded { .. } => None,
        }
    }
}

/// Starts and ends sessions, enforcing the single-active-session invariant.
#[derive(Debug, Clone, Default)]
pub struct SessionController {
    classifier: UrlClassifier,
    policy: SessionPolicy,
    current: Option<Session>,
}

impl SessionController {
    pub const fn new(classifier: UrlClassifier, policy: SessionPolicy) -> Self {
        Self {
            classifier,
            policy,
            current: None,
        }
    }

    /// The active session, or `None` when Idle.
    pub const fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub const fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Makes `tab` the tracked tab.
    ///
    /// Re-activating the session already being tracked is a no-op, so the
    /// clock keeps running. Otherwise any active session is ended first and
    /// its outcome returned. An untrackable tab leaves the controller Idle.
    pub fn start_session(&mut self, tab: &Tab, now: DateTime<Utc>) -> Option<SessionEnd> {
        let domain = tab
            .url
            .as_deref()
            .and_then(|url| self.classifier.domain_of(url));

        let Some(domain) = domain else {
            tracing::debug!(tab_id = %tab.id, url = ?tab.url, "untrackable tab in foreground");
            return self.end_session(now);
        };

        let unchanged = self
            .current
            .as_ref()
            .is_some_and(|current| current.domain == domain && current.tab_id == tab.id);
        if unchanged {
            tracing::trace!(%domain, tab_id = %tab.id, "session already active");
            return None;
        }

        let ended = self.end_session(now);
        tracing::info!(%domain, tab_id = %tab.id, "session started");
        self.current = Some(Session {
            domain,
            tab_id: tab.id,
            start: now,
        });
        ended
    }

    /// Ends the active session, if any.
    pub fn end_session(&mut self, now: DateTime<Utc>) -> Option<SessionEnd> {
        let session = self.current.take()?;
        let duration_ms = session.elapsed_ms(now);
        Some(self.settle(session.domain, duration_ms, now))
    }

    /// Ends the active session only if it is bound to `tab_id`.
    pub fn end_session_for_tab(&mut self, tab_id: TabId, now: DateTime<Utc>) -> Option<SessionEnd> {
        match &self.current {
            Some(session) if session.tab_id == tab_id => self.end_session(now),
            _ => None,
        }
    }

    /// Settles the time elapsed so far without ending tracking.
    ///
    /// The session clock restarts at `now` once its time has been committed or
    /// discarded. Elapsed time still below the minimum is left running, since
    /// restarting would silently drop it.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Option<SessionEnd> {
        let session = self.current.as_mut()?;
        let duration_ms = session.elapsed_ms(now);
        if duration_ms < self.policy.min_session_ms {
            return None;
        }
        session.start = now;
        let domain = session.domain.clone();
        Some(self.settle(domain, duration_ms, now))
    }

    fn settle(&self, domain: Domain, duration_ms: i64, now: DateTime<Utc>) -> SessionEnd {
        if self.policy.accepts(duration_ms) {
            // accepts() implies duration_ms >= min_session_ms >= 0
            let duration_ms = u64::try_from(duration_ms).unwrap_or_default();
            tracing::info!(%domain, duration_ms, "session time committed");
            SessionEnd::Committed(Commit {
                domain,
                duration_ms,
                at: now,
            })
        } else {
            tracing::debug!(
                %domain,
                duration_ms,
                min_ms = self.policy.min_session_ms,
                max_ms = self.policy.max_session_ms,
                "session duration out of bounds, discarded"
            );
            SessionEnd::Discarded {
                domain,
                duration_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn controller(min_ms: i64) -> SessionController {
        SessionController::new(
            UrlClassifier::default(),
            SessionPolicy::new(min_ms, DEFAULT_MAX_SESSION_MS).unwrap(),
        )
    }

    fn committed(end: Option<SessionEnd>) -> Commit {
        match end {
            Some(SessionEnd::Committed(commit)) => commit,
            other => panic!("expected a commit, got {other:?}"),
        }
    }

    #[test]
    fn policy_rejects_inverted_bounds() {
        assert!(SessionPolicy::new(500, 500).is_err());
        assert!(SessionPolicy::new(-1, 500).is_err());
        assert!(SessionPolicy::new(0, 1).is_ok());
    }

    #[test]
    fn policy_range_is_half_open() {
        let policy = SessionPolicy::new(500, 10_000).unwrap();
        assert!(!policy.accepts(499));
        assert!(policy.accepts(500));
        assert!(policy.accepts(9_999));
        assert!(!policy.accepts(10_000));
    }

    #[test]
    fn switching_tabs_commits_previous_session() {
        let mut controller = controller(500);
        assert!(
            controller
                .start_session(&Tab::new(1, "https://example.com/a"), t0())
                .is_none()
        );

        let later = t0() + Duration::milliseconds(10_000);
        let commit = committed(controller.start_session(&Tab::new(2, "https://other.com/"), later));
        assert_eq!(commit.domain.as_str(), "example.com");
        assert_eq!(commit.duration_ms, 10_000);
        assert_eq!(commit.at, later);

        let current = controller.current().unwrap();
        assert_eq!(current.domain.as_str(), "other.com");
        assert_eq!(current.tab_id, TabId(2));
        assert_eq!(current.start, later);
    }

    #[test]
    fn same_domain_and_tab_is_a_noop() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://example.com/a"), t0());
        let later = t0() + Duration::seconds(30);
        assert!(
            controller
                .start_session(&Tab::new(1, "https://example.com/b"), later)
                .is_none()
        );
        assert_eq!(controller.current().unwrap().start, t0());
    }

    #[test]
    fn same_domain_in_another_tab_restarts() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://example.com/"), t0());
        let later = t0() + Duration::seconds(3);
        let commit = committed(controller.start_session(&Tab::new(2, "https://example.com/"), later));
        assert_eq!(commit.duration_ms, 3_000);
        assert_eq!(controller.current().unwrap().tab_id, TabId(2));
    }

    #[test]
    fn short_session_is_discarded() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://new-domain.com/"), t0());
        let end = controller.end_session(t0() + Duration::milliseconds(300));
        assert!(matches!(
            end,
            Some(SessionEnd::Discarded {
                duration_ms: 300,
                ..
            })
        ));
        assert!(!controller.is_active());
    }

    #[test]
    fn runaway_session_is_discarded() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://example.com/"), t0());
        let end = controller.end_session(t0() + Duration::milliseconds(DEFAULT_MAX_SESSION_MS));
        assert!(end.unwrap().commit().is_none());
    }

    #[test]
    fn untrackable_tab_ends_session_and_stays_idle() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://example.com/"), t0());
        let later = t0() + Duration::seconds(2);
        let commit = committed(controller.start_session(&Tab::new(2, "chrome://settings"), later));
        assert_eq!(commit.duration_ms, 2_000);
        assert!(!controller.is_active());
    }

    #[test]
    fn tab_without_url_is_untrackable() {
        let mut controller = controller(500);
        let tab = Tab {
            id: TabId(3),
            url: None,
            active: true,
        };
        assert!(controller.start_session(&tab, t0()).is_none());
        assert!(!controller.is_active());
    }

    #[test]
    fn end_when_idle_is_a_noop() {
        let mut controller = controller(500);
        assert!(controller.end_session(t0()).is_none());
        assert!(controller.flush(t0()).is_none());
    }

    #[test]
    fn end_for_other_tab_keeps_session() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://example.com/"), t0());
        assert!(
            controller
                .end_session_for_tab(TabId(9), t0() + Duration::seconds(5))
                .is_none()
        );
        assert!(controller.is_active());

        let commit = committed(controller.end_session_for_tab(TabId(1), t0() + Duration::seconds(5)));
        assert_eq!(commit.duration_ms, 5_000);
        assert!(!controller.is_active());
    }

    #[test]
    fn flush_commits_and_restarts_clock() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://example.com/"), t0());
        let tick = t0() + Duration::seconds(60);
        let commit = committed(controller.flush(tick));
        assert_eq!(commit.duration_ms, 60_000);

        let session = controller.current().unwrap();
        assert_eq!(session.start, tick);
        assert_eq!(session.domain.as_str(), "example.com");
    }

    #[test]
    fn flush_below_minimum_keeps_clock_running() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://example.com/"), t0());
        assert!(controller.flush(t0() + Duration::milliseconds(200)).is_none());
        assert_eq!(controller.current().unwrap().start, t0());
    }

    #[test]
    fn backwards_clock_is_discarded() {
        let mut controller = controller(500);
        controller.start_session(&Tab::new(1, "https://example.com/"), t0());
        let end = controller.end_session(t0() - Duration::seconds(10));
        assert!(matches!(end, Some(SessionEnd::Discarded { .. })));
    }
}
