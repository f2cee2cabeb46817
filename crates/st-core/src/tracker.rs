//! Event-driven tracking: controller transitions plus durable commits.

use chrono::{DateTime, Utc};

use crate::adapter::{Action, action_for};
use crate::event::LifecycleEvent;
use crate::session::{Commit, SessionController, SessionEnd};

/// Durable sink for committed session time.
///
/// This trait keeps the tracker independent of the storage backend
/// (e.g., `UsageStore` from st-db, or test fixtures).
pub trait UsageWriter {
    type Error: std::error::Error;

    /// Adds `commit.duration_ms` to the domain's total and records
    /// `commit.at` as its last-seen time, as one atomic write.
    fn commit(&mut self, commit: &Commit) -> Result<(), Self::Error>;
}

/// Owns the session controller and the usage writer.
///
/// Whoever owns the tracker is the single writer: commits are issued one at
/// a time, in event order, so read-modify-write updates never interleave.
#[derive(Debug)]
pub struct Tracker<W> {
    controller: SessionController,
    writer: W,
}

impl<W: UsageWriter> Tracker<W> {
    pub const fn new(controller: SessionController, writer: W) -> Self {
        Self { controller, writer }
    }

    pub const fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub const fn writer(&self) -> &W {
        &self.writer
    }

    pub const fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Applies a lifecycle event and persists any time it settles.
    pub fn handle(&mut self, event: &LifecycleEvent, now: DateTime<Utc>) -> Option<SessionEnd> {
        let action = action_for(event);
        tracing::debug!(event = event.name(), ?action, "lifecycle event");
        let end = match action {
            Action::Start(tab) => self.controller.start_session(tab, now),
            Action::End => self.controller.end_session(now),
            Action::EndTab(tab_id) => self.controller.end_session_for_tab(tab_id, now),
            Action::Ignore => None,
        };
        self.persist(end.as_ref());
        end
    }

    /// Safety-net flush: persists the time elapsed so far and keeps tracking.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Option<SessionEnd> {
        let end = self.controller.flush(now);
        self.persist(end.as_ref());
        end
    }

    /// Final flush before the process goes away.
    pub fn teardown(&mut self, now: DateTime<Utc>) -> Option<SessionEnd> {
        self.handle(&LifecycleEvent::Suspend, now)
    }

    /// Write failures are logged and swallowed: the session has already
    /// advanced, so the duration is lost but tracking continues.
    fn persist(&mut self, end: Option<&SessionEnd>) {
        let Some(commit) = end.and_then(SessionEnd::commit) else {
            return;
        };
        if let Err(err) = self.writer.commit(commit) {
            tracing::warn!(
                domain = %commit.domain,
                duration_ms = commit.duration_ms,
                error = %err,
                "failed to persist session time"
            );
        }
    }
}
