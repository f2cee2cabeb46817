//! Run command: the long-lived tracking loop.
//!
//! A reader task turns stdin lines into [`LifecycleEvent`]s and sends them
//! over a channel. A single consumer owns the [`Tracker`], so every commit
//! to the store happens from one place and in event order. A periodic
//! flush bounds how much time a crash can lose. When input ends or Ctrl-C
//! arrives the channel closes and the consumer settles the open session.
//!
//! Events, flushes and the final settle all read one [`FeedClock`], so a
//! replayed feed is measured in its own recorded time.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use st_core::{LifecycleEvent, SessionEnd, Tracker, UsageWriter};
use st_db::UsageStore;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use super::util::format_duration;
use crate::Config;

const EVENT_BUFFER: usize = 256;

/// An input line: a lifecycle event plus an optional timestamp.
///
/// Without `at` the event happens when it is received. With `at` it is
/// replayed at that time, which makes recorded feeds reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimedEvent {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<Result<TimedEvent, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events: usize,
    pub skipped: usize,
    pub commits: usize,
    pub discards: usize,
    pub committed_ms: u64,
}

impl RunStats {
    fn record(&mut self, end: Option<&SessionEnd>) {
        match end {
            Some(SessionEnd::Committed(commit)) => {
                self.commits += 1;
                self.committed_ms = self.committed_ms.saturating_add(commit.duration_ms);
            }
            Some(SessionEnd::Discarded { .. }) => self.discards += 1,
            None => {}
        }
    }
}

/// The time events, flushes and teardown happen at.
///
/// Until an event carries `at` this is the wall clock. After one, time
/// runs on from that recorded instant by the wall time elapsed since the
/// event was received.
#[derive(Debug, Clone, Copy, Default)]
struct FeedClock {
    anchor: Option<(DateTime<Utc>, Instant)>,
}

impl FeedClock {
    /// The time of an event just received, re-anchoring on `at` if given.
    fn observe(&mut self, at: Option<DateTime<Utc>>) -> DateTime<Utc> {
        match at {
            Some(at) => {
                self.anchor = Some((at, Instant::now()));
                at
            }
            None => self.now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let Some((at, received)) = self.anchor else {
            return Utc::now();
        };
        chrono::Duration::from_std(received.elapsed())
            .ok()
            .and_then(|elapsed| at.checked_add_signed(elapsed))
            .unwrap_or(at)
    }
}

/// Reads events from `input` until EOF or Ctrl-C. Returns the number of
/// malformed lines skipped.
async fn read_events<R>(input: R, tx: mpsc::Sender<TimedEvent>) -> usize
where
    R: AsyncRead + Unpin + Send,
{
    let mut lines = BufReader::new(input).lines();
    let mut skipped = 0;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut listen_for_ctrl_c = true;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            signal = &mut ctrl_c, if listen_for_ctrl_c => match signal {
                Ok(()) => {
                    tracing::info!("interrupted, stopping");
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "cannot listen for Ctrl-C");
                    listen_for_ctrl_c = false;
                    continue;
                }
            },
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read input, stopping");
                break;
            }
        };

        match parse_line(&line) {
            None => {}
            Some(Ok(event)) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Some(Err(err)) => {
                skipped += 1;
                tracing::warn!(error = %err, %line, "skipping malformed event");
            }
        }
    }
    skipped
}

/// Applies events and periodic flushes until the channel closes, then
/// settles the open session.
async fn consume<W: UsageWriter + Send>(
    tracker: &mut Tracker<W>,
    mut rx: mpsc::Receiver<TimedEvent>,
    flush_every: Duration,
) -> RunStats {
    let mut stats = RunStats::default();
    let mut clock = FeedClock::default();
    let mut ticker = tokio::time::interval_at(Instant::now() + flush_every, flush_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(timed) = received else {
                    break;
                };
                stats.events += 1;
                let now = clock.observe(timed.at);
                stats.record(tracker.handle(&timed.event, now).as_ref());
            }
            _ = ticker.tick() => {
                tracing::trace!("periodic flush");
                stats.record(tracker.flush(clock.now()).as_ref());
            }
        }
    }

    stats.record(tracker.teardown(clock.now()).as_ref());
    stats
}

/// Runs the tracking loop over `input`.
pub async fn track<R, W>(input: R, tracker: &mut Tracker<W>, flush_every: Duration) -> RunStats
where
    R: AsyncRead + Unpin + Send + 'static,
    W: UsageWriter + Send,
{
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let reader = tokio::spawn(read_events(input, tx));
    let mut stats = consume(tracker, rx, flush_every).await;
    stats.skipped = reader.await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "event reader failed");
        0
    });
    stats
}

/// Prepares the store, then tracks events from stdin until EOF or Ctrl-C.
pub fn run<W: Write>(writer: &mut W, mut store: UsageStore, config: &Config) -> Result<RunStats> {
    let controller = config
        .tracking
        .controller()
        .context("invalid tracking configuration")?;

    // housekeeping failures leave data in place for the next start
    let now = Utc::now();
    match store.migrate_legacy(now) {
        Ok(report) if !report.is_noop() => {
            tracing::info!(keys = report.keys_removed.len(), "folded legacy usage");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "legacy migration failed"),
    }
    if let Err(err) = store.cleanup(config.tracking.retention_days, now) {
        tracing::warn!(error = %err, "retention sweep failed");
    }
    let domains = store.load()?.usage.len();
    tracing::info!(domains, "usage loaded, tracking");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let mut tracker = Tracker::new(controller, store);
    let stats = runtime.block_on(track(
        tokio::io::stdin(),
        &mut tracker,
        config.tracking.flush_interval(),
    ));
    // stdin is read on a blocking thread that may never return
    runtime.shutdown_background();

    writeln!(
        writer,
        "Processed {} events ({} skipped): {} sessions committed ({}), {} discarded.",
        stats.events,
        stats.skipped,
        stats.commits,
        format_duration(stats.committed_ms),
        stats.discards
    )?;
    Ok(stats)
}
