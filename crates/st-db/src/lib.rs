//! Durable usage store for sitetime.
//!
//! Persists cumulative per-domain usage using `rusqlite`.
//!
//! # Schema
//!
//! The database is a single key-value table mirroring the extension's
//! `storage.local` area. Values are JSON text:
//!
//! - `usage`: `{ "<domain>": <milliseconds> }`
//! - `usageMeta`: `{ "<domain>": <last-seen epoch milliseconds> }`
//! - unrelated keys (`userGoals`, `theme`, `streakData`, `geminiApiKey`)
//!   that the tracking code never deletes outside an allow-listed reset.
//!
//! Older builds wrote each domain as its own top-level key, or kept a
//! `totalUsage` object; [`UsageStore::migrate_legacy`] folds those in.
//!
//! # Thread Safety
//!
//! [`UsageStore`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Commits are read-modify-write, so exactly one owner should issue
//! them; the tracker's event loop is that owner. Readers in other processes
//! (e.g. `st status`) are safe because every write runs in an immediate
//! transaction.

mod record;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde_json::Value;
use st_core::{Commit, Domain, UsageWriter};
use thiserror::Error;

pub use record::{EXPORT_VERSION, ExportData, UsageRecord, UserGoals};

use record::{StoredMap, as_millis, as_timestamp, parse_map, to_object};

/// Key holding the domain → milliseconds map.
pub const USAGE_KEY: &str = "usage";
/// Key holding the domain → last-seen map.
pub const USAGE_META_KEY: &str = "usageMeta";
/// Legacy key for the usage map written by early popup builds.
pub const LEGACY_TOTAL_USAGE_KEY: &str = "totalUsage";
/// Key holding the user's goals.
pub const USER_GOALS_KEY: &str = "userGoals";
/// Key holding the cloud LLM API key.
pub const API_KEY_KEY: &str = "geminiApiKey";

/// Keys that survive [`UsageStore::reset`] by default.
pub const DEFAULT_PRESERVED_KEYS: &[&str] = &[USER_GOALS_KEY, "theme", "streakData", API_KEY_KEY];

/// Keys that are never legacy per-domain entries, even when numeric.
const RESERVED_KEYS: &[&str] = &[
    USAGE_KEY,
    USAGE_META_KEY,
    LEGACY_TOTAL_USAGE_KEY,
    USER_GOALS_KEY,
    API_KEY_KEY,
    "theme",
    "streakData",
    "lastUpdated",
    "lastSummaryTime",
    "activityLog",
    "userPreferences",
];

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1_000;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored value was not valid JSON.
    #[error("invalid JSON under key {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// A stored value had the wrong shape.
    #[error("invalid record under key {key}: {message}")]
    InvalidRecord { key: String, message: String },
}

/// Result of a legacy migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Domains whose legacy totals were folded into `usage`.
    pub domains_folded: usize,
    /// Legacy keys deleted after folding.
    pub keys_removed: Vec<String>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.keys_removed.is_empty()
    }
}

/// Key-value usage store.
///
/// See the [module documentation](self) for the schema.
pub struct UsageStore {
    conn: Connection,
    cache: Option<UsageRecord>,
}

impl std::fmt::Debug for UsageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageStore")
            .field("cached_domains", &self.cache.as_ref().map(|c| c.usage.len()))
            .finish_non_exhaustive()
    }
}

impl UsageStore {
    /// Opens a store at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store.
    ///
    /// Useful for testing. The data is destroyed when the store is dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn, cache: None };
        store.init()?;
        Ok(store)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Reads durable usage into the in-memory cache.
    ///
    /// Safe to call any number of times; it only ever replaces the cache
    /// with what is on disk.
    pub fn load(&mut self) -> Result<&UsageRecord, StoreError> {
        let record = read_record(&self.conn)?;
        tracing::debug!(domains = record.usage.len(), "usage loaded");
        Ok(self.cache.insert(record))
    }

    /// The cache filled by the last [`load`](Self::load) or write, if any.
    pub const fn cached(&self) -> Option<&UsageRecord> {
        self.cache.as_ref()
    }

    /// Adds `duration_ms` to `domain` and stamps it last-seen at `at`.
    ///
    /// Both maps are written in one transaction, so no reader ever sees
    /// the duration without the timestamp or the reverse.
    pub fn commit(
        &mut self,
        domain: &Domain,
        duration_ms: u64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (mut record, unreadable) = read_stored(&tx)?;
        let total = record.usage.entry(domain.to_string()).or_default();
        *total = total.saturating_add(duration_ms);
        record
            .usage_meta
            .insert(domain.to_string(), at.timestamp_millis());
        write_record(&tx, &record, &unreadable)?;
        tx.commit()?;

        tracing::debug!(%domain, duration_ms, total_ms = record.usage[domain.as_str()], "usage committed");
        self.cache = Some(record);
        Ok(())
    }

    /// Removes every domain last seen more than `retention_days` before `now`.
    ///
    /// Usage and metadata are removed together in a single write. Domains
    /// without a last-seen stamp are kept. Returns the removed domains.
    pub fn cleanup(
        &mut self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let cutoff = now.timestamp_millis() - i64::from(retention_days) * MS_PER_DAY;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (mut record, mut unreadable) = read_stored(&tx)?;
        let stale: Vec<String> = record
            .usage_meta
            .iter()
            .filter(|(_, last_seen)| **last_seen < cutoff)
            .map(|(domain, _)| domain.clone())
            .collect();

        if stale.is_empty() {
            drop(tx);
            self.cache = Some(record);
            return Ok(stale);
        }

        for domain in &stale {
            record.usage.remove(domain);
            record.usage_meta.remove(domain);
            unreadable.remove(domain);
        }
        write_record(&tx, &record, &unreadable)?;
        tx.commit()?;

        tracing::info!(removed = stale.len(), retention_days, "retention sweep");
        self.cache = Some(record);
        Ok(stale)
    }

    /// Folds legacy usage formats into the `usage` map.
    ///
    /// Legacy totals are added to, never overwrite, current totals. Folded
    /// keys are deleted in the same transaction, so a second run is a no-op
    /// and a failed run leaves the legacy data in place.
    pub fn migrate_legacy(&mut self, now: DateTime<Utc>) -> Result<MigrationReport, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut folded: BTreeMap<String, u64> = BTreeMap::new();
        let mut unfoldable = serde_json::Map::new();
        let mut legacy_keys = Vec::new();
        for (key, value) in read_all(&tx)? {
            if key == LEGACY_TOTAL_USAGE_KEY {
                let legacy = parse_map(&key, Some(value), as_millis)?;
                for (domain, ms) in legacy.parsed {
                    let total = folded.entry(domain).or_default();
                    *total = total.saturating_add(ms);
                }
                unfoldable.extend(legacy.unreadable);
                legacy_keys.push(key);
            } else if is_legacy_domain_key(&key) {
                let Some(ms) = as_millis(&value) else {
                    continue;
                };
                let total = folded.entry(key.clone()).or_default();
                *total = total.saturating_add(ms);
                legacy_keys.push(key);
            }
        }

        if legacy_keys.is_empty() {
            return Ok(MigrationReport::default());
        }

        let (mut record, mut unreadable) = read_stored(&tx)?;
        let stamp = now.timestamp_millis();
        for (domain, ms) in &folded {
            let total = record.usage.entry(domain.clone()).or_default();
            *total = total.saturating_add(*ms);
            record.usage_meta.entry(domain.clone()).or_insert(stamp);
        }
        // carried into `usage` as is rather than deleted with the legacy key
        for (domain, raw) in unfoldable {
            if !record.usage.contains_key(&domain) {
                unreadable.usage.entry(domain).or_insert(raw);
            }
        }
        write_record(&tx, &record, &unreadable)?;
        for key in &legacy_keys {
            tx.execute("DELETE FROM storage WHERE key = ?1", params![key])?;
        }
        tx.commit()?;

        tracing::info!(
            domains = folded.len(),
            keys = legacy_keys.len(),
            "migrated legacy usage"
        );
        self.cache = Some(record);
        Ok(MigrationReport {
            domains_folded: folded.len(),
            keys_removed: legacy_keys,
        })
    }

    /// Deletes all keys except those in `preserve`. Returns how many keys
    /// were removed.
    pub fn reset(&mut self, preserve: &[&str]) -> Result<usize, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let keys = list_keys(&tx)?;
        let mut removed = 0;
        for key in keys.iter().filter(|k| !preserve.contains(&k.as_str())) {
            removed += tx.execute("DELETE FROM storage WHERE key = ?1", params![key])?;
        }
        tx.commit()?;

        tracing::info!(removed, preserved = ?preserve, "store reset");
        self.cache = None;
        Ok(removed)
    }

    /// Snapshot of usage, metadata and goals for export.
    pub fn export(&self, now: DateTime<Utc>) -> Result<ExportData, StoreError> {
        let record = read_record(&self.conn)?;
        let user_goals = read_value(&self.conn, USER_GOALS_KEY)?
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        Ok(ExportData {
            usage: record.usage,
            usage_meta: record.usage_meta,
            user_goals,
            export_date: now,
            version: EXPORT_VERSION.to_string(),
        })
    }

    /// The user's goals, or defaults if none are stored or they are unreadable.
    pub fn user_goals(&self) -> Result<UserGoals, StoreError> {
        let Some(value) = read_value(&self.conn, USER_GOALS_KEY)? else {
            return Ok(UserGoals::default());
        };
        Ok(serde_json::from_value(value).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring malformed user goals");
            UserGoals::default()
        }))
    }

    /// The stored cloud API key, if any.
    pub fn api_key(&self) -> Result<Option<String>, StoreError> {
        Ok(read_value(&self.conn, API_KEY_KEY)?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|key| !key.trim().is_empty()))
    }

    /// Reads a raw JSON value.
    pub fn get_raw(&self, key: &str) -> Result<Option<Value>, StoreError> {
        read_value(&self.conn, key)
    }

    /// Writes a raw JSON value, replacing any previous value.
    pub fn set_raw(&mut self, key: &str, value: &Value) -> Result<(), StoreError> {
        write_value(&self.conn, key, value)?;
        if key == USAGE_KEY || key == USAGE_META_KEY {
            self.cache = None;
        }
        Ok(())
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        list_keys(&self.conn)
    }
}

impl UsageWriter for UsageStore {
    type Error = StoreError;

    fn commit(&mut self, commit: &Commit) -> Result<(), Self::Error> {
        Self::commit(self, &commit.domain, commit.duration_ms, commit.at)
    }
}

/// A flat legacy entry is a top-level key that looks like a hostname.
fn is_legacy_domain_key(key: &str) -> bool {
    !RESERVED_KEYS.contains(&key)
        && Domain::new(key).is_ok()
        && (key.contains('.') || key == "localhost")
}

/// Stored entries of `usage` and `usageMeta` that did not parse.
#[derive(Debug, Default)]
struct Unreadable {
    usage: serde_json::Map<String, Value>,
    usage_meta: serde_json::Map<String, Value>,
}

impl Unreadable {
    fn remove(&mut self, domain: &str) {
        self.usage.remove(domain);
        self.usage_meta.remove(domain);
    }
}

fn read_record(conn: &Connection) -> Result<UsageRecord, StoreError> {
    Ok(read_stored(conn)?.0)
}

fn read_stored(conn: &Connection) -> Result<(UsageRecord, Unreadable), StoreError> {
    let usage: StoredMap<u64> = parse_map(USAGE_KEY, read_value(conn, USAGE_KEY)?, as_millis)?;
    let usage_meta: StoredMap<i64> =
        parse_map(USAGE_META_KEY, read_value(conn, USAGE_META_KEY)?, as_timestamp)?;
    Ok((
        UsageRecord {
            usage: usage.parsed,
            usage_meta: usage_meta.parsed,
        },
        Unreadable {
            usage: usage.unreadable,
            usage_meta: usage_meta.unreadable,
        },
    ))
}

fn write_record(
    conn: &Connection,
    record: &UsageRecord,
    unreadable: &Unreadable,
) -> Result<(), StoreError> {
    write_value(conn, USAGE_KEY, &to_object(&record.usage, &unreadable.usage))?;
    write_value(
        conn,
        USAGE_META_KEY,
        &to_object(&record.usage_meta, &unreadable.usage_meta),
    )
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<Value>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM storage WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|text| parse_json(key, &text)).transpose()
}

fn write_value(conn: &Connection, key: &str, value: &Value) -> Result<(), StoreError> {
    let text = serde_json::to_string(value).map_err(|source| StoreError::Json {
        key: key.to_string(),
        source,
    })?;
    conn.execute(
        "
        INSERT INTO storage (key, value) VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        ",
        params![key, text],
    )?;
    Ok(())
}

fn read_all(conn: &Connection) -> Result<Vec<(String, Value)>, StoreError> {
    let mut stmt = conn.prepare("SELECT key, value FROM storage ORDER BY key ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (key, text) = row?;
        let value = parse_json(&key, &text)?;
        entries.push((key, value));
    }
    Ok(entries)
}

fn list_keys(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT key FROM storage ORDER BY key ASC")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut keys = Vec::new();
    for row in rows {
        keys.push(row?);
    }
    Ok(keys)
}

fn parse_json(key: &str, text: &str) -> Result<Value, StoreError> {
    serde_json::from_str(text).map_err(|source| StoreError::Json {
        key: key.to_string(),
        source,
    })
}
