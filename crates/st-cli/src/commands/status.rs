//! Status command for a one-glance summary of stored usage.

use std::io::Write;

use anyhow::Result;
use st_db::UsageStore;

use super::util::format_duration;
use crate::Config;

pub fn run<W: Write>(writer: &mut W, store: &mut UsageStore, config: &Config) -> Result<()> {
    let record = store.load()?;

    writeln!(writer, "sitetime status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;

    if record.is_empty() {
        writeln!(writer, "No usage recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Domains: {}", record.usage.len())?;
    writeln!(writer, "Total: {}", format_duration(record.total_ms()))?;

    let latest = record
        .usage_meta
        .iter()
        .max_by_key(|(_, last_seen)| **last_seen)
        .and_then(|(domain, _)| record.last_seen(domain).map(|at| (domain, at)));
    if let Some((domain, at)) = latest {
        writeln!(writer, "Last activity: {domain} at {at}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use st_core::Domain;

    #[test]
    fn status_command_summarizes_usage() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("sitetime.db");
        let mut store = UsageStore::open(&db_path).unwrap();

        let morning = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let noon = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        store
            .commit(&Domain::new("github.com").unwrap(), 45 * 60_000, noon)
            .unwrap();
        store
            .commit(&Domain::new("youtube.com").unwrap(), 20 * 60_000, morning)
            .unwrap();

        let config = Config {
            database_path: db_path.clone(),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &mut store, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/sitetime.db");
        assert_snapshot!(output, @r"
        sitetime status
        Database: [TEMP]/sitetime.db
        Domains: 2
        Total: 1h 5m
        Last activity: github.com at 2025-01-01 12:00:00 UTC
        ");
    }

    #[test]
    fn status_command_on_empty_store() {
        let mut store = UsageStore::open_in_memory().unwrap();
        let config = Config {
            database_path: "sitetime.db".into(),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &mut store, &config).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        sitetime status
        Database: sitetime.db
        No usage recorded.
        ");
    }
}
