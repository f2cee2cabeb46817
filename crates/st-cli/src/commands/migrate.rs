//! Migrate command: fold legacy usage keys into the current format.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use st_db::UsageStore;

pub fn run<W: Write>(writer: &mut W, store: &mut UsageStore, now: DateTime<Utc>) -> Result<()> {
    let report = store.migrate_legacy(now)?;
    if report.is_noop() {
        writeln!(writer, "Nothing to migrate.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "Folded {} domains from {} legacy keys:",
        report.domains_folded,
        report.keys_removed.len()
    )?;
    for key in &report.keys_removed {
        writeln!(writer, "- {key}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use insta::assert_snapshot;
    use serde_json::json;

    #[test]
    fn migrate_reports_folded_keys() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut store = UsageStore::open_in_memory().unwrap();
        store.set_raw("example.com", &json!(5_000)).unwrap();
        store
            .set_raw("totalUsage", &json!({"news.ycombinator.com": 7_000}))
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut store, now).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Folded 2 domains from 2 legacy keys:
        - example.com
        - totalUsage
        ");

        let mut output = Vec::new();
        run(&mut output, &mut store, now).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"Nothing to migrate.");
    }
}
