//! Cleanup command: retention sweep over stored usage.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use st_db::UsageStore;

pub fn run<W: Write>(
    writer: &mut W,
    store: &mut UsageStore,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    let removed = store.cleanup(retention_days, now)?;
    if removed.is_empty() {
        writeln!(writer, "No domains older than {retention_days} days.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "Removed {} domains not seen in {retention_days} days:",
        removed.len()
    )?;
    for domain in removed {
        writeln!(writer, "- {domain}")?;
    }
    Ok(())
}
