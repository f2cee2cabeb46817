//! Export command: JSON snapshot of usage, metadata and goals.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use st_db::UsageStore;

/// Writes the snapshot to `output`, or to `writer` when no path is given.
pub fn run<W: Write>(
    writer: &mut W,
    store: &UsageStore,
    output: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<()> {
    let data = store.export(now)?;

    if let Some(path) = output {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut file = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut file, &data)?;
        writeln!(file)?;
        file.flush()?;
        writeln!(
            writer,
            "Exported {} domains to {}",
            data.usage.len(),
            path.display()
        )?;
        return Ok(());
    }

    serde_json::to_writer_pretty(&mut *writer, &data)?;
    writeln!(writer)?;
    Ok(())
}
