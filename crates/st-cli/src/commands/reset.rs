//! Reset command: delete stored data outside an allow-list.

use std::io::Write;

use anyhow::{Result, bail};
use st_db::{DEFAULT_PRESERVED_KEYS, UsageStore};

/// Keys kept by a reset: the defaults plus `extra`.
pub fn preserved_keys(extra: &[String]) -> Vec<&str> {
    let mut keys: Vec<&str> = DEFAULT_PRESERVED_KEYS.to_vec();
    for key in extra {
        if !keys.contains(&key.as_str()) {
            keys.push(key);
        }
    }
    keys
}

pub fn run<W: Write>(
    writer: &mut W,
    store: &mut UsageStore,
    keep: &[String],
    confirmed: bool,
) -> Result<()> {
    if !confirmed {
        bail!("refusing to delete usage data without --yes");
    }

    let preserve = preserved_keys(keep);
    let removed = store.reset(&preserve)?;
    writeln!(
        writer,
        "Removed {removed} keys (kept: {}).",
        preserve.join(", ")
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use insta::assert_snapshot;
    use serde_json::json;
    use st_core::Domain;

    #[test]
    fn reset_keeps_goals_and_extra_keys() {
        let mut store = UsageStore::open_in_memory().unwrap();
        store
            .commit(&Domain::new("example.com").unwrap(), 5_000, Utc::now())
            .unwrap();
        store.set_raw("userGoals", &json!({"socialLimit": 30})).unwrap();
        store.set_raw("theme", &json!("dark")).unwrap();
        store.set_raw("lastSummaryTime", &json!(1)).unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut store, &["lastSummaryTime".to_string()], true).unwrap();

        assert_snapshot!(
            String::from_utf8(output).unwrap(),
            @"Removed 2 keys (kept: userGoals, theme, streakData, geminiApiKey, lastSummaryTime)."
        );
        assert_eq!(
            store.keys().unwrap(),
            vec!["lastSummaryTime", "theme", "userGoals"]
        );
    }

    #[test]
    fn reset_requires_confirmation() {
        let mut store = UsageStore::open_in_memory().unwrap();
        store.set_raw("usage", &json!({"example.com": 1})).unwrap();

        let err = run(&mut Vec::new(), &mut store, &[], false).unwrap_err();
        assert!(err.to_string().contains("--yes"));
        assert_eq!(store.keys().unwrap(), vec!["usage"]);
    }

    #[test]
    fn duplicate_keep_is_ignored() {
        assert_eq!(
            preserved_keys(&["theme".to_string()]),
            DEFAULT_PRESERVED_KEYS.to_vec()
        );
    }
}
