//! Digest command: natural-language summary of stored usage.

use std::io::Write;

use anyhow::{Context, Result};
use st_db::UsageStore;
use st_llm::{Client, DigestSource, Goals};

use crate::Config;

/// Builds a model client from the configured key, or the key the extension
/// stored. A bad key is logged and treated as no key.
fn client(store: &UsageStore, config: &Config) -> Result<Option<Client>> {
    let api_key = match &config.ai.api_key {
        Some(key) => Some(key.clone()),
        None => store.api_key()?,
    };
    let Some(api_key) = api_key else {
        return Ok(None);
    };
    match Client::new(api_key, config.ai.model.clone()) {
        Ok(client) => Ok(Some(client)),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unusable API key");
            Ok(None)
        }
    }
}

pub fn run<W: Write>(writer: &mut W, store: &mut UsageStore, config: &Config) -> Result<()> {
    let client = client(store, config)?;
    let stored_goals = store.user_goals()?;
    let goals = Goals {
        social_limit: stored_goals.social_limit,
        work_minimum: stored_goals.work_minimum,
    };
    let record = store.load()?;
    let ranked = record.ranked();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let digest = runtime.block_on(st_llm::digest(
        client.as_ref(),
        &ranked,
        &goals,
        config.ai.timeout(),
    ));

    if let DigestSource::Manual { reason } = &digest.source {
        tracing::info!(reason = %reason, "digest computed locally");
    }
    writeln!(writer, "{}", digest.text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use serde_json::json;
    use st_core::Domain;

    #[test]
    fn digest_without_key_uses_manual_analysis() {
        let mut store = UsageStore::open_in_memory().unwrap();
        store
            .commit(&Domain::new("github.com").unwrap(), 30 * 60_000, Utc::now())
            .unwrap();
        store
            .commit(&Domain::new("reddit.com").unwrap(), 10 * 60_000, Utc::now())
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut store, &Config::default()).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.starts_with("Total browsing time: 40.0 minutes across 2 websites."));
        assert!(output.contains("github.com: 30.0 min (75.0%)"));
        assert!(output.contains("Manual Analysis:"));
        assert!(output.contains("You focused heavily on github.com"));
    }

    #[test]
    fn digest_of_empty_store() {
        let mut store = UsageStore::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &mut store, &Config::default()).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "No browsing data to analyze.\nVisit some websites first!\n"
        );
    }

    #[test]
    fn blank_stored_key_means_no_client() {
        let mut store = UsageStore::open_in_memory().unwrap();
        store.set_raw("geminiApiKey", &json!("  ")).unwrap();
        assert!(client(&store, &Config::default()).unwrap().is_none());

        store.set_raw("geminiApiKey", &json!("stored-key")).unwrap();
        let client = client(&store, &Config::default()).unwrap().unwrap();
        assert_eq!(client.model(), "gemini-1.5-flash");
    }
}
