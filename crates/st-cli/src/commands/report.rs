//! Report command: time per domain and per category.
//!
//! Renders either an aligned text table or JSON for scripting.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use st_core::{Category, CategoryTotals};
use st_db::{UsageRecord, UsageStore};

use super::util::{format_duration, percent, progress_bar};

/// One domain's line in the report.
#[derive(Debug, Serialize)]
pub struct DomainUsage {
    pub domain: String,
    pub ms: u64,
    pub percent: f64,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CategoryUsage {
    pub category: Category,
    pub ms: u64,
}

/// Computed report data.
#[derive(Debug, Serialize)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub total_ms: u64,
    /// Number of tracked domains, including any cut by `limit`.
    pub domain_count: usize,
    pub domains: Vec<DomainUsage>,
    pub categories: Vec<CategoryUsage>,
}

/// Builds report data from a usage record, largest domains first.
pub fn generate_report_data(
    record: &UsageRecord,
    limit: Option<usize>,
    generated_at: DateTime<Utc>,
) -> ReportData {
    let ranked = record.ranked();
    let total_ms = record.total_ms();
    let categories = CategoryTotals::from_usage(ranked.iter().copied())
        .ranked()
        .into_iter()
        .map(|(category, ms)| CategoryUsage { category, ms })
        .collect();

    let domains = ranked
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(domain, ms)| DomainUsage {
            domain: (*domain).to_string(),
            ms: *ms,
            percent: percent(*ms, total_ms),
            category: Category::of(domain),
            last_seen: record.last_seen(domain),
        })
        .collect();

    ReportData {
        generated_at,
        total_ms,
        domain_count: ranked.len(),
        domains,
        categories,
    }
}

/// Formats report data as human-readable text.
pub fn format_report(data: &ReportData) -> String {
    if data.domains.is_empty() {
        return "No usage recorded.\n".to_string();
    }

    let mut out = format!(
        "Usage report: {} domains, {} total\n\n",
        data.domain_count,
        format_duration(data.total_ms)
    );

    let width = data
        .domains
        .iter()
        .map(|d| d.domain.chars().count())
        .max()
        .unwrap_or(0);
    let max_ms = data.domains.first().map_or(0, |d| d.ms);
    for d in &data.domains {
        out.push_str(&format!(
            "{:<width$}  {}  {:>7}  {:>5.1}%  {}\n",
            d.domain,
            progress_bar(d.ms, max_ms),
            format_duration(d.ms),
            d.percent,
            d.category.as_str(),
        ));
    }

    out.push_str("\nBy category:\n");
    for c in &data.categories {
        out.push_str(&format!("{}: {}\n", c.category, format_duration(c.ms)));
    }
    out
}

pub fn run<W: Write>(
    writer: &mut W,
    store: &mut UsageStore,
    json: bool,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<()> {
    let data = generate_report_data(store.load()?, limit, now);
    if json {
        serde_json::to_writer_pretty(&mut *writer, &data)?;
        writeln!(writer)?;
    } else {
        write!(writer, "{}", format_report(&data))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use insta::assert_snapshot;

    fn sample() -> UsageRecord {
        UsageRecord {
            usage: BTreeMap::from([
                ("github.com".to_string(), 45 * 60_000),
                ("youtube.com".to_string(), 20 * 60_000),
            ]),
            usage_meta: BTreeMap::from([("github.com".to_string(), 1_735_725_600_000)]),
        }
    }

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 18, 0, 0).unwrap()
    }

    #[test]
    fn text_report_is_ranked_and_aligned() {
        let data = generate_report_data(&sample(), None, generated_at());
        assert_snapshot!(format_report(&data), @r"
        Usage report: 2 domains, 1h 5m total

        github.com   ██████████      45m   69.2%  Work
        youtube.com  ████░░░░░░      20m   30.8%  Video

        By category:
        Work: 45m
        Video: 20m
        ");
    }

    #[test]
    fn limit_keeps_totals() {
        let data = generate_report_data(&sample(), Some(1), generated_at());
        assert_eq!(data.domains.len(), 1);
        assert_eq!(data.domain_count, 2);
        assert_eq!(data.total_ms, 65 * 60_000);
        assert_eq!(data.categories.len(), 2);
    }

    #[test]
    fn json_report_fields() {
        let data = generate_report_data(&sample(), None, generated_at());
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["total_ms"], 3_900_000);
        assert_eq!(json["domains"][0]["domain"], "github.com");
        assert_eq!(json["domains"][0]["category"], "Work");
        assert_eq!(json["domains"][0]["last_seen"], "2025-01-01T10:00:00Z");
        assert!(json["domains"][1].get("last_seen").is_none());
        assert_eq!(json["categories"][1]["category"], "Video");
    }

    #[test]
    fn empty_report() {
        let data = generate_report_data(&UsageRecord::default(), None, generated_at());
        assert_eq!(format_report(&data), "No usage recorded.\n");
    }
}
