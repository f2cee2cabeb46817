//! Usage digests: the text blob sent to the model and the local fallback.

use std::fmt::Write as _;
use std::time::Duration;

use st_core::CategoryTotals;

use crate::{LlmError, Summarizer};

const MINUTE_MS: f64 = 60_000.0;
/// Above this many minutes online the manual insight suggests breaks.
const HEAVY_USAGE_MINUTES: f64 = 240.0;
/// Above this many sites the manual insight suggests focusing.
const SCATTERED_SITE_COUNT: usize = 15;
/// Above this share of total time the top site counts as deep work.
const FOCUSED_SHARE_PERCENT: f64 = 50.0;

/// Goals included in the prompt when set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Goals {
    /// Social media limit in minutes.
    pub social_limit: Option<u32>,
    /// Work/research minimum in minutes.
    pub work_minimum: Option<u32>,
}

impl Goals {
    const fn is_set(&self) -> bool {
        self.social_limit.is_some() || self.work_minimum.is_some()
    }

    fn prompt_context(&self) -> String {
        if !self.is_set() {
            return String::new();
        }
        let mut out = String::from("\n\nUser Goals:\n");
        if let Some(limit) = self.social_limit {
            let _ = writeln!(out, "- Social media limit: {limit} minutes");
        }
        if let Some(minimum) = self.work_minimum {
            let _ = writeln!(out, "- Work/research minimum: {minimum} minutes");
        }
        out
    }
}

/// Where a digest's text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestSource {
    /// No usage recorded yet.
    Empty,
    /// The model answered.
    Model,
    /// Computed locally because the model was unavailable or failed.
    Manual { reason: String },
}

/// A rendered usage digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub text: String,
    pub source: DigestSource,
}

fn minutes(ms: u64) -> f64 {
    #[expect(clippy::cast_precision_loss, reason = "display only")]
    let ms = ms as f64;
    ms / MINUTE_MS
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[expect(clippy::cast_precision_loss, reason = "display only")]
    let share = part as f64 / total as f64;
    share * 100.0
}

/// Formats usage as the text blob handed to the model.
///
/// `ranked` must be sorted by usage, largest first.
pub fn format_usage_text(ranked: &[(&str, u64)]) -> String {
    let total: u64 = ranked.iter().map(|(_, ms)| *ms).sum();
    let categories = CategoryTotals::from_usage(ranked.iter().copied());

    let mut out = format!(
        "Total browsing time: {:.1} minutes across {} websites.\n\nBy category:\n",
        minutes(total),
        ranked.len()
    );
    for (category, ms) in categories.ranked() {
        let _ = writeln!(out, "{category}: {:.1} min", minutes(ms));
    }
    out.push_str("\nTop domains:\n");
    let lines: Vec<String> = ranked
        .iter()
        .map(|(domain, ms)| {
            format!(
                "{domain}: {:.1} min ({:.1}%)",
                minutes(*ms),
                percent(*ms, total)
            )
        })
        .collect();
    out.push_str(&lines.join("\n"));
    out
}

/// Rule-based analysis used when the model is unavailable.
///
/// `ranked` must be non-empty and sorted by usage, largest first.
pub fn manual_analysis(ranked: &[(&str, u64)]) -> String {
    let total: u64 = ranked.iter().map(|(_, ms)| *ms).sum();
    let Some((top_domain, top_ms)) = ranked.first().copied() else {
        return String::from("No browsing data to analyze.");
    };
    let total_minutes = minutes(total);
    let top_share = percent(top_ms, total);

    let insight = if total_minutes > HEAVY_USAGE_MINUTES {
        "You've spent significant time online in total. Consider taking regular screen breaks."
            .to_string()
    } else if ranked.len() > SCATTERED_SITE_COUNT {
        "You visited many different sites. Focusing on fewer tasks might boost productivity."
            .to_string()
    } else if top_share > FOCUSED_SHARE_PERCENT {
        format!("You focused heavily on {top_domain}. Great for deep work!")
    } else {
        "Your browsing looks balanced overall. Keep up the good habits!".to_string()
    };

    format!(
        "Manual Analysis:\nTotal: {total_minutes:.1} min | Sites: {}\nTop: {top_domain} ({:.1} min)\n\nInsight:\n{insight}",
        ranked.len(),
        minutes(top_ms),
    )
}

fn summary_prompt(usage_text: &str, goals: &Goals) -> String {
    format!(
        "Here is my cumulative browsing activity (all recorded time, not a single day):\n{usage_text}{}\n\nPlease provide a brief, insightful summary (2-3 sentences) of my browsing habits. Focus on patterns, productivity, and balance. Be constructive and non-judgmental. If goals are set, compare actual usage against those goals.",
        goals.prompt_context()
    )
}

fn tip_prompt(usage_text: &str, goals: &Goals) -> String {
    format!(
        "Based on this browsing data:\n{usage_text}{}\n\nGenerate one short, practical tip (1 sentence) to improve digital wellbeing or productivity. Make it supportive and actionable. If goals are set, reference them in your tip.",
        goals.prompt_context()
    )
}

fn format_model_response(summary: &str, tip: &str, goals: &Goals) -> String {
    let mut out = format!("Browsing Summary:\n{}\n\n", summary.trim());
    if goals.is_set() {
        out.push_str("Goal Check:\n");
        if let Some(limit) = goals.social_limit {
            let _ = writeln!(out, "- Social media limit: {limit} min");
        }
        if let Some(minimum) = goals.work_minimum {
            let _ = writeln!(out, "- Work/research minimum: {minimum} min");
        }
        out.push('\n');
    }
    let _ = write!(out, "Tip:\n{}", tip.trim());
    out
}

fn with_nudges(text: String, nudges: &[String]) -> String {
    if nudges.is_empty() {
        return text;
    }
    format!("{text}\n\nGentle Nudges:\n- {}", nudges.join("\n- "))
}

async fn ask_model<S: Summarizer + Sync>(
    model: &S,
    usage_text: &str,
    goals: &Goals,
    timeout: Duration,
) -> Result<String, LlmError> {
    let summary_prompt = summary_prompt(usage_text, goals);
    let tip_prompt = tip_prompt(usage_text, goals);
    let both = async {
        tokio::join!(model.generate(&summary_prompt), model.generate(&tip_prompt))
    };
    let (summary, tip) = tokio::time::timeout(timeout, both)
        .await
        .map_err(|_| LlmError::Timeout(timeout))?;
    Ok(format_model_response(&summary?, &tip?, goals))
}

/// Builds a digest of `ranked` usage.
///
/// The model call is raced against `timeout`; on any failure, or when no
/// model is configured, the digest falls back to [`manual_analysis`] with
/// the raw usage text prepended.
pub async fn digest<S: Summarizer + Sync>(
    model: Option<&S>,
    ranked: &[(&str, u64)],
    goals: &Goals,
    timeout: Duration,
) -> Digest {
    if ranked.is_empty() {
        return Digest {
            text: "No browsing data to analyze.\nVisit some websites first!".to_string(),
            source: DigestSource::Empty,
        };
    }

    let usage_text = format_usage_text(ranked);
    let nudges = CategoryTotals::from_usage(ranked.iter().copied()).nudges();

    let failure = match model {
        Some(model) => match ask_model(model, &usage_text, goals, timeout).await {
            Ok(text) => {
                return Digest {
                    text: with_nudges(text, &nudges),
                    source: DigestSource::Model,
                };
            }
            Err(err) => {
                tracing::warn!(error = %err, "model digest failed, using manual analysis");
                err.to_string()
            }
        },
        None => "no API key configured".to_string(),
    };

    let fallback = with_nudges(manual_analysis(ranked), &nudges);
    Digest {
        text: format!("{usage_text}\n\n{fallback}"),
        source: DigestSource::Manual { reason: failure },
    }
}
