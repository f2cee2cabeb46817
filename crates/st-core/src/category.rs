//! Coarse site categories and the nudges derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

const MINUTE_MS: u64 = 60_000;

/// Social time above this earns a nudge.
const SOCIAL_NUDGE_MS: u64 = 60 * MINUTE_MS;
/// Video time above this earns a nudge.
const VIDEO_NUDGE_MS: u64 = 90 * MINUTE_MS;
/// Work time below this earns a nudge.
const WORK_NUDGE_MS: u64 = 45 * MINUTE_MS;

const SOCIAL: &[&str] = &[
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "tiktok.com",
    "reddit.com",
    "pinterest.com",
];
const VIDEO: &[&str] = &["youtube.com", "vimeo.com", "twitch.tv", "netflix.com", "hulu.com"];
const WORK: &[&str] = &[
    "github.com",
    "gitlab.com",
    "stackoverflow.com",
    "notion.so",
    "notion.site",
    "docs.google.com",
    "drive.google.com",
    "figma.com",
    "slack.com",
];
const SHOPPING: &[&str] = &["amazon.com", "ebay.com", "etsy.com", "aliexpress.com", "bestbuy.com"];
const NEWS: &[&str] = &["nytimes.com", "cnn.com", "bbc.com", "theverge.com", "wsj.com", "bloomberg.com"];

/// Site category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Work,
    Social,
    Video,
    Shopping,
    News,
    Other,
}

impl Category {
    pub const ALL: [Self; 6] = [
        Self::Work,
        Self::Social,
        Self::Video,
        Self::Shopping,
        Self::News,
        Self::Other,
    ];

    /// Categorizes a domain by exact match or subdomain of a known site.
    pub fn of(domain: &str) -> Self {
        let domain = domain.to_ascii_lowercase();
        let matches = |sites: &[&str]| {
            sites.iter().any(|site| {
                domain == *site
                    || domain
                        .strip_suffix(site)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
        };

        if matches(SOCIAL) {
            Self::Social
        } else if matches(VIDEO) {
            Self::Video
        } else if matches(WORK) {
            Self::Work
        } else if matches(SHOPPING) {
            Self::Shopping
        } else if matches(NEWS) {
            Self::News
        } else {
            Self::Other
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Social => "Social",
            Self::Video => "Video",
            Self::Shopping => "Shopping",
            Self::News => "News",
            Self::Other => "Other",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milliseconds per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTotals([u64; 6]);

impl CategoryTotals {
    /// Sums usage per category.
    pub fn from_usage<'a>(usage: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let mut totals = Self::default();
        for (domain, ms) in usage {
            let slot = &mut totals.0[Category::of(domain).index()];
            *slot = slot.saturating_add(ms);
        }
        totals
    }

    pub const fn get(&self, category: Category) -> u64 {
        self.0[category.index()]
    }

    /// Non-empty categories, largest first.
    pub fn ranked(&self) -> Vec<(Category, u64)> {
        let mut ranked: Vec<_> = Category::ALL
            .into_iter()
            .map(|category| (category, self.get(category)))
            .filter(|(_, ms)| *ms > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// Short suggestions for unbalanced usage.
    pub fn nudges(&self) -> Vec<String> {
        let mut nudges = Vec::new();
        let social = self.get(Category::Social);
        if social > SOCIAL_NUDGE_MS {
            nudges.push(format!(
                "High social time ({} min). Consider batching checks.",
                minutes(social)
            ));
        }
        let video = self.get(Category::Video);
        if video > VIDEO_NUDGE_MS {
            nudges.push(format!(
                "Lots of video ({} min). Try a timer for intentional breaks.",
                minutes(video)
            ));
        }
        let work = self.get(Category::Work);
        if work < WORK_NUDGE_MS {
            nudges.push(format!(
                "Low focus time ({} min). Block a 25-min deep work session.",
                minutes(work)
            ));
        }
        nudges
    }
}

fn minutes(ms: u64) -> u64 {
    (ms + MINUTE_MS / 2) / MINUTE_MS
}
