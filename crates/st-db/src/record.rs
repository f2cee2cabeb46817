//! Typed views of the durable key-value schema.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StoreError;

/// Version tag written into exports.
pub const EXPORT_VERSION: &str = "1.0";

/// Cumulative usage per domain plus last-seen metadata.
///
/// Stored under two keys: `usage` (domain → milliseconds) and `usageMeta`
/// (domain → last-seen epoch milliseconds).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(default)]
    pub usage: BTreeMap<String, u64>,
    #[serde(default, rename = "usageMeta")]
    pub usage_meta: BTreeMap<String, i64>,
}

impl UsageRecord {
    /// Total milliseconds across all domains.
    pub fn total_ms(&self) -> u64 {
        self.usage.values().fold(0, |acc, ms| acc.saturating_add(*ms))
    }

    /// Domains ordered by usage, largest first, ties by name.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<_> = self
            .usage
            .iter()
            .map(|(domain, ms)| (domain.as_str(), *ms))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// When `domain` was last committed, if known.
    pub fn last_seen(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.usage_meta
            .get(domain)
            .and_then(|ms| DateTime::from_timestamp_millis(*ms))
    }

    pub fn is_empty(&self) -> bool {
        self.usage.is_empty()
    }
}

/// User goals set from the options page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGoals {
    /// Daily social media limit in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_limit: Option<u32>,
    /// Daily work/research minimum in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_minimum: Option<u32>,
}

impl UserGoals {
    pub const fn is_set(&self) -> bool {
        self.social_limit.is_some() || self.work_minimum.is_some()
    }
}

/// Snapshot handed to the export collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub usage: BTreeMap<String, u64>,
    pub usage_meta: BTreeMap<String, i64>,
    pub user_goals: Value,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

/// Interprets a stored JSON value as a non-negative millisecond count.
///
/// Older data was written by JavaScript, so fractional values are rounded.
pub(crate) fn as_millis(value: &Value) -> Option<u64> {
    if let Some(ms) = value.as_u64() {
        return Some(ms);
    }
    let ms = value.as_f64()?;
    if !ms.is_finite() || ms < 0.0 || ms > u64::MAX as f64 {
        return None;
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "range checked above"
    )]
    let ms = ms.round() as u64;
    Some(ms)
}

/// Interprets a stored JSON value as an epoch-millisecond timestamp.
pub(crate) fn as_timestamp(value: &Value) -> Option<i64> {
    if let Some(ms) = value.as_i64() {
        return Some(ms);
    }
    let ms = value.as_f64()?;
    if !ms.is_finite() || ms.abs() > i64::MAX as f64 {
        return None;
    }
    #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
    let ms = ms.round() as i64;
    Some(ms)
}

/// An object-valued key split into entries that parsed and entries that
/// did not.
///
/// Unreadable entries are written back untouched, so a bad value under one
/// domain never costs another domain its data.
#[derive(Debug)]
pub(crate) struct StoredMap<T> {
    pub parsed: BTreeMap<String, T>,
    pub unreadable: Map<String, Value>,
}

impl<T> Default for StoredMap<T> {
    fn default() -> Self {
        Self {
            parsed: BTreeMap::new(),
            unreadable: Map::new(),
        }
    }
}

/// Parses an object-valued key, setting aside entries `parse` rejects.
///
/// A missing key is an empty map. A key holding anything other than an
/// object is an error, since writing over it would destroy data.
pub(crate) fn parse_map<T>(
    key: &str,
    value: Option<Value>,
    parse: impl Fn(&Value) -> Option<T>,
) -> Result<StoredMap<T>, StoreError> {
    let Some(value) = value else {
        return Ok(StoredMap::default());
    };
    let entries = match value {
        Value::Object(entries) => entries,
        other => {
            return Err(StoreError::InvalidRecord {
                key: key.to_string(),
                message: format!("expected an object, found {}", json_type(&other)),
            });
        }
    };

    let mut map = StoredMap::default();
    for (domain, raw) in entries {
        match parse(&raw) {
            Some(v) => {
                map.parsed.insert(domain, v);
            }
            None => {
                tracing::warn!(key, %domain, value = %raw, "ignoring invalid stored entry");
                map.unreadable.insert(domain, raw);
            }
        }
    }
    Ok(map)
}

/// Serializes `map`, keeping `unreadable` entries for domains it lacks.
pub(crate) fn to_object<T: Serialize>(
    map: &BTreeMap<String, T>,
    unreadable: &Map<String, Value>,
) -> Value {
    let mut entries: Map<String, Value> = unreadable
        .iter()
        .filter(|(domain, _)| !map.contains_key(*domain))
        .map(|(domain, raw)| (domain.clone(), raw.clone()))
        .collect();
    entries.extend(
        map.iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v))),
    );
    Value::Object(entries)
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn ranked_orders_by_usage_then_name() {
        let record = UsageRecord {
            usage: BTreeMap::from([
                ("b.com".to_string(), 10),
                ("a.com".to_string(), 10),
                ("c.com".to_string(), 30),
            ]),
            usage_meta: BTreeMap::new(),
        };
        assert_eq!(
            record.ranked(),
            vec![("c.com", 30), ("a.com", 10), ("b.com", 10)]
        );
        assert_eq!(record.total_ms(), 50);
    }

    #[test]
    fn millis_accepts_js_numbers() {
        assert_eq!(as_millis(&json!(1500)), Some(1500));
        assert_eq!(as_millis(&json!(1500.4)), Some(1500));
        assert_eq!(as_millis(&json!(-3)), None);
        assert_eq!(as_millis(&json!("1500")), None);
    }

    #[test]
    fn parse_map_sets_bad_entries_aside() {
        let value = json!({"ok.com": 100, "bad.com": "x", "neg.com": -5});
        let map = parse_map("usage", Some(value), as_millis).unwrap();
        assert_eq!(map.parsed, BTreeMap::from([("ok.com".to_string(), 100)]));
        assert_eq!(
            Value::Object(map.unreadable),
            json!({"bad.com": "x", "neg.com": -5})
        );
    }

    #[test]
    fn to_object_keeps_unreadable_entries_it_does_not_replace() {
        let unreadable = json!({"bad.com": "x", "fixed.com": null});
        let Value::Object(unreadable) = unreadable else {
            unreachable!()
        };
        let map = BTreeMap::from([("fixed.com".to_string(), 7_u64)]);
        assert_eq!(
            to_object(&map, &unreadable),
            json!({"bad.com": "x", "fixed.com": 7})
        );
    }

    #[test]
    fn parse_map_rejects_non_objects() {
        let err = parse_map("usage", Some(json!([1, 2])), as_millis).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn missing_key_is_empty() {
        let map = parse_map("usage", None, as_millis).unwrap();
        assert!(map.parsed.is_empty());
        assert!(map.unreadable.is_empty());
    }

    #[test]
    fn goals_use_extension_field_names() {
        let goals: UserGoals =
            serde_json::from_value(json!({"socialLimit": 30, "workMinimum": null})).unwrap();
        assert_eq!(goals.social_limit, Some(30));
        assert_eq!(goals.work_minimum, None);
        assert!(goals.is_set());
    }
}
