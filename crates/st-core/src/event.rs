//! Browser lifecycle events fed into the tracker.

use serde::{Deserialize, Serialize};

use crate::types::TabId;

/// A browser tab as reported by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    /// Tabs that are still loading, or that the extension may not inspect,
    /// have no URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl Tab {
    /// Creates an active tab showing `url`.
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id: TabId(id),
            url: Some(url.into()),
            active: true,
        }
    }
}

/// Why the user stopped interacting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    #[default]
    Idle,
    Locked,
}

/// A browser lifecycle signal.
///
/// The feed is unreliable: events may be dropped, duplicated or reordered.
/// Serialized as one JSON object per line with a `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The active tab of the focused window changed.
    TabActivated { tab: Tab },
    /// A tab was updated; `changed_url` is set when it navigated in place.
    TabUpdated {
        tab: Tab,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        changed_url: Option<String>,
    },
    /// No browser window has focus any more.
    FocusLost,
    /// A browser window gained focus; `tab` is its active tab, if known.
    FocusGained {
        #[serde(default)]
        tab: Option<Tab>,
    },
    /// The system reported idle or a locked screen.
    IdleEntered {
        #[serde(default)]
        state: IdleState,
    },
    /// The user is active again; `tab` is the current tab, if known.
    IdleExited {
        #[serde(default)]
        tab: Option<Tab>,
    },
    /// A tab was closed.
    TabClosed { tab_id: TabId },
    /// The process is about to be suspended or shut down.
    Suspend,
}

impl LifecycleEvent {
    /// Short name used in log lines.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TabActivated { .. } => "tab_activated",
            Self::TabUpdated { .. } => "tab_updated",
            Self::FocusLost => "focus_lost",
            Self::FocusGained { .. } => "focus_gained",
            Self::IdleEntered { .. } => "idle_entered",
            Self::IdleExited { .. } => "idle_exited",
            Self::TabClosed { .. } => "tab_closed",
            Self::Suspend => "suspend",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_json_lines() {
        let event: LifecycleEvent = serde_json::from_str(
            r#"{"type":"tab_activated","tab":{"id":7,"url":"https://example.com/"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            LifecycleEvent::TabActivated {
                tab: Tab::new(7, "https://example.com/"),
            }
        );

        let event: LifecycleEvent =
            serde_json::from_str(r#"{"type":"idle_entered","state":"locked"}"#).unwrap();
        assert_eq!(
            event,
            LifecycleEvent::IdleEntered {
                state: IdleState::Locked
            }
        );
    }

    #[test]
    fn optional_fields_default() {
        let event: LifecycleEvent = serde_json::from_str(r#"{"type":"focus_gained"}"#).unwrap();
        assert_eq!(event, LifecycleEvent::FocusGained { tab: None });

        let event: LifecycleEvent = serde_json::from_str(r#"{"type":"idle_entered"}"#).unwrap();
        assert_eq!(
            event,
            LifecycleEvent::IdleEntered {
                state: IdleState::Idle
            }
        );
    }

    #[test]
    fn rejects_unknown_event_types() {
        let parsed: Result<LifecycleEvent, _> =
            serde_json::from_str(r#"{"type":"window_resized"}"#);
        assert!(parsed.is_err());
    }
}
