//! Maps lifecycle events onto session controller calls.

use crate::event::{LifecycleEvent, Tab};
use crate::types::TabId;

/// The controller call a lifecycle event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    /// Track this tab, ending whatever was tracked before.
    Start(&'a Tab),
    /// End the active session and persist its time.
    End,
    /// End the active session if it is bound to this tab.
    EndTab(TabId),
    /// Nothing to do.
    Ignore,
}

/// Returns the controller call for `event`.
///
/// In-place navigations re-evaluate the tab even when the domain is
/// unchanged; the controller treats the identical `(domain, tab)` case as a
/// no-op.
pub const fn action_for(event: &LifecycleEvent) -> Action<'_> {
    match event {
        LifecycleEvent::TabActivated { tab } => Action::Start(tab),
        LifecycleEvent::TabUpdated { tab, changed_url } => {
            if tab.active && changed_url.is_some() {
                Action::Start(tab)
            } else {
                Action::Ignore
            }
        }
        LifecycleEvent::FocusGained { tab } | LifecycleEvent::IdleExited { tab } => match tab {
            Some(tab) => Action::Start(tab),
            None => Action::Ignore,
        },
        LifecycleEvent::FocusLost | LifecycleEvent::IdleEntered { .. } | LifecycleEvent::Suspend => {
            Action::End
        }
        LifecycleEvent::TabClosed { tab_id } => Action::EndTab(*tab_id),
    }
}
