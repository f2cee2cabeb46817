//! Core tracking logic for sitetime.
//!
//! This crate contains:
//! - URL classification: which pages count and under which domain
//! - The session controller: a single-active-session state machine
//! - The event adapter: browser lifecycle events to controller calls
//! - The tracker: controller plus a durable [`UsageWriter`]
//! - Site categories used by reports and digests

mod adapter;
pub mod category;
pub mod classify;
pub mod event;
pub mod session;
mod tracker;
pub mod types;

pub use adapter::{Action, action_for};
pub use category::{Category, CategoryTotals};
pub use classify::{UrlClassifier, domain_of, is_trackable};
pub use event::{IdleState, LifecycleEvent, Tab};
pub use session::{
    Commit, DEFAULT_MAX_SESSION_MS, DEFAULT_MIN_SESSION_MS, Session, SessionController,
    SessionEnd, SessionPolicy,
};
pub use tracker::{Tracker, UsageWriter};
pub use types::{Domain, TabId, ValidationError};
