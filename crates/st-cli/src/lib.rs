//! sitetime CLI library.
//!
//! Command implementations live here so they can be tested without
//! spawning the binary.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::{AiConfig, Config, TrackingConfig};
