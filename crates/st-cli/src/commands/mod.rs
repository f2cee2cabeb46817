//! CLI subcommand implementations.

pub mod cleanup;
pub mod digest;
pub mod export;
pub mod migrate;
pub mod report;
pub mod reset;
pub mod run;
pub mod status;
mod util;
