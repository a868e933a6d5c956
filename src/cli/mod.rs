//! Command-line interface handlers.
//!
//! Each subcommand gets its own module; `main.rs` only parses arguments and
//! dispatches here.

pub mod cache;
pub mod prioritize;
