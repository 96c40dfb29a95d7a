//! Command-line administration for Keystash.
//!
//! The binary lives in `main.rs`; the modules are exposed here so the
//! configuration loader can be tested from `tests/`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod output;
