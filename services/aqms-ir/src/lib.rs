//! AQMS inventory loader service.
//!
//! Command-line front end over the `ingestion` crate: argument parsing,
//! configuration and command dispatch. The binary in `main.rs` only sets
//! up logging and maps errors to exit codes.

pub mod cli;
pub mod commands;
pub mod config;
