//! alpha-scanner: concurrent crypto pair scanner.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod indicators;
pub mod scoring;
pub mod market;
pub mod engine;
pub mod dashboard;
