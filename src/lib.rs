//! por-runner: periodic proof-of-reserves runner.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod datasource;
pub mod params;
pub mod client;
pub mod withdraw;
pub mod scheduler;
pub mod storage;
pub mod engine;
pub mod preview;
pub mod dashboard;
