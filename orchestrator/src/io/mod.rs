//! Side-effecting operations: configuration, processes, and run files.

pub mod config;
pub mod context;
pub mod event_log;
pub mod process;
pub mod run_dir;
pub mod run_meta;
pub mod sandbox;
