//! Stable exit codes for the `orchestrator` and `scoring` binaries.

/// Run finished (source exhausted or repeat guard tripped), or command succeeded.
pub const OK: i32 = 0;
/// Fatal error: invalid configuration, I/O failure, source or sandbox error.
pub const FAILED: i32 = 1;
/// Invalid command-line usage (reported by clap).
pub const USAGE: i32 = 2;
