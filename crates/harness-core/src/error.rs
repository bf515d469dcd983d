//! Error type shared by the harness crates.
//!
//! The gateway treats every variant identically (one log line, one fixed
//! user-facing reply); the variants exist so callers and tests can inspect
//! the underlying cause without parsing message text. Malformed shapes
//! inside an otherwise successful stream are not errors at all; they are
//! skipped at the parsing layer.

use thiserror::Error;

/// Convenience alias used across the harness crates.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Failure of a single agent invocation.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Network-level failure reaching the agent endpoint (DNS, connect,
    /// broken stream). Covers authentication and throttling too when the
    /// transport surfaces them before a status line.
    #[error("transport error: {0}")]
    Transport(String),
    /// The agent service answered with a non-success status.
    #[error("agent service returned status {status}: {message}")]
    Service { status: u16, message: String },
}

impl HarnessError {
    /// Transport failure from any displayable cause.
    pub fn transport(cause: impl ToString) -> Self {
        HarnessError::Transport(cause.to_string())
    }
}
