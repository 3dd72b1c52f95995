//! Error types and classification for remote command execution.
//!
//! Every failure surfaced by [`exec`](crate::exec::exec) is an [`ExecError`].
//! Callers that only care about the broad category use [`ExecError::kind`],
//! which maps each variant onto one of five [`ErrorKind`]s:
//!
//! 1. **Network**: no transport could be established (bad address, refused
//!    connection, DNS failure, dial timeout).
//! 2. **Authentication**: the TCP stream was up but the SSH handshake failed
//!    or the server rejected the password.
//! 3. **SessionSetup**: the connection was authenticated but the session
//!    channel, pseudo-terminal or exec request was refused.
//! 4. **Run**: the command was started but the run broke down before an exit
//!    status arrived.
//! 5. **Timeout**: the deadline elapsed first, either while the command ran
//!    or while the SSH handshake was stalled.
//!
//! A remote command that exits nonzero is *not* an error. Its status is
//! carried in the exit code of a successful result.
//!
//! Nothing here is retried. Each error is reported once, to the immediate
//! caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single execution attempt.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Connection to {address} timed out after {timeout:?}")]
    DialTimeout { address: String, timeout: Duration },

    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: russh::Error,
    },

    #[error("SSH handshake with {address} did not complete within {timeout:?}")]
    HandshakeTimeout { address: String, timeout: Duration },

    #[error("Password authentication failed for {username}: {source}")]
    Auth {
        username: String,
        #[source]
        source: russh::Error,
    },

    #[error("Authentication failed: server rejected the password for {username}")]
    AuthRejected { username: String },

    #[error("Failed to open session: {0}")]
    SessionOpen(#[source] russh::Error),

    #[error("request for pseudo terminal failed: {0}")]
    PtyRequest(#[source] russh::Error),

    #[error("request for pseudo terminal failed: {0}")]
    PtyRefused(String),

    #[error("Failed to execute command: {0}")]
    ExecRequest(#[source] russh::Error),

    #[error("Failed to execute command: server refused to start it")]
    ExecRefused,

    #[error("Command failed: {0}")]
    Run(String),

    #[error("Remote command exited without reporting an exit status")]
    ExitStatusMissing,

    #[error("Command was cancelled")]
    Cancelled,

    #[error("Command task failed: {0}")]
    TaskFailed(String),

    #[error("Command timed out after {} seconds", .0.as_secs_f64())]
    Timeout(Duration),
}

/// Broad category of an [`ExecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Authentication,
    SessionSetup,
    Run,
    Timeout,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Authentication => write!(f, "authentication"),
            ErrorKind::SessionSetup => write!(f, "session_setup"),
            ErrorKind::Run => write!(f, "run"),
            ErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

impl ExecError {
    /// Classify this error.
    ///
    /// A handshake failure counts as an authentication error even when the
    /// underlying cause is I/O: the TCP connection had already been made,
    /// so the dial itself succeeded.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::InvalidAddress { .. }
            | ExecError::DialTimeout { .. }
            | ExecError::Connect { .. } => ErrorKind::Network,
            ExecError::Handshake { .. } | ExecError::Auth { .. } | ExecError::AuthRejected { .. } => {
                ErrorKind::Authentication
            }
            ExecError::SessionOpen(_)
            | ExecError::PtyRequest(_)
            | ExecError::PtyRefused(_)
            | ExecError::ExecRequest(_)
            | ExecError::ExecRefused => ErrorKind::SessionSetup,
            ExecError::Run(_)
            | ExecError::ExitStatusMissing
            | ExecError::Cancelled
            | ExecError::TaskFailed(_) => ErrorKind::Run,
            ExecError::Timeout(_) | ExecError::HandshakeTimeout { .. } => ErrorKind::Timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Whether a russh error means the connection itself went away rather
    /// than the server refusing a request.
    pub(crate) fn is_connection_lost(error: &russh::Error) -> bool {
        matches!(
            error,
            russh::Error::IO(_)
                | russh::Error::Disconnect
                | russh::Error::HUP
                | russh::Error::ConnectionTimeout
        )
    }
}
