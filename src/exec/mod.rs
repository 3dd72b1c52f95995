//! Single-shot remote command execution over SSH.
//!
//! This module is organized into the following submodules:
//!
//! - `client`: TCP dial, SSH handshake and password authentication
//! - `runner`: one session per command, PTY request and output collection
//! - `guard`: the deadline race that bounds a whole execution
//! - `transport`: traits separating the guard from the SSH layer
//! - `config`: parameter/environment/default resolution
//! - `error`: error type and classification
//! - `types`: request and result types

pub(crate) mod client;
pub mod config;
pub(crate) mod error;
pub(crate) mod guard;
pub(crate) mod runner;
pub(crate) mod transport;
pub(crate) mod types;

pub use client::{ExecClientHandler, SshConnection, dial_with_password};
pub use error::{ErrorKind, ExecError};
pub use guard::{exec, exec_request, exec_with};
pub use runner::{TERMINAL_MODES, TerminalModes, run_command};
pub use transport::{Connection, SshTransport, Transport};
pub use types::{CommandOutput, ExecOutput, ExecReport, ExecRequest};
