//! Transport abstraction used by the execution guard.
//!
//! The guard only needs two capabilities from the SSH layer: establish an
//! authenticated connection, and run one command on it. Both are expressed
//! as async traits so the guard can be driven by something other than a
//! live server.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::client::{DialLimits, SshConnection, dial};
use super::error::ExecError;
use super::runner::run_command;
use super::types::{CommandOutput, ExecRequest};

/// A live, authenticated connection.
///
/// Implementations must be thread-safe (`Send + Sync`) and `'static`: the
/// command runs on a spawned task that shares the connection with the guard.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Run one command to completion, or until `cancel` fires.
    async fn run(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError>;

    /// Release the connection. Must be safe to call while a run is still
    /// winding down on another task.
    async fn close(&self);
}

/// Something that can produce a [`Connection`] for a request.
#[async_trait]
pub trait Transport: Send + Sync {
    type Conn: Connection;

    async fn dial(&self, request: &ExecRequest) -> Result<Self::Conn, ExecError>;

    /// Get the name of this transport.
    ///
    /// Used for logging and debugging purposes.
    fn name(&self) -> &'static str;
}

/// Password-authenticated SSH over russh.
///
/// The handshake is bounded by the request's overall timeout, and the
/// connection's inactivity timeout sits just past it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshTransport;

#[async_trait]
impl Transport for SshTransport {
    type Conn = SshConnection;

    async fn dial(&self, request: &ExecRequest) -> Result<SshConnection, ExecError> {
        dial(
            &request.address,
            &request.username,
            &request.password,
            DialLimits::for_execution(request.dial_timeout(), request.timeout),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}

#[async_trait]
impl Connection for SshConnection {
    async fn run(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        run_command(self, command, cancel).await
    }

    async fn close(&self) {
        self.disconnect().await;
    }
}
