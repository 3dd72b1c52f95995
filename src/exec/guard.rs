//! Deadline-bounded command execution.
//!
//! [`exec`] is the single entry point most callers need. One call goes
//! through these states:
//!
//! ```text
//! Dialing ──► DialFailed
//!    │
//!    ▼
//! Connected ──► Racing ──► Completed
//!                  └─────► TimedOut
//! ```
//!
//! ## The race
//!
//! Once connected, the command runs on its own tokio task and reports back
//! over a `oneshot` channel. The caller waits on that channel and on a
//! deadline timer with an unbiased `tokio::select!`: whichever fires first
//! decides the outcome and the other is dropped.
//!
//! The `oneshot` sender never blocks, so a result that arrives after the
//! deadline is simply discarded. On timeout the task is also cancelled
//! through a [`CancellationToken`], which closes the remote session so the
//! task exits promptly instead of running the command to completion. If the
//! `exec` future is itself dropped mid-race, a drop guard cancels the task
//! the same way.
//!
//! ## Connection ownership
//!
//! The connection belongs to exactly one call. It is shared with the task
//! through an `Arc` and closed before `exec` returns on every path. A failed
//! dial never produced a connection, so there is nothing to release.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use super::error::ExecError;
use super::transport::{Connection, SshTransport, Transport};
use super::types::{CommandOutput, ExecOutput, ExecRequest};

/// Run `command` on `address` as `username`, giving up after `timeout_secs`.
///
/// The same timeout bounds the TCP connect, the SSH handshake and the wait
/// for the command.
/// A command that exits nonzero returns `Ok` with that exit code.
pub async fn exec(
    address: &str,
    username: &str,
    password: &str,
    command: &str,
    timeout_secs: u64,
) -> Result<ExecOutput, ExecError> {
    let request = ExecRequest::new(
        address,
        username,
        password,
        command,
        Duration::from_secs(timeout_secs),
    );
    exec_request(&request).await
}

/// [`exec`] driven by a prepared [`ExecRequest`].
pub async fn exec_request(request: &ExecRequest) -> Result<ExecOutput, ExecError> {
    exec_with(&SshTransport, request).await
}

/// [`exec`] over an arbitrary [`Transport`].
pub async fn exec_with<T: Transport>(
    transport: &T,
    request: &ExecRequest,
) -> Result<ExecOutput, ExecError> {
    let exec_id = Uuid::new_v4();
    let span = info_span!(
        "exec",
        %exec_id,
        transport = transport.name(),
        address = %request.address,
        user = %request.username
    );

    async move {
        info!("Connecting with dial timeout {:?}", request.dial_timeout());

        let connection = match transport.dial(request).await {
            Ok(connection) => Arc::new(connection),
            Err(e) => {
                info!("Dial failed ({}): {}", e.kind(), e);
                return Err(e);
            }
        };

        let outcome = race(Arc::clone(&connection), &request.command, request.timeout).await;

        connection.close().await;
        debug!("Connection released");

        outcome.map(ExecOutput::from)
    }
    .instrument(span)
    .await
}

/// Run the command on a background task and wait for it or the deadline,
/// whichever comes first.
async fn race<C: Connection>(
    connection: Arc<C>,
    command: &str,
    timeout: Duration,
) -> Result<CommandOutput, ExecError> {
    let cancel = CancellationToken::new();
    let _abandon_guard = cancel.clone().drop_guard();

    let (result_tx, result_rx) = oneshot::channel();
    let task_cancel = cancel.clone();
    let task_command = command.to_string();

    tokio::spawn(
        async move {
            let result = connection.run(&task_command, &task_cancel).await;
            if result_tx.send(result).is_err() {
                debug!("Command finished after the deadline; result discarded");
            }
        }
        .in_current_span(),
    );

    tokio::select! {
        received = result_rx => match received {
            Ok(result) => result,
            Err(_) => Err(ExecError::TaskFailed(
                "command task ended without reporting a result".to_string(),
            )),
        },
        _ = tokio::time::sleep(timeout) => {
            info!("Command timed out after {:?}: {}", timeout, command);
            cancel.cancel();
            Err(ExecError::Timeout(timeout))
        }
    }
}
