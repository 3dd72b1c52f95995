//! Running one command on an authenticated connection.
//!
//! Each run opens exactly one session channel, requests a non-interactive
//! pseudo-terminal, executes the command and buffers everything it writes
//! until the server reports an exit status. The channel is closed before
//! [`run_command`] returns, whatever the outcome.

use russh::client::Msg;
use russh::{Channel, ChannelMsg, Pty, Sig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::SshConnection;
use super::error::ExecError;
use super::types::CommandOutput;

/// Fixed pseudo-terminal settings requested for every session.
#[derive(Debug, Clone, Copy)]
pub struct TerminalModes {
    pub term: &'static str,
    pub columns: u32,
    pub rows: u32,
    pub modes: &'static [(Pty, u32)],
}

/// Echo off, 14.4 kbaud in both directions.
pub const TERMINAL_MODES: TerminalModes = TerminalModes {
    term: "xterm",
    columns: 80,
    rows: 40,
    modes: &[
        (Pty::ECHO, 0),
        (Pty::TTY_OP_ISPEED, 14400),
        (Pty::TTY_OP_OSPEED, 14400),
    ],
};

/// Extended data stream number carrying stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// In-memory sinks for the command's output streams.
#[derive(Debug, Default)]
pub(crate) struct OutputBuffer {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl OutputBuffer {
    pub fn with_capacity(stdout_cap: usize, stderr_cap: usize) -> Self {
        Self {
            stdout: Vec::with_capacity(stdout_cap),
            stderr: Vec::with_capacity(stderr_cap),
        }
    }

    fn into_output(self, exit_code: i32) -> CommandOutput {
        CommandOutput {
            exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Exit code reported for a process killed by `signal`: 128 plus the signal
/// number, or plain 128 when the signal has no standard number.
pub(crate) fn signal_exit_code(signal: &Sig) -> i32 {
    let number = match signal {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        _ => 0,
    };
    128 + number
}

/// Run `command` on `connection` and collect its output.
///
/// A nonzero exit status is returned as `Ok` with that exit code. Errors are
/// reserved for runs that could not be set up or that broke down before the
/// server reported how the command ended. Cancelling `cancel` closes the
/// channel and returns [`ExecError::Cancelled`].
pub async fn run_command(
    connection: &SshConnection,
    command: &str,
    cancel: &CancellationToken,
) -> Result<CommandOutput, ExecError> {
    let mut channel = tokio::select! {
        biased;

        _ = cancel.cancelled() => return Err(ExecError::Cancelled),

        opened = connection.handle().channel_open_session() => {
            opened.map_err(ExecError::SessionOpen)?
        }
    };

    let result = tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!("Command cancelled on {}: {}", connection.address(), command);
            Err(ExecError::Cancelled)
        }

        result = drive_session(&mut channel, command) => result,
    };

    if let Err(e) = channel.close().await {
        debug!("Error closing session channel: {}", e);
    }

    if let Ok(output) = &result {
        info!(
            "Command exited with status {} ({} bytes stdout, {} bytes stderr)",
            output.exit_code,
            output.stdout.len(),
            output.stderr.len()
        );
    }

    result
}

/// Request the pseudo-terminal, start the command and read until it ends.
async fn drive_session(
    channel: &mut Channel<Msg>,
    command: &str,
) -> Result<CommandOutput, ExecError> {
    channel
        .request_pty(
            true,
            TERMINAL_MODES.term,
            TERMINAL_MODES.columns,
            TERMINAL_MODES.rows,
            0,
            0,
            TERMINAL_MODES.modes,
        )
        .await
        .map_err(ExecError::PtyRequest)?;

    await_pty_reply(channel).await?;

    channel.exec(true, command).await.map_err(|e| {
        if ExecError::is_connection_lost(&e) {
            ExecError::Run(format!("connection lost: {}", e))
        } else {
            ExecError::ExecRequest(e)
        }
    })?;

    collect_output(channel).await
}

/// Wait for the server to accept or refuse the pseudo-terminal request.
async fn await_pty_reply(channel: &mut Channel<Msg>) -> Result<(), ExecError> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => {
                return Err(ExecError::PtyRefused("server refused the request".to_string()));
            }
            Some(ChannelMsg::Close) | None => {
                return Err(ExecError::PtyRefused(
                    "channel closed before the server replied".to_string(),
                ));
            }
            Some(_) => {}
        }
    }
}

/// Buffer channel output until the command's exit status is known and the
/// server has finished sending.
async fn collect_output(channel: &mut Channel<Msg>) -> Result<CommandOutput, ExecError> {
    let mut buffer = OutputBuffer::with_capacity(4096, 1024);
    let mut exit_code: Option<i32> = None;
    let mut started = false;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                buffer.stdout.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                if ext == SSH_EXTENDED_DATA_STDERR {
                    buffer.stderr.extend_from_slice(&data);
                }
            }
            Some(ChannelMsg::Success) => {
                started = true;
            }
            Some(ChannelMsg::Failure) if !started && exit_code.is_none() => {
                return Err(ExecError::ExecRefused);
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = Some(exit_status as i32);
            }
            Some(ChannelMsg::ExitSignal {
                signal_name,
                error_message,
                ..
            }) => {
                debug!("Command killed by signal {:?}: {}", signal_name, error_message);
                exit_code = Some(signal_exit_code(&signal_name));
            }
            Some(ChannelMsg::Eof) => {
                // Exit status may still follow EOF
                if exit_code.is_some() {
                    break;
                }
            }
            Some(ChannelMsg::Close) => {
                break;
            }
            Some(_) => {}
            None => {
                if exit_code.is_none() {
                    return Err(ExecError::Run(
                        "connection closed before the command completed".to_string(),
                    ));
                }
                break;
            }
        }
    }

    match exit_code {
        Some(code) => Ok(buffer.into_output(code)),
        None => Err(ExecError::ExitStatusMissing),
    }
}
