//! Request and result types for remote command execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ErrorKind, ExecError};

/// Everything needed for one execution attempt.
///
/// `timeout` bounds both the dial step and the wait for the command unless
/// an explicit dial timeout is set with [`ExecRequest::with_dial_timeout`].
#[derive(Clone)]
pub struct ExecRequest {
    pub address: String,
    pub username: String,
    pub password: String,
    pub command: String,
    pub timeout: Duration,
    dial_timeout: Option<Duration>,
}

impl ExecRequest {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        command: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
            command: command.into(),
            timeout,
            dial_timeout: None,
        }
    }

    /// Bound the TCP connect step separately from the command deadline.
    pub fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = Some(dial_timeout);
        self
    }

    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout.unwrap_or(self.timeout)
    }
}

impl std::fmt::Debug for ExecRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecRequest")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("command", &self.command)
            .field("timeout", &self.timeout)
            .field("dial_timeout", &self.dial_timeout())
            .finish()
    }
}

/// Raw result of a command that ran to completion.
///
/// A nonzero `exit_code` still means the command ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Decoded result handed back by [`exec`](crate::exec::exec).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl From<CommandOutput> for ExecOutput {
    fn from(output: CommandOutput) -> Self {
        Self {
            exit_code: output.exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Flat, serializable view of one call's outcome.
///
/// Exit code and output are left at their defaults whenever `error` is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExecReport {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub timed_out: bool,
}

impl From<&Result<ExecOutput, ExecError>> for ExecReport {
    fn from(result: &Result<ExecOutput, ExecError>) -> Self {
        match result {
            Ok(output) => Self {
                exit_code: output.exit_code,
                stdout: output.stdout.clone(),
                stderr: output.stderr.clone(),
                error: None,
                error_kind: None,
                timed_out: false,
            },
            Err(e) => Self {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
                timed_out: e.is_timeout(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod exec_request {
        use super::*;

        #[test]
        fn test_dial_timeout_defaults_to_timeout() {
            let req = ExecRequest::new("host:22", "user", "pw", "true", Duration::from_secs(7));
            assert_eq!(req.dial_timeout(), Duration::from_secs(7));
        }

        #[test]
        fn test_explicit_dial_timeout() {
            let req = ExecRequest::new("host:22", "user", "pw", "true", Duration::from_secs(60))
                .with_dial_timeout(Duration::from_secs(3));
            assert_eq!(req.dial_timeout(), Duration::from_secs(3));
            assert_eq!(req.timeout, Duration::from_secs(60));
        }

        #[test]
        fn test_debug_redacts_password() {
            let req = ExecRequest::new("host:22", "user", "hunter2", "id", Duration::from_secs(1));
            let debug = format!("{:?}", req);
            assert!(!debug.contains("hunter2"));
            assert!(debug.contains("<redacted>"));
        }
    }

    mod outputs {
        use super::*;

        #[test]
        fn test_command_output_success() {
            let ok = CommandOutput::default();
            let failed = CommandOutput {
                exit_code: 7,
                ..Default::default()
            };
            assert!(ok.success());
            assert!(!failed.success());
        }

        #[test]
        fn test_exec_output_from_bytes() {
            let output = CommandOutput {
                exit_code: 0,
                stdout: b"hello\n".to_vec(),
                stderr: Vec::new(),
            };
            let decoded = ExecOutput::from(output);
            assert_eq!(decoded.stdout, "hello\n");
            assert_eq!(decoded.stderr, "");
        }

        #[test]
        fn test_exec_output_lossy_decode() {
            let output = CommandOutput {
                exit_code: 0,
                stdout: vec![0x66, 0xff, 0x6f],
                stderr: Vec::new(),
            };
            let decoded = ExecOutput::from(output);
            assert_eq!(decoded.stdout, "f\u{fffd}o");
        }
    }

    mod report {
        use super::*;

        #[test]
        fn test_report_from_success() {
            let result: Result<ExecOutput, ExecError> = Ok(ExecOutput {
                exit_code: 7,
                stdout: "out".to_string(),
                stderr: "err".to_string(),
            });
            let report = ExecReport::from(&result);
            assert_eq!(report.exit_code, 7);
            assert!(report.error.is_none());
            assert!(!report.timed_out);
        }

        #[test]
        fn test_report_from_timeout() {
            let result: Result<ExecOutput, ExecError> =
                Err(ExecError::Timeout(Duration::from_secs(1)));
            let report = ExecReport::from(&result);
            assert_eq!(report.exit_code, 0);
            assert!(report.stdout.is_empty());
            assert!(report.timed_out);
            assert_eq!(report.error_kind, Some(ErrorKind::Timeout));
        }

        #[test]
        fn test_report_from_stalled_handshake() {
            let result: Result<ExecOutput, ExecError> = Err(ExecError::HandshakeTimeout {
                address: "10.0.0.5:22".to_string(),
                timeout: Duration::from_secs(1),
            });
            let report = ExecReport::from(&result);
            assert!(report.timed_out);
            assert_eq!(report.error_kind, Some(ErrorKind::Timeout));
        }

        #[test]
        fn test_report_skips_empty_error_fields() {
            let result: Result<ExecOutput, ExecError> = Ok(ExecOutput::default());
            let json = serde_json::to_string(&ExecReport::from(&result)).unwrap();
            assert!(!json.contains("error"));
            assert!(json.contains("\"timed_out\":false"));
        }
    }
}
