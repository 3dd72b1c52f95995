#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! Run one shell command on a remote host over SSH, with password
//! authentication, a pseudo-terminal, captured output and a hard deadline.
//!
//! ```no_run
//! # async fn demo() -> Result<(), ssh_exec::exec::ExecError> {
//! let output = ssh_exec::exec::exec("10.0.0.5:22", "deploy", "secret", "uptime", 5).await?;
//! println!("{} -> {}", output.exit_code, output.stdout);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod exec;
