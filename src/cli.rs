//! Command-line interface for ssh-exec.

use std::ffi::OsString;

use lexopt::prelude::*;
use thiserror::Error;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Server address, `host[:port]`.
    pub address: Option<String>,
    /// Command words, joined with spaces before being sent.
    pub command: Vec<String>,
    /// Login name (overrides environment).
    pub user: Option<String>,
    /// Overall timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// TCP connect timeout in seconds.
    pub dial_timeout_secs: Option<u64>,
    /// Print the outcome as JSON.
    pub json: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Errors from argument parsing.
#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("{0}")]
    Lexopt(#[from] lexopt::Error),

    #[error("invalid value for --{0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("missing server address")]
    MissingAddress,

    #[error("missing command")]
    MissingCommand,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
///
/// The first positional argument is the address. Everything after it is the
/// command, including words that look like options.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('u') | Long("user") => {
                result.user = Some(parser.value()?.parse()?);
            }
            Short('t') | Long("timeout") => {
                result.timeout_secs = Some(parse_secs(&mut parser, "timeout")?);
            }
            Long("dial-timeout") => {
                result.dial_timeout_secs = Some(parse_secs(&mut parser, "dial-timeout")?);
            }
            Long("json") => {
                result.json = true;
            }
            Value(val) => {
                result.address = Some(val.string()?);
                for word in parser.raw_args()? {
                    result.command.push(word.string()?);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.help || result.version {
        return Ok(result);
    }
    if result.address.is_none() {
        return Err(ArgsError::MissingAddress);
    }
    if result.command.is_empty() {
        return Err(ArgsError::MissingCommand);
    }

    Ok(result)
}

fn parse_secs(parser: &mut lexopt::Parser, name: &'static str) -> Result<u64, ArgsError> {
    let value: String = parser.value()?.parse()?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidValue(name, value))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"ssh-exec {version}
Run one command over SSH with a hard deadline

USAGE:
    ssh-exec [OPTIONS] <ADDRESS> <COMMAND>...

OPTIONS:
    -u, --user <NAME>          Login name
    -t, --timeout <SECS>       Overall timeout [default: 30]
        --dial-timeout <SECS>  TCP connect timeout [default: the overall timeout]
        --json                 Print the outcome as JSON
    -h, --help                 Print help
    -V, --version              Print version

ENVIRONMENT VARIABLES:
    SSH_EXEC_PASSWORD       Password (required)
    SSH_EXEC_USER           Login name (falls back to USER)
    SSH_EXEC_TIMEOUT        Overall timeout in seconds
    SSH_EXEC_DIAL_TIMEOUT   TCP connect timeout in seconds
    RUST_LOG                Log filter (logs go to stderr)

EXIT STATUS:
    The remote command's exit status, 124 on timeout, 255 on any other error.

EXAMPLES:
    SSH_EXEC_PASSWORD=secret ssh-exec -u deploy 10.0.0.5 uptime
    ssh-exec -t 5 --json build-host:2222 make test"#
    );
}

/// Print version.
pub fn print_version() {
    println!("ssh-exec {}", env!("CARGO_PKG_VERSION"));
}
