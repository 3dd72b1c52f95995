#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use dotenv::dotenv;

use ssh_exec::cli::{self, Args};
use ssh_exec::exec::{self, ExecError, ExecOutput, ExecReport, ExecRequest, config};

/// Exit status when the deadline elapsed, as timeout(1) uses.
const TIMEOUT_EXIT_STATUS: u8 = 124;

/// Exit status for every other local or connection failure, as ssh(1) uses.
const ERROR_EXIT_STATUS: u8 = 255;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    // Logs go to stderr so they never mix with the remote command's stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("ssh-exec: {}", e);
            eprintln!("Try 'ssh-exec --help' for more information.");
            return ExitCode::from(ERROR_EXIT_STATUS);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let request = match build_request(&args) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("ssh-exec: {}", message);
            return ExitCode::from(ERROR_EXIT_STATUS);
        }
    };

    let result = exec::exec_request(&request).await;

    let printed = if args.json {
        write_json(&result, &mut io::stdout().lock())
    } else {
        write_plain(&result, &mut io::stdout().lock(), &mut io::stderr().lock())
    };

    match printed {
        Ok(()) => ExitCode::from(exit_status(&result)),
        Err(e) => {
            // stderr may be the stream that failed
            let _ = writeln!(io::stderr(), "ssh-exec: failed to write output: {}", e);
            ExitCode::from(ERROR_EXIT_STATUS)
        }
    }
}

fn build_request(args: &Args) -> Result<ExecRequest, String> {
    let address = args.address.clone().ok_or("missing server address")?;
    let username = config::resolve_username(args.user.clone())
        .ok_or("no login name: pass --user or set SSH_EXEC_USER")?;
    let password = config::resolve_password().ok_or("SSH_EXEC_PASSWORD is not set")?;

    let timeout = config::resolve_timeout(args.timeout_secs);
    let dial_timeout = config::resolve_dial_timeout(args.dial_timeout_secs, timeout);

    Ok(ExecRequest::new(
        address,
        username,
        password,
        args.command_line(),
        Duration::from_secs(timeout),
    )
    .with_dial_timeout(Duration::from_secs(dial_timeout)))
}

/// Copy the command's streams through, or report the error once on `err`.
fn write_plain(
    result: &Result<ExecOutput, ExecError>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    match result {
        Ok(output) => {
            out.write_all(output.stdout.as_bytes())?;
            out.flush()?;
            err.write_all(output.stderr.as_bytes())?;
            err.flush()
        }
        Err(e) => {
            writeln!(err, "ssh-exec: {}", e)?;
            err.flush()
        }
    }
}

fn write_json(result: &Result<ExecOutput, ExecError>, out: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(&ExecReport::from(result))?;
    writeln!(out, "{}", json)?;
    out.flush()
}

fn exit_status(result: &Result<ExecOutput, ExecError>) -> u8 {
    match result {
        Ok(output) => u8::try_from(output.exit_code).unwrap_or(ERROR_EXIT_STATUS),
        Err(e) if e.is_timeout() => TIMEOUT_EXIT_STATUS,
        Err(_) => ERROR_EXIT_STATUS,
    }
}
