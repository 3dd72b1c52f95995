//! SSH connection establishment with password authentication.
//!
//! ## Dial sequence
//!
//! 1. **Address parsing**: `host:port`, bare `host` (port 22), or a bracketed
//!    IPv6 literal such as `[::1]:2222`.
//! 2. **TCP connect**: bounded by the dial timeout.
//! 3. **Handshake**: russh key exchange over the established stream.
//! 4. **Password authentication**: a single attempt, never retried.
//!
//! Steps 3 and 4 share one deadline of their own, so a peer that accepts
//! the TCP connection and then goes silent cannot hold the dial open.
//!
//! Failures in steps 1 and 2 are network errors, failures in steps 3 and 4
//! are authentication errors, and a stalled handshake is a timeout. See
//! [`ErrorKind`](super::error::ErrorKind).

use std::sync::Arc;
use std::time::Duration;

use russh::{Disconnect, client, keys};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::error::ExecError;

/// Default SSH port used when the address carries none.
pub(crate) const DEFAULT_SSH_PORT: u16 = 22;

/// Interval between keepalive requests on an idle connection.
pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Unanswered keepalives tolerated before the connection is dropped.
pub(crate) const KEEPALIVE_MAX: usize = 3;

/// Slack added to the caller's deadline before russh drops an idle
/// connection on its own. The caller's deadline always fires first.
pub(crate) const INACTIVITY_GRACE: Duration = Duration::from_secs(5);

/// Time limits applied while establishing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DialLimits {
    /// TCP connect.
    pub connect: Duration,
    /// SSH handshake plus password authentication.
    pub handshake: Duration,
    /// russh inactivity timeout for the lifetime of the connection.
    pub inactivity: Option<Duration>,
}

impl DialLimits {
    /// Limits for a standalone dial: `dial_timeout` bounds both the connect
    /// and the handshake, and an idle connection is kept open.
    pub fn standalone(dial_timeout: Duration) -> Self {
        Self {
            connect: dial_timeout,
            handshake: dial_timeout,
            inactivity: None,
        }
    }

    /// Limits for a connection owned by one deadline-bounded execution.
    pub fn for_execution(dial_timeout: Duration, timeout: Duration) -> Self {
        Self {
            connect: dial_timeout,
            handshake: timeout,
            inactivity: Some(timeout + INACTIVITY_GRACE),
        }
    }
}

/// Client handler that accepts every server host key.
///
/// Equivalent to `StrictHostKeyChecking=no`.
pub struct ExecClientHandler;

impl client::Handler for ExecClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Accepting {} host key without verification",
            server_public_key.algorithm().as_str()
        );
        Ok(true)
    }
}

/// An authenticated connection to one SSH server.
///
/// Owned by exactly one execution. Close it with
/// [`SshConnection::disconnect`] once the command is done.
pub struct SshConnection {
    handle: client::Handle<ExecClientHandler>,
    address: String,
}

impl SshConnection {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn handle(&self) -> &client::Handle<ExecClientHandler> {
        &self.handle
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Disconnect from the server. Errors are logged, not returned: there is
    /// nothing left for the caller to do with a connection that failed to
    /// close.
    pub async fn disconnect(&self) {
        if self.handle.is_closed() {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!("Error during disconnect from {}: {}", self.address, e);
        }
    }
}

/// Build the russh client configuration.
///
/// Keepalives detect a peer that has gone away. The inactivity timeout, when
/// set, sits past the caller's deadline and only reaps connections nobody is
/// waiting on anymore.
pub(crate) fn build_client_config(inactivity: Option<Duration>) -> Arc<client::Config> {
    Arc::new(client::Config {
        inactivity_timeout: inactivity,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: KEEPALIVE_MAX,
        ..Default::default()
    })
}

/// Split an address into host and port.
///
/// A bracketed IPv6 literal is split at the closing bracket, so `[::1]` and
/// `[::1]:22` both work. An unbracketed IPv6 literal is taken whole, with the
/// default port.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), ExecError> {
    let invalid = |reason: String| ExecError::InvalidAddress {
        address: address.to_string(),
        reason,
    };
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|e| invalid(format!("Invalid port number: {}", e)))
    };

    if address.is_empty() {
        return Err(invalid("address is empty".to_string()));
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| invalid("missing closing bracket".to_string()))?;
        let port = match after {
            "" => DEFAULT_SSH_PORT,
            _ => match after.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None => {
                    return Err(invalid(format!(
                        "unexpected text after closing bracket: {}",
                        after
                    )));
                }
            },
        };
        (host, port)
    } else if address.matches(':').count() > 1 {
        (address, DEFAULT_SSH_PORT)
    } else {
        match address.split_once(':') {
            Some((host, port)) => (host, parse_port(port)?),
            None => (address, DEFAULT_SSH_PORT),
        }
    };

    if host.is_empty() {
        return Err(invalid("host is empty".to_string()));
    }

    Ok((host.to_string(), port))
}

/// Connect to `address` and authenticate as `username` with `password`.
///
/// `dial_timeout` bounds the TCP connect, and separately the handshake and
/// authentication that follow it. Once connected, the connection stays open
/// however long it sits idle; closing it is the caller's job.
pub async fn dial_with_password(
    address: &str,
    username: &str,
    password: &str,
    dial_timeout: Duration,
) -> Result<SshConnection, ExecError> {
    dial(address, username, password, DialLimits::standalone(dial_timeout)).await
}

pub(crate) async fn dial(
    address: &str,
    username: &str,
    password: &str,
    limits: DialLimits,
) -> Result<SshConnection, ExecError> {
    let (host, port) = parse_address(address)?;

    let stream = tokio::time::timeout(limits.connect, TcpStream::connect((host.as_str(), port)))
        .await
        .map_err(|_| ExecError::DialTimeout {
            address: address.to_string(),
            timeout: limits.connect,
        })?
        .map_err(|source| ExecError::Connect {
            address: address.to_string(),
            source,
        })?;

    debug!("TCP connection to {} established", address);

    let handle = tokio::time::timeout(
        limits.handshake,
        handshake(address, username, password, stream, limits.inactivity),
    )
    .await
    .map_err(|_| {
        info!("SSH handshake with {} stalled", address);
        ExecError::HandshakeTimeout {
            address: address.to_string(),
            timeout: limits.handshake,
        }
    })??;

    info!("Authenticated as {}@{}", username, address);

    Ok(SshConnection {
        handle,
        address: address.to_string(),
    })
}

/// Key exchange and a single password attempt over an established stream.
async fn handshake(
    address: &str,
    username: &str,
    password: &str,
    stream: TcpStream,
    inactivity: Option<Duration>,
) -> Result<client::Handle<ExecClientHandler>, ExecError> {
    let mut handle = client::connect_stream(build_client_config(inactivity), stream, ExecClientHandler)
        .await
        .map_err(|source| ExecError::Handshake {
            address: address.to_string(),
            source,
        })?;

    let auth = handle
        .authenticate_password(username, password)
        .await
        .map_err(|source| ExecError::Auth {
            username: username.to_string(),
            source,
        })?;

    if !auth.success() {
        info!("Password rejected for {}@{}", username, address);
        let _ = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
        return Err(ExecError::AuthRejected {
            username: username.to_string(),
        });
    }

    Ok(handle)
}
