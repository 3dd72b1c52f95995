//! Configuration resolution for ssh-exec.
//!
//! Values resolve with a three-tier priority:
//!
//! 1. **Parameter** - explicitly provided value (highest priority)
//! 2. **Environment Variable** - value from the environment
//! 3. **Default** - built-in default (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_EXEC_TIMEOUT` | 30s | Overall timeout in seconds |
//! | `SSH_EXEC_DIAL_TIMEOUT` | overall timeout | TCP connect timeout in seconds |
//! | `SSH_EXEC_USER` | `$USER` | Login name |
//! | `SSH_EXEC_PASSWORD` | none | Password |

use std::env;

/// Default overall timeout in seconds
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable name for the overall timeout
pub(crate) const TIMEOUT_ENV_VAR: &str = "SSH_EXEC_TIMEOUT";

/// Environment variable name for the dial timeout
pub(crate) const DIAL_TIMEOUT_ENV_VAR: &str = "SSH_EXEC_DIAL_TIMEOUT";

/// Environment variable name for the login name
pub(crate) const USER_ENV_VAR: &str = "SSH_EXEC_USER";

/// Environment variable name for the password
pub(crate) const PASSWORD_ENV_VAR: &str = "SSH_EXEC_PASSWORD";

/// Fallback for the login name when `SSH_EXEC_USER` is unset
pub(crate) const SYSTEM_USER_ENV_VAR: &str = "USER";

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve the overall timeout with priority: parameter -> env var -> default
pub fn resolve_timeout(timeout_param: Option<u64>) -> u64 {
    timeout_param
        .or_else(|| env_u64(TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Resolve the dial timeout with priority: parameter -> env var -> overall timeout
pub fn resolve_dial_timeout(dial_timeout_param: Option<u64>, timeout: u64) -> u64 {
    dial_timeout_param
        .or_else(|| env_u64(DIAL_TIMEOUT_ENV_VAR))
        .unwrap_or(timeout)
}

/// Resolve the login name with priority: parameter -> `SSH_EXEC_USER` -> `USER`
pub fn resolve_username(user_param: Option<String>) -> Option<String> {
    user_param
        .filter(|u| !u.is_empty())
        .or_else(|| env_non_empty(USER_ENV_VAR))
        .or_else(|| env_non_empty(SYSTEM_USER_ENV_VAR))
}

/// Resolve the password from `SSH_EXEC_PASSWORD`.
///
/// There is no command-line flag for it so it never shows up in process
/// listings.
pub fn resolve_password() -> Option<String> {
    env::var(PASSWORD_ENV_VAR).ok()
}
