// src/cli/handlers/commons.rs

use anyhow::{Result, anyhow};
use thiserror::Error;

use crate::core::config::ShellConfig;
use crate::system::executor::CallOptions;
use crate::system::shell::Shell;

/// What every handler gets besides its own arguments.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    /// The shell all operations go through.
    pub shell: &'a Shell,
    /// The configuration in effect.
    pub config: &'a ShellConfig,
}

/// A command ran to completion with a non-zero status that the user chose
/// not to treat as a failure. The binary exits with the same status, silently.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("command exited with status {0}")]
pub struct ExitStatus(pub i32);

/// Splits a `KEY=VALUE` argument.
pub fn parse_key_value(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(anyhow!(t!("common.error.invalid_key_value"), value = raw)),
    }
}

/// Adds `KEY=VALUE` environment assignments to `options`.
pub fn with_env(mut options: CallOptions, assignments: &[String]) -> Result<CallOptions> {
    for raw in assignments {
        let (key, value) = parse_key_value(raw)?;
        options = options.env(key, value);
    }
    Ok(options)
}

/// Turns a status the user asked us to tolerate into the binary's exit status.
pub fn exit_with(code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(ExitStatus(code).into())
    }
}
