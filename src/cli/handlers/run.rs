// src/cli/handlers/run.rs

use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};

use crate::cli::args::CallArgs;
use crate::cli::handlers::commons::{self, HandlerContext};
use crate::system::executor::CallOptions;

/// Builds the runner options from the parsed flags.
fn call_options(args: &CallArgs) -> Result<CallOptions> {
    let mut options = CallOptions::default();
    if args.unchecked {
        options = options.unchecked();
    }
    if args.stderr_to_stdout {
        options = options.stderr_to_stdout();
    }
    if args.null_stdin {
        options = options.null_stdin();
    }
    if let Some(dir) = &args.cwd {
        options = options.cwd(dir);
    }
    commons::with_env(options, &args.env)
}

/// `mollusc call <program> [args..]`: runs a command with its output passed through.
pub fn handle_call(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let call_args = CallArgs::try_parse_from(&args)?;
    let options = call_options(&call_args)?;

    let code = ctx.shell.call_with(&call_args.command, &options)?;
    commons::exit_with(code)
}

/// `mollusc output <program> [args..]`: runs a command and prints what it wrote.
pub fn handle_output(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let call_args = CallArgs::try_parse_from(&args)?;
    let options = call_options(&call_args)?;

    let output = ctx.shell.output_with(&call_args.command, &options)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_from_flags() {
        let args = CallArgs::try_parse_from([
            "--unchecked",
            "--stderr-to-stdout",
            "--cwd",
            "/tmp",
            "--env",
            "LANG=C",
            "make",
            "-j4",
        ])
        .unwrap();
        assert_eq!(args.command, vec!["make", "-j4"]);

        let options = call_options(&args).unwrap();
        assert!(!options.check);
        assert!(options.stderr_to_stdout);
        assert!(!options.null_stdin);
        assert_eq!(options.cwd.as_deref(), Some(std::path::Path::new("/tmp")));
        assert_eq!(options.env, vec![("LANG".into(), "C".into())]);
    }

    #[test]
    fn test_command_is_required() {
        assert!(CallArgs::try_parse_from(["--unchecked"]).is_err());
    }
}
