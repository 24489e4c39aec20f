// src/cli/handlers/in_temp.rs

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::args::InTempArgs;
use crate::cli::handlers::commons::HandlerContext;

/// `mollusc in-temp [--prefix P] [--suffix S] [--dir D] <program> [args..]`
///
/// Runs the command inside a fresh temporary directory, then returns to the
/// previous directory and deletes the temporary one, whatever the outcome.
pub fn handle(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let in_temp_args = InTempArgs::try_parse_from(&args)?;

    let mut options = ctx.config.temp_options()?;
    if let Some(prefix) = in_temp_args.prefix {
        options.prefix = Some(prefix);
    }
    if let Some(suffix) = in_temp_args.suffix {
        options.suffix = Some(suffix);
    }
    if let Some(dir) = in_temp_args.dir {
        options.dir = Some(dir);
    }

    let work_dir = ctx
        .shell
        .in_temp_dir(&options)
        .context(t!("in_temp.error.create"))?;
    log::debug!("Running in '{}'", work_dir.path().display());

    let result = ctx.shell.call(&in_temp_args.command);
    work_dir.close().context(t!("in_temp.error.cleanup"))?;
    result?;
    Ok(())
}
