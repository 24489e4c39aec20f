// src/cli/handlers/fs.rs

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use std::io::{self, Read};
use std::path::PathBuf;

use crate::cli::args::{GlobArgs, PathsArgs, RemoveArgs, WriteArgs};
use crate::cli::handlers::commons::HandlerContext;
use crate::system::shell::Shell;

/// `mollusc ensure-dir <path>..`
pub fn handle_ensure_dir(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let paths_args = PathsArgs::try_parse_from(&args)?;
    for path in &paths_args.paths {
        ctx.shell.ensure_dir(path).with_context(|| {
            anyhow!(t!("ensure_dir.error.failed"), path = path.display())
        })?;
    }
    Ok(())
}

/// Expands each pattern, warning about the ones that match nothing.
fn expand_patterns(shell: &Shell, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();
    for pattern in patterns {
        let found = shell
            .glob(pattern)
            .with_context(|| anyhow!(t!("glob.error.invalid_pattern"), pattern = pattern))?;
        if found.is_empty() {
            log::warn!("{}", format_args!(t!("glob.warning.no_matches"), pattern = pattern));
        }
        matches.extend(found);
    }
    Ok(matches)
}

/// `mollusc remove [--glob] <path>..`
pub fn handle_remove(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let remove_args = RemoveArgs::try_parse_from(&args)?;

    let targets = if remove_args.glob {
        expand_patterns(ctx.shell, &remove_args.paths)?
    } else {
        remove_args.paths.iter().map(PathBuf::from).collect()
    };

    ctx.shell
        .remove(&targets)
        .context(t!("remove.error.failed"))
}

/// `mollusc glob <pattern>..`: prints one match per line.
pub fn handle_glob(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let glob_args = GlobArgs::try_parse_from(&args)?;
    for path in expand_patterns(ctx.shell, &glob_args.patterns)? {
        println!("{}", path.display());
    }
    Ok(())
}

/// `mollusc write <path> [data]`: data comes from standard input when omitted.
pub fn handle_write(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let write_args = WriteArgs::try_parse_from(&args)?;

    let data = match write_args.data {
        Some(data) => data.into_bytes(),
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context(t!("write.error.read_stdin"))?;
            buffer
        }
    };

    ctx.shell.write(&write_args.path, &data).with_context(|| {
        anyhow!(t!("write.error.failed"), path = write_args.path.display())
    })
}

/// `mollusc chmod-x <path>..`
pub fn handle_chmod_x(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let paths_args = PathsArgs::try_parse_from(&args)?;
    for path in &paths_args.paths {
        ctx.shell.chmod_x(path).with_context(|| {
            anyhow!(t!("chmod.error.failed"), path = path.display().to_string().cyan())
        })?;
    }
    Ok(())
}
