// src/cli/handlers/path.rs

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::args::PathArgs;
use crate::cli::handlers::commons::{self, HandlerContext};
use crate::core::paths::PathOptions;

/// Parses repeated `-o KEY=VALUE` flags into path options.
fn parse_options(raw: &[String]) -> Result<PathOptions> {
    let pairs = raw
        .iter()
        .map(|option| commons::parse_key_value(option))
        .collect::<Result<Vec<_>>>()?;
    Ok(PathOptions::parse(pairs)?)
}

/// `mollusc path [-o rel=..] <component>..`: prints the joined path.
pub fn handle(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let path_args = PathArgs::try_parse_from(&args)?;
    let options = parse_options(&path_args.options)?;

    let path = ctx
        .shell
        .path(&path_args.components, &options)
        .context(t!("path.error.resolve"))?;
    println!("{}", path.display());
    Ok(())
}
