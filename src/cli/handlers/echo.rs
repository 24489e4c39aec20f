// src/cli/handlers/echo.rs

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::args::EchoArgs;
use crate::cli::handlers::commons::HandlerContext;
use crate::system::shell::{EchoOptions, Message};

/// `mollusc echo [-e] [-n] [--json] words..`: echoes through the shell sinks.
pub fn handle(args: Vec<String>, ctx: &HandlerContext<'_>) -> Result<()> {
    let echo_args = EchoArgs::try_parse_from(&args)?;
    let text = echo_args.words.join(" ");

    let message = if echo_args.json {
        let value: serde_json::Value =
            serde_json::from_str(&text).context(t!("echo.error.invalid_json"))?;
        Message::from(value)
    } else {
        Message::from(text)
    };

    let mut options = EchoOptions::default();
    if echo_args.stderr {
        options = options.error();
    }
    if echo_args.no_newline {
        options = options.end("");
    }

    ctx.shell.echo_with(message, &options);
    Ok(())
}
