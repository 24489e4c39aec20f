// src/bin/mollusc.rs

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser};
use colored::*;
use log::LevelFilter;
use mollusc::{
    ExecutionError, ShellError,
    cli::{
        Cli,
        handlers::{
            self,
            commons::{ExitStatus, HandlerContext},
        },
    },
    constants::EXIT_COMMAND_NOT_FOUND,
    core::config,
    sh, t,
};

// --- Command Definition and Registry ---

/// A CLI command, its aliases and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &HandlerContext<'_>) -> Result<()>,
}

/// Every command the binary knows. Handlers parse their own arguments.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "call",
        aliases: &["run"],
        handler: handlers::run::handle_call,
    },
    CommandDefinition {
        name: "chmod-x",
        aliases: &[],
        handler: handlers::fs::handle_chmod_x,
    },
    CommandDefinition {
        name: "echo",
        aliases: &[],
        handler: handlers::echo::handle,
    },
    CommandDefinition {
        name: "ensure-dir",
        aliases: &["mkdir"],
        handler: handlers::fs::handle_ensure_dir,
    },
    CommandDefinition {
        name: "glob",
        aliases: &[],
        handler: handlers::fs::handle_glob,
    },
    CommandDefinition {
        name: "in-temp",
        aliases: &[],
        handler: handlers::in_temp::handle,
    },
    CommandDefinition {
        name: "output",
        aliases: &["capture"],
        handler: handlers::run::handle_output,
    },
    CommandDefinition {
        name: "path",
        aliases: &[],
        handler: handlers::path::handle,
    },
    CommandDefinition {
        name: "remove",
        aliases: &["rm"],
        handler: handlers::fs::handle_remove,
    },
    CommandDefinition {
        name: "write",
        aliases: &[],
        handler: handlers::fs::handle_write,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Sets up `env_logger`. `RUST_LOG` is the baseline; the configured level and
/// then `-v` take precedence over it.
fn init_logging(configured: Option<LevelFilter>, verbosity: Option<LevelFilter>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = verbosity.or(configured) {
        builder.filter_level(level);
    }
    builder.init();
}

/// The process exit status for a failed run.
fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(ExitStatus(code)) = error.downcast_ref::<ExitStatus>() {
        return *code;
    }
    match error
        .downcast_ref::<ExecutionError>()
        .and_then(ExecutionError::shell_error)
    {
        Some(ShellError::CommandFailed { code, .. }) if *code > 0 => *code,
        // Killed by a signal, reported the way POSIX shells do.
        Some(ShellError::CommandFailed { code, .. }) if *code < 0 => 128 - *code,
        Some(ShellError::CommandNotFound { .. }) => EXIT_COMMAND_NOT_FOUND,
        _ => 1,
    }
}

fn main() {
    if let Err(e) = run_cli(Cli::parse()) {
        let code = exit_code(&e);
        // A tolerated status was already visible in the command's own output.
        if e.downcast_ref::<ExitStatus>().is_none() {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
        }
        std::process::exit(code);
    }
}

/// Loads the configuration, prepares the shell and dispatches to the handler.
fn run_cli(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref()).context(t!("main.error.config"))?;
    init_logging(config.level_filter()?, cli.verbosity());
    log::debug!("CLI args parsed: {:?}", cli);

    let shell = sh();
    shell.configure(&config)?;
    if let Some(level) = cli.verbosity() {
        shell.set_logger_level(level);
    }

    let Some(name) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };
    let command = find_command(&name)
        .ok_or_else(|| anyhow!(t!("main.error.unknown_command"), name = name))?;

    // Quiet first, so that entering and leaving `-C` is not echoed either.
    let _quiet = cli.quiet.then(|| shell.context().echo_on(false).enter());
    let _cwd = match &cli.directory {
        Some(dir) => Some(shell.change_dir(dir).with_context(|| {
            anyhow!(t!("main.error.change_dir"), path = dir.display())
        })?),
        None => None,
    };

    let ctx = HandlerContext {
        shell,
        config: &config,
    };
    (command.handler)(cli.args, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_find_command_by_alias() {
        assert_eq!(find_command("rm").map(|c| c.name), Some("remove"));
        assert_eq!(find_command("capture").map(|c| c.name), Some("output"));
        assert_eq!(find_command("call").map(|c| c.name), Some("call"));
        assert!(find_command("nope").is_none());
    }

    #[test]
    fn test_exit_codes() {
        let failed = anyhow::Error::from(ExecutionError::from(ShellError::CommandFailed {
            cmdline: "false".to_string(),
            code: 4,
            output: Vec::new(),
        }));
        assert_eq!(exit_code(&failed), 4);

        let killed = anyhow::Error::from(ExecutionError::from(ShellError::CommandFailed {
            cmdline: "sleep 10".to_string(),
            code: -9,
            output: Vec::new(),
        }));
        assert_eq!(exit_code(&killed), 137);

        let missing = anyhow::Error::from(ExecutionError::from(ShellError::CommandNotFound {
            program: "nope".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        }))
        .context("while running");
        assert_eq!(exit_code(&missing), EXIT_COMMAND_NOT_FOUND);

        assert_eq!(exit_code(&anyhow::Error::from(ExitStatus(2))), 2);
        assert_eq!(exit_code(&anyhow!("other")), 1);
    }
}
