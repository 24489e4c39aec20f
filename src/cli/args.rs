use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)] // The registry has already consumed the command name.
pub struct CallArgs {
    /// Report a non-zero exit status instead of failing.
    #[arg(long)]
    pub unchecked: bool,

    /// Send the command's standard error to its standard output.
    #[arg(long)]
    pub stderr_to_stdout: bool,

    /// Give the command an empty standard input.
    #[arg(long)]
    pub null_stdin: bool,

    /// Working directory of the command.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variables (e.g., "KEY=VALUE").
    #[arg(long, value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// The program and its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct EchoArgs {
    /// Write to the error sink.
    #[arg(long, short = 'e')]
    pub stderr: bool,

    /// Do not end the message with a newline.
    #[arg(short = 'n')]
    pub no_newline: bool,

    /// Parse the message as JSON and pretty-print it.
    #[arg(long)]
    pub json: bool,

    /// The words to echo, joined by spaces.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub words: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct PathsArgs {
    /// The paths to act on.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct RemoveArgs {
    /// Treat every argument as a glob pattern and remove its matches.
    #[arg(long)]
    pub glob: bool,

    /// Files or directories to remove.
    pub paths: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct GlobArgs {
    /// Patterns to expand.
    #[arg(required = true)]
    pub patterns: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct PathArgs {
    /// Path options (e.g., "rel=true", "rel=false", "rel=/base/dir").
    #[arg(long = "option", short = 'o', value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Components joined into one path.
    #[arg(required = true)]
    pub components: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct WriteArgs {
    /// The file to write.
    pub path: PathBuf,

    /// The new contents. Read from standard input when omitted.
    pub data: Option<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct InTempArgs {
    /// Start of the temporary directory name.
    #[arg(long)]
    pub prefix: Option<String>,

    /// End of the temporary directory name.
    #[arg(long)]
    pub suffix: Option<String>,

    /// Where to create the temporary directory.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// The program and its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
