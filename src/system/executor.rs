// src/system/executor.rs

use crate::system::shell::{Encoding, Shell, Sink};
use std::ffi::OsString;
use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// A command that was started but did not do what was asked of it.
///
/// This is the kind to match when any command failure will do; the two
/// variants tell "ran and failed" apart from "could not run at all".
#[derive(Error, Debug)]
pub enum ShellError {
    /// The process ran and exited unsuccessfully.
    #[error("Command `{cmdline}` failed with error code {code}")]
    CommandFailed {
        /// The shell-quoted argument vector.
        cmdline: String,
        /// The exit code (negated signal number if the child was killed).
        code: i32,
        /// Whatever was captured before the failure (empty for `call`).
        output: Vec<u8>,
    },
    /// The executable does not exist on the search path.
    #[error("Command '{program}' not found, did you install it?")]
    CommandNotFound {
        /// The executable that could not be found.
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ShellError {
    /// The exit code of a failed command.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { code, .. } => Some(*code),
            Self::CommandNotFound { .. } => None,
        }
    }
}

/// Everything [`Shell::call`] and [`Shell::output`] can fail with.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The command itself failed or could not be found.
    #[error(transparent)]
    Shell(#[from] ShellError),
    /// The argument vector was empty.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// Captured output could not be decoded.
    #[error("Command `{cmdline}` produced output that is not valid {encoding}")]
    InvalidOutput {
        /// The shell-quoted argument vector.
        cmdline: String,
        /// The encoding the output was decoded with.
        encoding: Encoding,
        #[source]
        source: std::string::FromUtf8Error,
    },
    /// Any other OS-level failure, unchanged.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExecutionError {
    /// The command-execution failure, if that is what this is.
    pub fn shell_error(&self) -> Option<&ShellError> {
        match self {
            Self::Shell(e) => Some(e),
            _ => None,
        }
    }
}

/// Options shared by [`Shell::call_with`] and [`Shell::output_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    /// Fail with [`ShellError::CommandFailed`] on a non-zero exit (default `true`).
    pub check: bool,
    /// Send the child's standard error to wherever its standard output goes.
    pub stderr_to_stdout: bool,
    /// Give the child an empty standard input instead of ours.
    pub null_stdin: bool,
    /// Working directory of the child. Defaults to ours.
    pub cwd: Option<PathBuf>,
    /// Variables added to the inherited environment.
    pub env: Vec<(OsString, OsString)>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            check: true,
            stderr_to_stdout: false,
            null_stdin: false,
            cwd: None,
            env: Vec::new(),
        }
    }
}

impl CallOptions {
    /// Report a non-zero exit as a value instead of an error.
    pub fn unchecked(mut self) -> Self {
        self.check = false;
        self
    }

    /// Merge standard error into standard output.
    pub fn stderr_to_stdout(mut self) -> Self {
        self.stderr_to_stdout = true;
        self
    }

    /// Close the child's standard input.
    pub fn null_stdin(mut self) -> Self {
        self.null_stdin = true;
        self
    }

    /// Run the child in `dir`.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable for the child.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Renders `argv` as one line a POSIX shell would parse back into the same words.
pub fn quote_args<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| {
            shlex::try_quote(arg.as_ref())
                .map(|quoted| quoted.into_owned())
                // Only NUL bytes are unquotable; such a command cannot be spawned anyway.
                .unwrap_or_else(|_| format!("{:?}", arg.as_ref()))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The transcript line for `argv` under `options`, before `$( )` wrapping.
pub fn command_transcript<S: AsRef<str>>(argv: &[S], options: &CallOptions) -> String {
    let mut cmdline = quote_args(argv);
    if options.stderr_to_stdout {
        cmdline.push_str(" 2>&1");
    }
    if !options.check {
        cmdline = format!("({}) || true", cmdline);
    }
    cmdline
}

/// What a finished child left behind.
struct Finished {
    code: i32,
    captured: Vec<u8>,
}

impl Shell {
    /// Runs `argv`, failing on a non-zero exit. Returns the exit code.
    pub fn call<S: AsRef<str>>(&self, argv: &[S]) -> Result<i32, ExecutionError> {
        self.call_with(argv, &CallOptions::default())
    }

    /// Runs `argv` with its output passed through to the current sinks.
    ///
    /// The command line is echoed first. With `check` off a non-zero exit
    /// code is returned instead of raising; a missing executable is always
    /// reported as [`ShellError::CommandNotFound`].
    pub fn call_with<S: AsRef<str>>(
        &self,
        argv: &[S],
        options: &CallOptions,
    ) -> Result<i32, ExecutionError> {
        self.echo(command_transcript(argv, options));
        let finished = self.run_process(argv, options, false)?;

        if finished.code != 0 && options.check {
            return Err(ShellError::CommandFailed {
                cmdline: quote_args(argv),
                code: finished.code,
                output: finished.captured,
            }
            .into());
        }
        Ok(finished.code)
    }

    /// Runs `argv` and returns its standard output, failing on a non-zero exit.
    pub fn output<S: AsRef<str>>(&self, argv: &[S]) -> Result<String, ExecutionError> {
        self.output_with(argv, &CallOptions::default())
    }

    /// Runs `argv` and returns its standard output decoded with the shell's
    /// resolved encoding.
    ///
    /// With `check` off, a failing command yields whatever it printed
    /// before exiting.
    pub fn output_with<S: AsRef<str>>(
        &self,
        argv: &[S],
        options: &CallOptions,
    ) -> Result<String, ExecutionError> {
        self.echo(format!("$({})", command_transcript(argv, options)));
        let finished = self.run_process(argv, options, true)?;

        if finished.code != 0 && options.check {
            return Err(ShellError::CommandFailed {
                cmdline: quote_args(argv),
                code: finished.code,
                output: finished.captured,
            }
            .into());
        }

        let encoding = self.resolved_encoding();
        encoding
            .decode(finished.captured)
            .map_err(|source| ExecutionError::InvalidOutput {
                cmdline: quote_args(argv),
                encoding,
                source,
            })
    }

    fn run_process<S: AsRef<str>>(
        &self,
        argv: &[S],
        options: &CallOptions,
        capture: bool,
    ) -> Result<Finished, ExecutionError> {
        let (program, args) = argv.split_first().ok_or(ExecutionError::EmptyCommand)?;
        let program = program.as_ref();
        let (stdout_sink, stderr_sink) = (self.stdout(), self.stderr());

        if let Some(cwd) = &options.cwd {
            // Spawning in a missing directory would look like a missing program.
            if !cwd.is_dir() {
                return Err(io::Error::new(
                    ErrorKind::NotFound,
                    format!("working directory '{}' does not exist", cwd.display()),
                )
                .into());
            }
        }

        let args: Vec<&str> = args.iter().map(|arg| arg.as_ref()).collect();
        let mut command = Command::new(program);
        command
            .args(&args)
            .envs(options.env.iter().map(|(k, v)| (k, v)));
        if let Some(cwd) = &options.cwd {
            command.current_dir(dunce::simplified(cwd));
        }
        if options.null_stdin {
            command.stdin(Stdio::null());
        }

        let live_merged = if options.stderr_to_stdout {
            live_merged_stdio(&stdout_sink, capture)
        } else {
            None
        };

        let merged = if let Some((stdout, stderr)) = live_merged {
            // Both streams go straight to the terminal, as `2>&1` does.
            command.stdout(stdout).stderr(stderr);
            None
        } else if options.stderr_to_stdout {
            let (reader, writer) = io::pipe()?;
            command.stdout(writer.try_clone()?).stderr(writer);
            Some(reader)
        } else {
            let stdout = if capture {
                Stdio::piped()
            } else {
                stdout_sink.as_stdio().unwrap_or_else(Stdio::piped)
            };
            command
                .stdout(stdout)
                .stderr(stderr_sink.as_stdio().unwrap_or_else(Stdio::piped));
            None
        };

        log::debug!("Spawning {:?} with {} argument(s)", program, args.len());
        let mut child = command.spawn().map_err(|e| spawn_error(program, e))?;
        // The command holds our copies of the pipe's write end; the reader
        // only sees EOF once they are closed.
        drop(command);

        let piped = match merged {
            Some(mut reader) => {
                let mut bytes = Vec::new();
                let read = reader.read_to_end(&mut bytes);
                let status = child.wait()?;
                read?;
                Piped {
                    status,
                    stdout: Some(bytes),
                    stderr: None,
                }
            }
            None => wait_draining(&mut child)?,
        };

        let finished = route(piped, capture, &stdout_sink, &stderr_sink)?;
        log::debug!("{:?} exited with code {}", program, finished.code);
        Ok(finished)
    }
}

/// Handles that send both of a child's streams straight to `sink`, when it
/// is the process stdout or stderr and nothing is captured.
fn live_merged_stdio(sink: &Sink, capture: bool) -> Option<(Stdio, Stdio)> {
    if capture {
        return None;
    }
    sink.as_stdio().zip(sink.as_stdio())
}

/// Exit status of a child plus whatever came through its pipes.
struct Piped {
    status: ExitStatus,
    stdout: Option<Vec<u8>>,
    stderr: Option<Vec<u8>>,
}

/// Forwards piped output to the sinks, keeping standard output when capturing.
fn route(piped: Piped, capture: bool, stdout_sink: &Sink, stderr_sink: &Sink) -> io::Result<Finished> {
    let code = exit_code(piped.status);
    if let Some(err) = piped.stderr.filter(|bytes| !bytes.is_empty()) {
        stderr_sink.write_bytes(&err, true)?;
    }

    let out = piped.stdout.unwrap_or_default();
    if capture {
        return Ok(Finished {
            code,
            captured: out,
        });
    }
    if !out.is_empty() {
        stdout_sink.write_bytes(&out, true)?;
    }
    Ok(Finished {
        code,
        captured: Vec::new(),
    })
}

type Reader = JoinHandle<io::Result<Vec<u8>>>;

/// Waits for the child while draining its piped streams on their own
/// threads, so a full pipe can never block it.
fn wait_draining(child: &mut Child) -> io::Result<Piped> {
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);
    let status = child.wait()?;
    Ok(Piped {
        status,
        stdout: stdout.map(join_reader).transpose()?,
        stderr: stderr.map(join_reader).transpose()?,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> Reader {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn join_reader(handle: Reader) -> io::Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))?
}

fn spawn_error(program: &str, error: io::Error) -> ExecutionError {
    if error.kind() == ErrorKind::NotFound {
        ShellError::CommandNotFound {
            program: program.to_string(),
            source: error,
        }
        .into()
    } else {
        ExecutionError::Io(error)
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
