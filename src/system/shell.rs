// src/system/shell.rs

use crate::constants::LOG_TARGET;
use crate::core::config::{ConfigError, ShellConfig};
use log::{Level, LevelFilter};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

// --- Encodings ---

/// Text encoding a sink declares for the bytes written to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8, also the fallback when no sink declares anything.
    #[default]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
}

/// An encoding label that is not recognised.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown encoding '{0}'. Supported: utf-8, latin-1.")]
pub struct UnknownEncoding(pub String);

impl Encoding {
    /// The canonical label of the encoding.
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decodes `bytes` strictly. Latin-1 never fails.
    pub fn decode(self, bytes: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
        match self {
            Self::Utf8 => String::from_utf8(bytes),
            Self::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }

    /// Decodes `bytes`, replacing invalid sequences instead of failing.
    pub fn decode_lossy(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().copied().map(char::from).collect(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            _ => Err(UnknownEncoding(s.to_string())),
        }
    }
}

// --- Sinks ---

#[derive(Clone)]
enum Target {
    Stdout,
    Stderr,
    Writer(Arc<Mutex<dyn Write + Send>>),
}

/// A swappable write target for transcripts and passed-through command output.
///
/// Cloning a sink yields another handle to the same target.
#[derive(Clone)]
pub struct Sink {
    target: Target,
    encoding: Option<Encoding>,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            Target::Stdout => "stdout",
            Target::Stderr => "stderr",
            Target::Writer(_) => "writer",
        };
        f.debug_struct("Sink")
            .field("target", &target)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Sink {
    /// The process standard output. Declares UTF-8.
    pub fn stdout() -> Self {
        Self {
            target: Target::Stdout,
            encoding: Some(Encoding::Utf8),
        }
    }

    /// The process standard error. Declares UTF-8.
    pub fn stderr() -> Self {
        Self {
            target: Target::Stderr,
            encoding: Some(Encoding::Utf8),
        }
    }

    /// A sink that discards everything.
    pub fn null() -> Self {
        Self::from_writer(io::sink())
    }

    /// Wraps an arbitrary writer. No encoding is declared.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            target: Target::Writer(Arc::new(Mutex::new(writer))),
            encoding: None,
        }
    }

    /// An in-memory sink plus the handle used to read back what was written.
    pub fn memory() -> (Self, MemoryBuffer) {
        let buffer = MemoryBuffer::default();
        let sink = Self::from_writer(MemoryWriter(Arc::clone(&buffer.bytes)));
        (sink, buffer)
    }

    /// Declares the encoding of this sink.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// The declared encoding, if any.
    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    /// Whether both handles write to the same place.
    pub fn same_target(&self, other: &Self) -> bool {
        match (&self.target, &other.target) {
            (Target::Stdout, Target::Stdout) | (Target::Stderr, Target::Stderr) => true,
            (Target::Writer(a), Target::Writer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn write_bytes(&self, bytes: &[u8], flush: bool) -> io::Result<()> {
        match &self.target {
            Target::Stdout => write_locked(&mut io::stdout().lock(), bytes, flush),
            Target::Stderr => write_locked(&mut io::stderr().lock(), bytes, flush),
            Target::Writer(writer) => {
                let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
                write_locked(&mut *writer, bytes, flush)
            }
        }
    }

    /// A child-process handle for this sink, when the child can write to it directly.
    pub(crate) fn as_stdio(&self) -> Option<Stdio> {
        match &self.target {
            Target::Stdout => Some(io::stdout().into()),
            Target::Stderr => Some(io::stderr().into()),
            Target::Writer(_) => None,
        }
    }
}

fn write_locked(writer: &mut dyn Write, bytes: &[u8], flush: bool) -> io::Result<()> {
    writer.write_all(bytes)?;
    if flush {
        writer.flush()?;
    }
    Ok(())
}

/// Read side of a [`Sink::memory`] sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryBuffer {
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything written so far, as raw bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Everything written so far, decoded as UTF-8 (lossily).
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// The first line written, without its terminator.
    pub fn first_line(&self) -> Option<String> {
        self.contents().lines().next().map(str::to_string)
    }

    /// Discards everything written so far.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// --- Messages ---

/// Anything that can be echoed.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Text, written unchanged.
    Text(String),
    /// Raw bytes, decoded with the shell's resolved encoding.
    Bytes(Vec<u8>),
    /// A structured value, pretty-printed.
    Structured(serde_json::Value),
}

impl Message {
    /// Pretty-prints any value through its `Debug` implementation.
    pub fn pretty<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        Self::Text(format!("{value:#?}"))
    }

    /// Serializes `value` into a structured message.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Structured)
    }

    /// Renders the message as text.
    pub fn render(&self, encoding: Encoding) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Bytes(bytes) => encoding.decode_lossy(bytes),
            Self::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&String> for Message {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Message {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// How a single echo is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoOptions {
    /// Write to the error sink instead of the output sink.
    pub to_error: bool,
    /// Appended after the message.
    pub end: String,
    /// Flush the sink afterwards.
    pub flush: bool,
}

impl Default for EchoOptions {
    fn default() -> Self {
        Self {
            to_error: false,
            end: "\n".to_string(),
            flush: true,
        }
    }
}

impl EchoOptions {
    /// Routes the echo to the error sink.
    pub fn error(mut self) -> Self {
        self.to_error = true;
        self
    }

    /// Replaces the line terminator.
    pub fn end(mut self, end: impl Into<String>) -> Self {
        self.end = end.into();
        self
    }

    /// Leaves flushing to the sink.
    pub fn no_flush(mut self) -> Self {
        self.flush = false;
        self
    }
}

// --- The shell itself ---

#[derive(Debug, Clone)]
pub(crate) struct ShellState {
    pub(crate) stdout: Sink,
    pub(crate) stderr: Sink,
    pub(crate) echo_on: bool,
}

/// Execution state shared by every helper: output sinks, the echo toggle
/// and the logging threshold.
///
/// Most programs use the process-wide instance returned by [`crate::sh`]; tests
/// build their own with memory sinks. All methods take `&self`, the state
/// lives behind a lock so the global handle can be a plain `&'static Shell`.
#[derive(Debug)]
pub struct Shell {
    state: Mutex<ShellState>,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(Sink::stdout(), Sink::stderr())
    }
}

impl Shell {
    /// Creates a shell writing to the given sinks, with echo enabled.
    pub fn new(stdout: Sink, stderr: Sink) -> Self {
        Self {
            state: Mutex::new(ShellState {
                stdout,
                stderr,
                echo_on: true,
            }),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ShellState> {
        // The state is always left consistent, a panic elsewhere cannot half-write it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current output sink.
    pub fn stdout(&self) -> Sink {
        self.state().stdout.clone()
    }

    /// Replaces the output sink.
    pub fn set_stdout(&self, sink: Sink) {
        self.state().stdout = sink;
    }

    /// The current error sink.
    pub fn stderr(&self) -> Sink {
        self.state().stderr.clone()
    }

    /// Replaces the error sink.
    pub fn set_stderr(&self, sink: Sink) {
        self.state().stderr = sink;
    }

    /// Whether transcripts are written at all.
    pub fn echo_on(&self) -> bool {
        self.state().echo_on
    }

    /// Turns transcripts on or off. Command execution is unaffected.
    pub fn set_echo_on(&self, on: bool) {
        self.state().echo_on = on;
    }

    /// The threshold of the attached logger (the `log` facade).
    pub fn logger_level(&self) -> LevelFilter {
        log::max_level()
    }

    /// Sets the threshold of the attached logger. This is process-wide.
    pub fn set_logger_level(&self, level: LevelFilter) {
        log::set_max_level(level);
    }

    /// The first encoding declared by the output or error sink, else UTF-8.
    pub fn resolved_encoding(&self) -> Encoding {
        let state = self.state();
        resolve_encoding(&state)
    }

    /// Applies the `echo`, `log_level` and `encoding` settings of a configuration.
    pub fn configure(&self, config: &ShellConfig) -> Result<(), ConfigError> {
        let level = config.level_filter()?;
        let encoding = config.encoding()?;
        if let Some(level) = level {
            self.set_logger_level(level);
        }
        let mut state = self.state();
        state.echo_on = config.echo;
        if let Some(encoding) = encoding {
            state.stdout = state.stdout.clone().with_encoding(encoding);
            state.stderr = state.stderr.clone().with_encoding(encoding);
        }
        Ok(())
    }

    /// Writes `msg` and a newline to the output sink.
    pub fn echo(&self, msg: impl Into<Message>) {
        self.echo_with(msg, &EchoOptions::default());
    }

    /// Writes `msg` and a newline to the error sink.
    pub fn echo_err(&self, msg: impl Into<Message>) {
        self.echo_with(msg, &EchoOptions::default().error());
    }

    /// Writes `msg` followed by `options.end`. Does nothing while echo is off.
    ///
    /// A failing sink does not fail the caller; the error is logged instead.
    pub fn echo_with(&self, msg: impl Into<Message>, options: &EchoOptions) {
        let (sink, encoding) = {
            let state = self.state();
            if !state.echo_on {
                return;
            }
            let sink = if options.to_error {
                state.stderr.clone()
            } else {
                state.stdout.clone()
            };
            (sink, resolve_encoding(&state))
        };

        let mut text = msg.into().render(encoding);
        text.push_str(&options.end);
        if let Err(e) = sink.write_bytes(text.as_bytes(), options.flush) {
            log::warn!(target: LOG_TARGET, "Could not write to {:?}: {}", sink, e);
        }
    }

    // --- Logging forwarders. Gating is done by the logger, not here. ---

    /// Logs at an arbitrary level.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        log::log!(target: LOG_TARGET, level, "{}", args);
    }

    /// Logs at debug level.
    pub fn log_debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    /// Logs at info level.
    pub fn log_info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    /// Logs at warning level.
    pub fn log_warning(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    /// Logs at error level.
    pub fn log_error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    /// Logs at error level, tagged as critical (`log` has no higher level).
    pub fn log_critical(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, format_args!("CRITICAL: {}", args));
    }

    /// Logs an error and its whole `source()` chain at error level.
    pub fn log_exception(&self, error: &(dyn StdError + 'static)) {
        self.log(Level::Error, format_args!("{}", render_error_chain(error)));
    }
}

fn resolve_encoding(state: &ShellState) -> Encoding {
    state
        .stdout
        .encoding()
        .or_else(|| state.stderr.encoding())
        .unwrap_or_default()
}

fn render_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, "\n  caused by: {}", cause);
        source = cause.source();
    }
    rendered
}

/// Serializes tests that change the process-wide logger threshold.
#[cfg(test)]
pub(crate) static LOG_LEVEL_LOCK: Mutex<()> = Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_shell() -> (Shell, MemoryBuffer, MemoryBuffer) {
        let (out, out_buf) = Sink::memory();
        let (err, err_buf) = Sink::memory();
        (Shell::new(out, err), out_buf, err_buf)
    }

    #[test]
    fn test_echo_routes_to_stdout_and_stderr() {
        let (shell, out, err) = memory_shell();
        shell.echo("Message");
        assert_eq!(out.contents(), "Message\n");
        assert_eq!(err.contents(), "");

        shell.echo_err("Error");
        assert_eq!(out.contents(), "Message\n");
        assert_eq!(err.contents(), "Error\n");
    }

    #[test]
    fn test_echo_decodes_byte_strings() {
        let (shell, out, _) = memory_shell();
        shell.echo("人".as_bytes());
        assert_eq!(out.contents(), "人\n");
    }

    #[test]
    fn test_echo_bytes_with_declared_latin1() {
        let (out, out_buf) = Sink::memory();
        let shell = Shell::new(out.with_encoding(Encoding::Latin1), Sink::null());
        shell.echo(vec![0x63u8, 0x61, 0x66, 0xe9]);
        assert_eq!(out_buf.contents(), "café\n");
    }

    #[test]
    fn test_echo_custom_line_end() {
        let (shell, out, _) = memory_shell();
        shell.echo_with("Downloading...", &EchoOptions::default().end(""));
        assert_eq!(out.contents(), "Downloading...");
        shell.echo(" done");
        assert_eq!(out.contents(), "Downloading... done\n");
    }

    #[test]
    fn test_echo_pretty_prints_structured_values() {
        let (shell, out, _) = memory_shell();
        let value = json!({ "abcd": ["a", "b"] });
        shell.echo_with(value.clone(), &EchoOptions::default().end(""));
        assert_eq!(out.contents(), serde_json::to_string_pretty(&value).unwrap());
    }

    #[test]
    fn test_echo_pretty_debug() {
        let (shell, out, _) = memory_shell();
        shell.echo(Message::pretty(&vec![1, 2]));
        assert_eq!(out.contents(), "[\n    1,\n    2,\n]\n");
    }

    #[test]
    fn test_echo_off_suppresses_everything() {
        let (shell, out, err) = memory_shell();
        shell.set_echo_on(false);
        shell.echo("hidden");
        shell.echo_err("hidden");
        assert!(out.bytes().is_empty());
        assert!(err.bytes().is_empty());
    }

    #[test]
    fn test_resolved_encoding_prefers_stdout_then_stderr() {
        let (shell, _, _) = memory_shell();
        assert_eq!(shell.resolved_encoding(), Encoding::Utf8);

        shell.set_stderr(Sink::null().with_encoding(Encoding::Latin1));
        assert_eq!(shell.resolved_encoding(), Encoding::Latin1);

        shell.set_stdout(Sink::null().with_encoding(Encoding::Utf8));
        assert_eq!(shell.resolved_encoding(), Encoding::Utf8);
    }

    #[test]
    fn test_encoding_parsing() {
        assert_eq!("UTF8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("iso-8859-1".parse::<Encoding>(), Ok(Encoding::Latin1));
        assert!("ebcdic".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_memory_buffer_first_line_and_clear() {
        let (shell, out, _) = memory_shell();
        shell.echo("one");
        shell.echo("two");
        assert_eq!(out.first_line().as_deref(), Some("one"));
        out.clear();
        assert_eq!(out.first_line(), None);
    }

    #[test]
    fn test_configure_applies_settings() {
        let _level = LOG_LEVEL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let original = log::max_level();
        let (shell, out, _) = memory_shell();
        let config = ShellConfig {
            echo: false,
            log_level: Some("debug".to_string()),
            encoding: Some("latin-1".to_string()),
            ..ShellConfig::default()
        };

        shell.configure(&config).unwrap();
        assert!(!shell.echo_on());
        assert_eq!(shell.resolved_encoding(), Encoding::Latin1);
        assert_eq!(shell.logger_level(), LevelFilter::Debug);
        shell.echo("hidden");
        assert!(out.bytes().is_empty());
        log::set_max_level(original);
    }

    #[test]
    fn test_configure_rejects_bad_values_without_changes() {
        let _level = LOG_LEVEL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let original = log::max_level();
        let (shell, _, _) = memory_shell();

        let bad_level = ShellConfig {
            echo: false,
            log_level: Some("loud".to_string()),
            encoding: Some("latin-1".to_string()),
            ..ShellConfig::default()
        };
        assert!(shell.configure(&bad_level).is_err());

        let bad_encoding = ShellConfig {
            echo: false,
            log_level: Some("trace".to_string()),
            encoding: Some("ebcdic".to_string()),
            ..ShellConfig::default()
        };
        assert!(shell.configure(&bad_encoding).is_err());

        assert!(shell.echo_on());
        assert_eq!(shell.resolved_encoding(), Encoding::Utf8);
        assert_eq!(shell.logger_level(), original);
    }

    #[test]
    fn test_echo_without_flush_still_writes() {
        let (shell, out, _) = memory_shell();
        shell.echo_with("partial", &EchoOptions::default().end("").no_flush());
        assert_eq!(out.contents(), "partial");
    }

    #[test]
    fn test_log_forwarders_never_touch_sinks() {
        let (shell, out, err) = memory_shell();
        shell.log_debug(format_args!("debug {}", 1));
        shell.log_info(format_args!("info"));
        shell.log_warning(format_args!("warning"));
        shell.log_error(format_args!("error"));
        shell.log_critical(format_args!("critical"));
        shell.log(Level::Trace, format_args!("trace"));
        shell.log_exception(&io::Error::other("boom"));
        assert!(out.bytes().is_empty());
        assert!(err.bytes().is_empty());
    }

    #[derive(Error, Debug)]
    #[error("could not publish")]
    struct Publish(#[source] io::Error);

    #[test]
    fn test_error_chain_rendering() {
        let error = Publish(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert_eq!(
            render_error_chain(&error),
            "could not publish\n  caused by: missing"
        );
    }
}
