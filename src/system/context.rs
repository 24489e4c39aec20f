// src/system/context.rs

use crate::system::shell::{Shell, Sink};
use log::LevelFilter;

/// The attributes of a [`Shell`] that a context may override.
///
/// `None` means "leave as is". The same type holds the snapshot of the
/// original values taken when a context is entered.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replacement output sink.
    pub stdout: Option<Sink>,
    /// Replacement error sink.
    pub stderr: Option<Sink>,
    /// Replacement echo toggle.
    pub echo_on: Option<bool>,
    /// Replacement logger threshold.
    pub logger_level: Option<LevelFilter>,
}

impl Overrides {
    /// Names of the attributes this set touches.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.stdout.is_some() {
            names.push("stdout");
        }
        if self.stderr.is_some() {
            names.push("stderr");
        }
        if self.echo_on.is_some() {
            names.push("echo_on");
        }
        if self.logger_level.is_some() {
            names.push("logger_level");
        }
        names
    }

    /// Whether nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }

    /// Current values of exactly the attributes named by `self`.
    fn snapshot(&self, shell: &Shell) -> Self {
        Self {
            stdout: self.stdout.as_ref().map(|_| shell.stdout()),
            stderr: self.stderr.as_ref().map(|_| shell.stderr()),
            echo_on: self.echo_on.map(|_| shell.echo_on()),
            logger_level: self.logger_level.map(|_| shell.logger_level()),
        }
    }

    fn apply(&self, shell: &Shell) {
        if let Some(level) = self.logger_level {
            shell.set_logger_level(level);
        }
        let mut state = shell.state();
        if let Some(sink) = &self.stdout {
            state.stdout = sink.clone();
        }
        if let Some(sink) = &self.stderr {
            state.stderr = sink.clone();
        }
        if let Some(on) = self.echo_on {
            state.echo_on = on;
        }
    }
}

/// A reusable scope that overrides attributes of a [`Shell`] while active.
///
/// Use it around a block with [`ShellContext::enter`] or [`ShellContext::run`],
/// or around a callable with [`ShellContext::wrap`]. Both forms share the same
/// guard, so the originals come back on every exit path, unwinding included.
///
/// ```
/// use mollusc::Shell;
///
/// let shell = Shell::default();
/// shell.context().echo_on(false).run(|| {
///     shell.echo("not shown");
/// });
/// assert!(shell.echo_on());
/// ```
#[derive(Debug, Clone)]
pub struct ShellContext<'a> {
    shell: &'a Shell,
    attrs: Overrides,
}

impl<'a> ShellContext<'a> {
    /// A context applying `attrs` to `shell`.
    pub fn new(shell: &'a Shell, attrs: Overrides) -> Self {
        Self { shell, attrs }
    }

    /// Overrides the output sink.
    pub fn stdout(mut self, sink: Sink) -> Self {
        self.attrs.stdout = Some(sink);
        self
    }

    /// Overrides the error sink.
    pub fn stderr(mut self, sink: Sink) -> Self {
        self.attrs.stderr = Some(sink);
        self
    }

    /// Overrides the echo toggle.
    pub fn echo_on(mut self, on: bool) -> Self {
        self.attrs.echo_on = Some(on);
        self
    }

    /// Overrides the logger threshold.
    pub fn logger_level(mut self, level: LevelFilter) -> Self {
        self.attrs.logger_level = Some(level);
        self
    }

    /// The attributes this context assigns.
    pub fn overrides(&self) -> &Overrides {
        &self.attrs
    }

    /// Snapshots the current values, then applies the overrides.
    /// The snapshot is restored when the returned guard is dropped.
    pub fn enter(&self) -> ContextGuard<'a> {
        let snapshot = self.attrs.snapshot(self.shell);
        log::trace!("Entering shell context overriding {:?}", self.attrs.names());
        self.attrs.apply(self.shell);
        ContextGuard {
            shell: self.shell,
            snapshot: Some(snapshot),
        }
    }

    /// Runs `f` inside the context.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// Wraps `f` so that every call enters and leaves the context.
    pub fn wrap<R, F>(self, mut f: F) -> impl FnMut() -> R
    where
        F: FnMut() -> R,
    {
        move || {
            let _guard = self.enter();
            f()
        }
    }

    /// Like [`ShellContext::wrap`], for callables taking one argument
    /// (use a tuple for more).
    pub fn wrap_with<A, R, F>(self, mut f: F) -> impl FnMut(A) -> R
    where
        F: FnMut(A) -> R,
    {
        move |arg| {
            let _guard = self.enter();
            f(arg)
        }
    }
}

/// Restores the attributes snapshotted by [`ShellContext::enter`] when dropped.
///
/// Guards nest: each one only restores its own snapshot, so dropping them in
/// reverse order of creation (the natural lexical order) unwinds every layer.
#[must_use = "the overrides are reverted as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard<'a> {
    shell: &'a Shell,
    snapshot: Option<Overrides>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            log::trace!("Leaving shell context, restoring {:?}", snapshot.names());
            snapshot.apply(self.shell);
        }
    }
}

impl Shell {
    /// Starts building a context with no overrides.
    pub fn context(&self) -> ShellContext<'_> {
        ShellContext::new(self, Overrides::default())
    }

    /// A context applying the given overrides.
    pub fn with_overrides(&self, attrs: Overrides) -> ShellContext<'_> {
        ShellContext::new(self, attrs)
    }
}
