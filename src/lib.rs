include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod system;

pub use crate::core::config::{ConfigError, ShellConfig};
pub use crate::core::paths::{PathError, PathOptions, Rel};
pub use crate::system::context::{ContextGuard, Overrides, ShellContext};
pub use crate::system::executor::{CallOptions, ExecutionError, ShellError};
pub use crate::system::fs::{DirGuard, TempDirOptions, TempWorkDir};
pub use crate::system::shell::{EchoOptions, Encoding, MemoryBuffer, Message, Shell, Sink};

use lazy_static::lazy_static;

lazy_static! {
    static ref SHELL: Shell = Shell::default();
}

/// The process-wide shell, writing to the real stdout and stderr.
///
/// Build a separate [`Shell`] with [`Shell::new`] when isolated sinks are needed.
pub fn sh() -> &'static Shell {
    &SHELL
}
