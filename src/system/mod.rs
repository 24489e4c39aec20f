//! # System Interaction Layer
//!
//! Everything that touches process-wide state: output sinks, the working
//! directory, child processes and the filesystem.
//!
//! ## Modules
//!
//! - **`shell`**: The [`Shell`](shell::Shell) state object with its sinks, echo toggle
//!   and logging forwarders.
//! - **`context`**: Scoped overrides of that state, as a block guard or around a callable.
//! - **`executor`**: Runs commands (`call`, `output`), echoes their transcript and maps
//!   failures onto typed errors.
//! - **`fs`**: Filesystem helpers and the working-directory guard.

pub mod context;
pub mod executor;
pub mod fs;
pub mod shell;
