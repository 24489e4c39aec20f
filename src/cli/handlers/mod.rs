// src/cli/handlers/mod.rs

// One module per CLI command; `commons` holds what they share.

pub mod commons;
pub mod echo;
pub mod fs;
pub mod in_temp;
pub mod path;
pub mod run;
