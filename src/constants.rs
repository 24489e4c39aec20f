// src/constants.rs

/// The name of the directory holding the user configuration (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "mollusc";

/// The name of the user configuration file (inside `~/.config/mollusc/`).
pub const USER_CONFIG_FILENAME: &str = "config.toml";

/// The name of the per-project configuration file, looked up in the working directory.
pub const PROJECT_CONFIG_FILENAME: &str = "mollusc.toml";

/// Environment variable pointing at an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "MOLLUSC_CONFIG";

/// Prefix for temporary directories created without an explicit one.
pub const DEFAULT_TEMP_PREFIX: &str = "mollusc-";

/// The `log` target used by the shell's logging forwarders.
pub const LOG_TARGET: &str = "mollusc";

/// Exit status reported by the CLI when a command could not be found.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Language of the compiled-in message table, chosen by `build.rs`.
pub const MESSAGE_LANGUAGE: &str = env!("MOLLUSC_LANG_EFFECTIVE");
