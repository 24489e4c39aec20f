// src/system/fs.rs

use crate::constants::DEFAULT_TEMP_PREFIX;
use crate::core::paths::{self, PathOptions};
use crate::system::shell::Shell;
use glob::{MatchOptions, PatternError};
use std::env;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

/// Options for [`Shell::temp_dir`] and [`Shell::in_temp_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempDirOptions {
    /// Start of the directory name. Defaults to `mollusc-`.
    pub prefix: Option<String>,
    /// End of the directory name.
    pub suffix: Option<String>,
    /// Directory to create it in. Defaults to the system temp dir.
    pub dir: Option<PathBuf>,
}

impl TempDirOptions {
    /// Sets the name prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets the name suffix.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Sets the parent directory.
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

/// Shell-quotes a path for a transcript line.
fn quote_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    match shlex::try_quote(&text) {
        Ok(quoted) => quoted.into_owned(),
        Err(_) => format!("{:?}", text),
    }
}

/// The path as shown in transcripts: relative to the working directory when possible.
fn display_relative(path: &Path) -> String {
    let shown = env::current_dir()
        .and_then(|cwd| paths::relative_to(path, &cwd))
        .unwrap_or_else(|_| path.to_path_buf());
    quote_path(&shown)
}

/// Brings the working directory back to where it was before [`Shell::change_dir`].
///
/// Dropping the guard restores the directory and echoes the move. A failure to
/// restore is logged, since `Drop` cannot report it; call [`DirGuard::restore`]
/// to get the error instead. [`DirGuard::disarm`] hands restoration over to the
/// caller.
#[must_use = "the previous directory is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct DirGuard<'a> {
    shell: &'a Shell,
    previous: PathBuf,
    entered: PathBuf,
    armed: bool,
}

impl DirGuard<'_> {
    /// The working directory before the change.
    pub fn previous(&self) -> &Path {
        &self.previous
    }

    /// The directory that was entered, as it was given.
    pub fn entered(&self) -> &Path {
        &self.entered
    }

    /// Restores the previous directory now.
    pub fn restore(mut self) -> io::Result<()> {
        self.restore_now()
    }

    /// Leaves the working directory where it is and returns the previous one.
    pub fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.previous)
    }

    fn restore_now(&mut self) -> io::Result<()> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;
        self.shell.echo(format!(
            "cd {}  # back from {}",
            quote_path(&self.previous),
            quote_path(&self.entered)
        ));
        env::set_current_dir(&self.previous)
    }
}

impl Drop for DirGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore_now() {
            log::warn!(
                "Could not return to '{}': {}",
                self.previous.display(),
                e
            );
        }
    }
}

/// A temporary directory that is also the current working directory.
///
/// On drop the previous working directory is restored first, then the
/// directory is deleted with everything in it.
#[derive(Debug)]
pub struct TempWorkDir<'a> {
    // Field order matters: the guard must leave the directory before it is removed.
    guard: DirGuard<'a>,
    dir: TempDir,
}

impl TempWorkDir<'_> {
    /// The temporary directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The working directory that will be restored.
    pub fn previous(&self) -> &Path {
        self.guard.previous()
    }

    /// Restores the working directory and deletes the temporary directory,
    /// reporting the first failure.
    pub fn close(self) -> io::Result<()> {
        let Self { guard, dir } = self;
        guard.restore()?;
        dir.close()
    }
}

impl Shell {
    /// The current working directory of the process.
    pub fn working_dir(&self) -> io::Result<PathBuf> {
        env::current_dir()
    }

    /// Creates `path` and any missing parents. An existing directory is fine.
    pub fn ensure_dir(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = path.as_ref();
        self.echo(format!("Ensure dir {}", quote_path(path)));
        fs::create_dir_all(path)?;
        Ok(path.to_path_buf())
    }

    /// Creates a fresh temporary directory, deleted when the handle is dropped.
    pub fn temp_dir(&self, options: &TempDirOptions) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(options.prefix.as_deref().unwrap_or(DEFAULT_TEMP_PREFIX));
        if let Some(suffix) = &options.suffix {
            builder.suffix(suffix);
        }
        let dir = match &options.dir {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        log::debug!("Created temporary directory '{}'", dir.path().display());
        Ok(dir)
    }

    /// Changes the working directory to `path`.
    pub fn change_dir(&self, path: impl AsRef<Path>) -> io::Result<DirGuard<'_>> {
        let path = path.as_ref();
        self.echo(format!("cd {}", quote_path(path)));
        let previous = env::current_dir()?;
        env::set_current_dir(path)?;
        Ok(DirGuard {
            shell: self,
            previous,
            entered: path.to_path_buf(),
            armed: true,
        })
    }

    /// Creates a temporary directory and makes it the working directory.
    pub fn in_temp_dir(&self, options: &TempDirOptions) -> io::Result<TempWorkDir<'_>> {
        let dir = self.temp_dir(options)?;
        let guard = self.change_dir(dir.path())?;
        Ok(TempWorkDir { guard, dir })
    }

    /// Removes files and directory trees. Paths that do not exist are skipped.
    ///
    /// Patterns are taken literally: pass the result of [`Shell::glob`] to
    /// remove by pattern. A symbolic link is removed without touching its target.
    pub fn remove<I, P>(&self, paths: I) -> io::Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let path = path.as_ref();
            self.echo(format!("Removing {}", display_relative(path)));
            match fs::remove_dir_all(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotADirectory => remove_file(path)?,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Joins `components` and applies `options` (see [`PathOptions`]).
    pub fn path<I, P>(&self, components: I, options: &PathOptions) -> io::Result<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths::resolve(paths::join(components), options)
    }

    /// Absolute, normalized form of the joined `components`.
    pub fn abspath<I, P>(&self, components: I) -> io::Result<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.path(components, &PathOptions::absolute())
    }

    /// Replaces the contents of `path` with `data`.
    pub fn write(&self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> io::Result<()> {
        let path = path.as_ref();
        self.echo(format!("Writing {}", display_relative(path)));
        fs::write(path, data)
    }

    /// Makes `path` executable for user, group and others.
    pub fn chmod_x(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        self.echo(format!("chmod +x {}", display_relative(path)));
        let metadata = fs::metadata(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = metadata.permissions();
            permissions.set_mode(permissions.mode() | 0o111);
            fs::set_permissions(path, permissions)?;
        }
        #[cfg(not(unix))]
        let _ = metadata;

        Ok(())
    }

    /// Paths matching `pattern`, sorted.
    ///
    /// Wildcards do not match a leading `.` or a `/`, as in a POSIX shell.
    /// `.` and `..` are never matched by a wildcard. Entries that cannot be
    /// read are skipped.
    pub fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, PatternError> {
        // Hidden entries are filtered below: with a literal leading dot the
        // matcher reports `.` and `..` for `.*` and misses real dotfiles.
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let wanted: Vec<Component<'_>> = Path::new(pattern).components().collect();
        let mut matches: Vec<PathBuf> = glob::glob_with(pattern, options)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    log::debug!("Skipping unreadable glob entry: {}", e);
                    None
                }
            })
            .filter(|path| {
                let mut found: Vec<Component<'_>> = path.components().collect();
                if wanted.first() != Some(&Component::CurDir)
                    && found.first() == Some(&Component::CurDir)
                {
                    found.remove(0);
                }
                spells_hidden(&wanted, &found)
            })
            .collect();
        matches.sort();
        Ok(matches)
    }
}

fn is_hidden(component: &Component<'_>) -> bool {
    component.as_os_str().to_string_lossy().starts_with('.')
}

/// Whether every hidden component of `found` is spelled with a leading `.`
/// by the pattern component it matched. `.` and `..` must be spelled out.
fn spells_hidden(wanted: &[Component<'_>], found: &[Component<'_>]) -> bool {
    match wanted.split_first() {
        None => found.is_empty(),
        Some((first, rest)) if first.as_os_str() == "**" => (0..=found.len())
            .filter_map(|n| found.split_at_checked(n))
            .any(|(skipped, tail)| !skipped.iter().any(is_hidden) && spells_hidden(rest, tail)),
        Some((first, rest)) => match found.split_first() {
            None => false,
            Some((special @ (Component::CurDir | Component::ParentDir), more)) => {
                first.as_os_str() == special.as_os_str() && spells_hidden(rest, more)
            }
            Some((component, more)) => {
                (!is_hidden(component) || is_hidden(first)) && spells_hidden(rest, more)
            }
        },
    }
}

fn remove_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::shell::Sink;
    use tempfile::tempdir;

    fn quiet_shell() -> Shell {
        Shell::new(Sink::null(), Sink::null())
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let root = tempdir().unwrap();
        let (out, out_buf) = Sink::memory();
        let shell = Shell::new(out, Sink::null());
        let target = root.path().join("a").join("b");

        assert_eq!(shell.ensure_dir(&target).unwrap(), target);
        assert!(target.is_dir());
        assert_eq!(shell.ensure_dir(&target).unwrap(), target);
        assert_eq!(
            out_buf.first_line(),
            Some(format!("Ensure dir {}", target.display()))
        );
    }

    #[test]
    fn test_ensure_dir_fails_on_file() {
        let root = tempdir().unwrap();
        let file = root.path().join("file");
        fs::write(&file, "").unwrap();
        assert!(quiet_shell().ensure_dir(&file).is_err());
    }

    #[test]
    fn test_temp_dir_options_and_cleanup() {
        let root = tempdir().unwrap();
        let shell = quiet_shell();
        let options = TempDirOptions::default()
            .prefix("pkg-")
            .suffix(".build")
            .dir(root.path());

        let dir = shell.temp_dir(&options).unwrap();
        let path = dir.path().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pkg-") && name.ends_with(".build"), "{name}");
        assert_eq!(path.parent(), Some(root.path()));

        fs::write(path.join("inner"), "data").unwrap();
        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_dir_default_prefix() {
        let dir = quiet_shell().temp_dir(&TempDirOptions::default()).unwrap();
        let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(DEFAULT_TEMP_PREFIX));
    }

    #[test]
    fn test_remove_files_and_trees() {
        let root = tempdir().unwrap();
        let shell = quiet_shell();
        let dir = root.path().join("dir");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("file"), "").unwrap();
        let file2 = root.path().join("file2");
        fs::write(&file2, "").unwrap();

        shell.remove([&dir]).unwrap();
        shell.remove(Vec::<PathBuf>::new()).unwrap();
        shell.remove(None::<PathBuf>).unwrap();
        shell
            .remove([file2.clone(), root.path().join("file3")])
            .unwrap();

        assert!(!dir.exists());
        assert!(!file2.exists());
    }

    #[test]
    fn test_remove_does_not_expand_patterns() {
        let root = tempdir().unwrap();
        let config = root.path().join("config");
        fs::write(&config, "").unwrap();

        quiet_shell().remove([root.path().join("*")]).unwrap();
        assert!(config.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_symlinked_dir_keeps_target() {
        let root = tempdir().unwrap();
        let target = root.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("kept"), "").unwrap();
        let link = root.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        quiet_shell().remove([&link]).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(target.join("kept").exists());
    }

    #[test]
    fn test_write_replaces_contents() {
        let root = tempdir().unwrap();
        let shell = quiet_shell();
        let file = root.path().join("notes.txt");
        shell.write(&file, "first version").unwrap();
        shell.write(&file, b"second").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "second");
    }

    #[test]
    fn test_write_echo_quotes_path() {
        let root = tempdir().unwrap();
        let (out, out_buf) = Sink::memory();
        let shell = Shell::new(out, Sink::null());
        let file = root.path().join("with space");
        shell.write(&file, "").unwrap();
        let line = out_buf.first_line().unwrap();
        assert!(line.starts_with("Writing '"), "{line}");
        assert!(line.ends_with("with space'"), "{line}");
    }

    #[cfg(unix)]
    #[test]
    fn test_chmod_x() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempdir().unwrap();
        let script = root.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o640)).unwrap();

        quiet_shell().chmod_x(&script).unwrap();
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o751);
    }

    #[test]
    fn test_chmod_x_missing_file() {
        let root = tempdir().unwrap();
        let err = quiet_shell().chmod_x(root.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_glob_skips_hidden_entries() {
        let root = tempdir().unwrap();
        let shell = quiet_shell();
        fs::write(root.path().join(".cache"), "").unwrap();
        fs::write(root.path().join("config"), "").unwrap();
        fs::create_dir(root.path().join("build")).unwrap();
        fs::write(root.path().join("build").join("build.log"), "").unwrap();

        let base = root.path().to_string_lossy().into_owned();
        assert_eq!(
            shell.glob(&format!("{base}/*")).unwrap(),
            vec![root.path().join("build"), root.path().join("config")]
        );
        assert_eq!(
            shell.glob(&format!("{base}/.*")).unwrap(),
            vec![root.path().join(".cache")]
        );
        assert_eq!(
            shell.glob(&format!("{base}/*.log")).unwrap(),
            Vec::<PathBuf>::new()
        );
    }

    #[test]
    fn test_glob_dot_patterns_never_reach_parent() {
        let root = tempdir().unwrap();
        let shell = quiet_shell();
        fs::write(root.path().join(".cache"), "").unwrap();
        fs::write(root.path().join("config"), "").unwrap();
        fs::create_dir(root.path().join(".git")).unwrap();
        fs::write(root.path().join(".git").join("hook.log"), "").unwrap();
        fs::create_dir(root.path().join("build")).unwrap();
        fs::write(root.path().join("build").join("build.log"), "").unwrap();
        let base = root.path().to_string_lossy().into_owned();

        assert_eq!(
            shell.glob(&format!("{base}/.c*")).unwrap(),
            vec![root.path().join(".cache")]
        );
        assert_eq!(
            shell.glob(&format!("{base}/.*")).unwrap(),
            vec![root.path().join(".cache"), root.path().join(".git")]
        );
        assert_eq!(
            shell.glob(&format!("{base}/*/*.log")).unwrap(),
            vec![root.path().join("build").join("build.log")]
        );
        assert_eq!(
            shell.glob(&format!("{base}/**/*.log")).unwrap(),
            vec![root.path().join("build").join("build.log")]
        );
        assert_eq!(
            shell.glob(&format!("{base}/.git/*.log")).unwrap(),
            vec![root.path().join(".git").join("hook.log")]
        );
    }

    #[test]
    fn test_spells_hidden() {
        let parts = |s: &'static str| Path::new(s).components().collect::<Vec<_>>();
        assert!(spells_hidden(&parts(".*"), &parts(".cache")));
        assert!(!spells_hidden(&parts(".*"), &parts("..")));
        assert!(!spells_hidden(&parts("*"), &parts(".cache")));
        assert!(spells_hidden(&parts("../*"), &parts("../config")));
        assert!(!spells_hidden(&parts("**/*"), &parts(".git/config")));
        assert!(spells_hidden(&parts("**/*"), &parts("src/lib.rs")));
    }

    #[test]
    fn test_glob_invalid_pattern() {
        assert!(quiet_shell().glob("[").is_err());
    }

    #[test]
    fn test_path_and_abspath() {
        let shell = quiet_shell();
        assert_eq!(
            shell
                .path(["build", "lib", "mollusc"], &PathOptions::default())
                .unwrap(),
            PathBuf::from("build/lib/mollusc")
        );
        assert_eq!(
            shell
                .path(["/tmp", "gnome-software-RSVW9Y"], &PathOptions::relative_to("/tmp"))
                .unwrap(),
            PathBuf::from("gnome-software-RSVW9Y")
        );
        assert_eq!(
            shell.abspath(["/usr", "bin", "..", "lib"]).unwrap(),
            PathBuf::from("/usr/lib")
        );
    }

    #[test]
    fn test_quote_path() {
        assert_eq!(quote_path(Path::new("plain/path")), "plain/path");
        assert_eq!(quote_path(Path::new("two words")), "'two words'");
    }
}
