// src/core/paths.rs

use std::env;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors from building [`PathOptions`] out of untyped input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    /// Keys that `path` does not understand, in the order given.
    #[error("Unknown path options {0:?}. The only supported option is 'rel'.")]
    UnknownOptions(Vec<String>),
}

/// How [`resolve`] treats a joined path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Rel {
    /// Return the joined path as is.
    #[default]
    Unset,
    /// Relative to the current working directory.
    Cwd,
    /// Absolute and lexically normalized.
    Absolute,
    /// Relative to the given base directory.
    Base(PathBuf),
}

/// Options accepted by `Shell::path`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathOptions {
    /// What the joined path is made relative (or absolute) to.
    pub rel: Rel,
}

impl PathOptions {
    /// Relativize against the current working directory.
    pub fn relative() -> Self {
        Self { rel: Rel::Cwd }
    }

    /// Make the path absolute.
    pub fn absolute() -> Self {
        Self { rel: Rel::Absolute }
    }

    /// Relativize against `base`.
    pub fn relative_to(base: impl Into<PathBuf>) -> Self {
        Self {
            rel: Rel::Base(base.into()),
        }
    }

    /// Builds options from loosely typed `key=value` pairs (e.g. from a command line).
    ///
    /// `rel` takes `true`, `false` or a base directory. Every unknown key is
    /// collected and reported at once.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        let mut unknown = Vec::new();

        for (key, value) in pairs {
            match key.as_ref() {
                "rel" => {
                    options.rel = match value.as_ref() {
                        "true" => Rel::Cwd,
                        "false" => Rel::Absolute,
                        base => Rel::Base(PathBuf::from(base)),
                    }
                }
                other => unknown.push(other.to_string()),
            }
        }

        if unknown.is_empty() {
            Ok(options)
        } else {
            Err(PathError::UnknownOptions(unknown))
        }
    }
}

/// Joins path components. Absolute components restart the path, as usual.
pub fn join<I, P>(components: I) -> PathBuf
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    components.into_iter().collect()
}

/// Removes `.` and folds `..` without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `..` at the root is the root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        PathBuf::from(".")
    } else {
        parts.iter().collect()
    }
}

/// The absolute, normalized form of `path`, anchored at the current directory.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&env::current_dir()?.join(path)))
    }
}

/// `path` expressed relative to `base`. Both are made absolute first.
///
/// When the two share no root (different drives on Windows) the absolute
/// path is returned.
pub fn relative_to(path: &Path, base: &Path) -> io::Result<PathBuf> {
    let path = absolutize(path)?;
    let base = absolutize(base)?;

    let path_parts: Vec<_> = path.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    if path_parts.first() != base_parts.first() {
        return Ok(path);
    }

    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in path_parts.iter().skip(common) {
        relative.push(part);
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    Ok(relative)
}

/// Applies `options` to an already joined path.
pub fn resolve(path: PathBuf, options: &PathOptions) -> io::Result<PathBuf> {
    match &options.rel {
        Rel::Unset => Ok(path),
        Rel::Cwd => relative_to(&path, &env::current_dir()?),
        Rel::Absolute => absolutize(&path),
        Rel::Base(base) => relative_to(&path, base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join(["/usr", "bin", "env"]), PathBuf::from("/usr/bin/env"));
        assert_eq!(
            join(["build", "lib", "mollusc"]),
            PathBuf::from("build/lib/mollusc")
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("../a/..")), PathBuf::from(".."));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_relative_to_base() {
        assert_eq!(
            relative_to(Path::new("/tmp/gnome-software-RSVW9Y"), Path::new("/tmp")).unwrap(),
            PathBuf::from("gnome-software-RSVW9Y")
        );
        assert_eq!(
            relative_to(Path::new("/a/b/c"), Path::new("/a/d")).unwrap(),
            PathBuf::from("../b/c")
        );
        assert_eq!(
            relative_to(Path::new("/a/b"), Path::new("/a/b/")).unwrap(),
            PathBuf::from(".")
        );
    }

    #[test]
    fn test_resolve_relative_to_cwd() {
        let cwd = env::current_dir().unwrap();
        let path = join([cwd.as_path(), Path::new("dist")]);
        assert_eq!(
            resolve(path, &PathOptions::relative()).unwrap(),
            PathBuf::from("dist")
        );
    }

    #[test]
    fn test_resolve_absolute() {
        let cwd = env::current_dir().unwrap();
        assert_eq!(
            resolve(PathBuf::from(".travis.yml"), &PathOptions::absolute()).unwrap(),
            cwd.join(".travis.yml")
        );
    }

    #[test]
    fn test_resolve_unset_keeps_path() {
        assert_eq!(
            resolve(PathBuf::from("a/../b"), &PathOptions::default()).unwrap(),
            PathBuf::from("a/../b")
        );
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(
            PathOptions::parse([("rel", "true")]).unwrap(),
            PathOptions::relative()
        );
        assert_eq!(
            PathOptions::parse([("rel", "false")]).unwrap(),
            PathOptions::absolute()
        );
        assert_eq!(
            PathOptions::parse([("rel", "/tmp")]).unwrap(),
            PathOptions::relative_to("/tmp")
        );
        assert_eq!(
            PathOptions::parse(Vec::<(String, String)>::new()).unwrap(),
            PathOptions::default()
        );
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        let err = PathOptions::parse([("abs", "true"), ("rel", "true"), ("base", "/")]).unwrap_err();
        assert_eq!(
            err,
            PathError::UnknownOptions(vec!["abs".to_string(), "base".to_string()])
        );
        assert!(err.to_string().starts_with(r#"Unknown path options ["abs", "base"]"#));
    }
}
