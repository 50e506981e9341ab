//! Executable lookup on the search path.
//!
//! Resolution is best effort: when nothing is found the bare name is returned
//! and the spawn performs its own lookup. On Windows `which` applies the
//! `PATHEXT` suffixes.

use std::ffi::OsStr;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Resolve `name` against the current `PATH`.
pub fn resolve(name: &str) -> PathBuf {
    if is_path_like(name) {
        return PathBuf::from(name);
    }

    which::which(name).unwrap_or_else(|e| {
        tracing::debug!("{} not found on PATH ({}), leaving lookup to the spawn", name, e);
        PathBuf::from(name)
    })
}

/// Resolve `name` against an explicit search path.
pub fn resolve_in(name: &str, search_path: &OsStr, cwd: &Path) -> PathBuf {
    if is_path_like(name) {
        return PathBuf::from(name);
    }

    which::which_in(name, Some(search_path), cwd).unwrap_or_else(|_| PathBuf::from(name))
}

/// Names with a separator are used as given.
fn is_path_like(name: &str) -> bool {
    name.is_empty()
        || name.contains(MAIN_SEPARATOR)
        || name.contains('/')
        || Path::new(name).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use tempfile::TempDir;

    fn search_path(dirs: &[&Path]) -> OsString {
        std::env::join_paths(dirs).unwrap()
    }

    #[cfg(unix)]
    fn executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;

        fs::write(path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_first_directory_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        executable(&first.path().join("node"));
        executable(&second.path().join("node"));

        let path = search_path(&[first.path(), second.path()]);
        assert_eq!(
            resolve_in("node", &path, first.path()),
            first.path().join("node")
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_non_executable_is_skipped() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join("bun"), "").unwrap();
        executable(&second.path().join("bun"));

        let path = search_path(&[first.path(), second.path()]);
        assert_eq!(
            resolve_in("bun", &path, first.path()),
            second.path().join("bun")
        );
    }

    #[test]
    fn test_not_found_returns_bare_name() {
        let dir = TempDir::new().unwrap();
        let path = search_path(&[dir.path()]);
        assert_eq!(
            resolve_in("deno", &path, dir.path()),
            PathBuf::from("deno")
        );
    }

    #[test]
    fn test_path_like_names_are_untouched() {
        let dir = TempDir::new().unwrap();
        let path = OsString::from("/usr/bin");
        assert_eq!(
            resolve_in("./bin/server", &path, dir.path()),
            PathBuf::from("./bin/server")
        );
        assert_eq!(resolve("./bin/server"), PathBuf::from("./bin/server"));
    }

    #[test]
    fn test_resolve_missing_runtime() {
        assert_eq!(
            resolve("jopin-no-such-runtime"),
            PathBuf::from("jopin-no-such-runtime")
        );
    }
}
