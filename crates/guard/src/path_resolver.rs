//! Path normalisation against a session working directory.
//!
//! Resolution never fails: anything that cannot be canonicalised on disk is
//! normalised lexically instead, so callers on the hot path always get an
//! absolute path back.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` or `~/` to the invoking user's home directory.
///
/// `~user` forms are left untouched, as is everything when `HOME` is unset.
pub fn expand_tilde(path: &str) -> PathBuf {
    let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) else {
        return PathBuf::from(path);
    };

    if path == "~" {
        return PathBuf::from(home);
    }

    match path.strip_prefix("~/") {
        Some(rest) => PathBuf::from(home).join(rest),
        None => PathBuf::from(path),
    }
}

/// Resolve `path` into an absolute, canonical path.
///
/// Relative paths are joined onto `base` (itself tilde-expanded), or onto the
/// process working directory when no base is given.
pub fn resolve_path(path: &str, base: Option<&str>) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() {
        return canonicalize_lossy(&expanded);
    }

    let base = match base.filter(|b| !b.is_empty()) {
        Some(base) => {
            let base = expand_tilde(base);
            if base.is_absolute() {
                base
            } else {
                current_dir().join(base)
            }
        }
        None => current_dir(),
    };

    canonicalize_lossy(&base.join(expanded))
}

/// Canonicalise a path that may not exist.
///
/// `.` and `..` are collapsed lexically, then symlinks are resolved for the
/// longest prefix that exists on disk and the remaining components are
/// appended unchanged.
pub fn canonicalize_lossy(path: &Path) -> PathBuf {
    let normalized = normalize_lexically(path);

    let mut existing = normalized.as_path();
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        if let Ok(mut canonical) = fs::canonicalize(existing) {
            for component in tail.iter().rev() {
                canonical.push(component);
            }
            return canonical;
        }

        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Containment test on canonical paths.
///
/// Comparison is per component, so `/ws/conv-1` is never inside `/ws/conv-12`
/// even though one is a string prefix of the other.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    path == dir || path.starts_with(dir)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}
