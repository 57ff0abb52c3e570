//! Path containment: the single primitive deciding whether a path stays
//! inside a root directory.
//!
//! Both the scanner and the transactional destination go through
//! [`is_subpath`]. Normalization is purely lexical (like `filepath.Clean` in
//! other ecosystems): symlinks are not resolved, because the paths being
//! checked usually do not exist yet.

use std::io;
use std::path::Component;
use std::path::MAIN_SEPARATOR;
use std::path::MAIN_SEPARATOR_STR;
use std::path::Path;
use std::path::PathBuf;

/// Returns `true` if `path` is `root` or lies inside a subdirectory of
/// `root`.
///
/// Both paths are independently made absolute (relative paths resolve
/// against the current directory) and lexically normalized before the
/// comparison. The comparison is per component, so `/pkg-old` is never
/// considered to be inside `/pkg`. If either path cannot be made absolute
/// the answer is `false`.
///
/// # Examples
///
/// ```
/// use pkgfs_core::security::is_subpath;
/// use std::path::Path;
///
/// assert!(is_subpath(Path::new("/pkg/a/b"), Path::new("/pkg")));
/// assert!(is_subpath(Path::new("/pkg"), Path::new("/pkg/")));
/// assert!(is_subpath(Path::new("/pkg/a/../b"), Path::new("/pkg")));
/// assert!(!is_subpath(Path::new("/pkg/../etc"), Path::new("/pkg")));
/// assert!(!is_subpath(Path::new("/pkg-old"), Path::new("/pkg")));
/// ```
#[must_use]
pub fn is_subpath(path: &Path, root: &Path) -> bool {
    match (absolutize(path), absolutize(root)) {
        (Ok(path), Ok(root)) => path.starts_with(&root),
        _ => false,
    }
}

/// Makes `path` absolute and lexically normalized.
///
/// # Errors
///
/// Returns an error if `path` is empty or the current directory cannot be
/// determined.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    Ok(normalize_lexically(&absolute))
}

/// Removes `.` components and folds `..` into the preceding component
/// without touching the filesystem.
///
/// `..` directly under the root is dropped (`/..` is `/`); leading `..` of
/// a relative path are preserved.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::with_capacity(path.components().count());

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::ParentDir) | None => parts.push(component),
                // `..` at the root stays at the root.
                Some(_) => {}
            },
            _ => parts.push(component),
        }
    }

    parts.iter().collect()
}

/// Computes the path that leads from directory `base` to `target`, using
/// `..` where needed.
///
/// Returns `.` when both are the same directory and `None` when the two
/// paths share no root (different drives on Windows).
///
/// # Examples
///
/// ```
/// use pkgfs_core::security::relative_to;
/// use std::path::Path;
///
/// let rel = relative_to(Path::new("/pkg/bin/python3"), Path::new("/pkg/env/bin"));
/// assert_eq!(rel.as_deref(), Some(Path::new("../../bin/python3")));
/// ```
#[must_use]
pub fn relative_to(target: &Path, base: &Path) -> Option<PathBuf> {
    let target = absolutize(target).ok()?;
    let base = absolutize(base).ok()?;

    let mut target_parts = target.components().peekable();
    let mut base_parts = base.components().peekable();

    // Roots and prefixes must agree, otherwise there is no relative route.
    while let (Some(t), Some(b)) = (target_parts.peek(), base_parts.peek()) {
        if t != b {
            if !matches!(t, Component::Normal(_)) || !matches!(b, Component::Normal(_)) {
                return None;
            }
            break;
        }
        target_parts.next();
        base_parts.next();
    }

    let mut relative: PathBuf = base_parts.map(|_| Component::ParentDir).collect();
    relative.extend(target_parts);

    if relative.as_os_str().is_empty() {
        relative.push(Component::CurDir);
    }
    Some(relative)
}

/// Converts a native path into its slash-separated form.
///
/// Returns `None` if the path is not valid UTF-8.
#[must_use]
pub fn to_slash(path: &Path) -> Option<String> {
    let native = path.to_str()?;
    if MAIN_SEPARATOR == '/' {
        Some(native.to_owned())
    } else {
        Some(native.replace(MAIN_SEPARATOR_STR, "/"))
    }
}

/// Converts a slash-separated path into the host's native form.
#[must_use]
pub fn from_slash(path: &str) -> PathBuf {
    if MAIN_SEPARATOR == '/' {
        PathBuf::from(path)
    } else {
        PathBuf::from(path.replace('/', MAIN_SEPARATOR_STR))
    }
}
