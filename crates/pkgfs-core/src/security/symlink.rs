//! Symlink target rules shared by scanning and extraction.
//!
//! A package must be self-contained: a relative symlink may never point
//! outside the package root. Absolute targets are a deliberate way to
//! reference system paths (for example a virtualenv linking
//! `/usr/bin/python3`) and are let through.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use super::containment::is_subpath;
use super::containment::relative_to;
use crate::PackageError;
use crate::Result;

/// Applies the scanner's rules to the raw target of the symlink at `link`.
///
/// - an absolute target inside `root` is rewritten relative to the link's
///   own directory, so a manifest never records the host's layout;
/// - an absolute target outside `root` is returned unchanged;
/// - a relative target must resolve inside `root`.
///
/// `link` and `root` must be absolute. `name` is the member name used in
/// errors.
///
/// # Errors
///
/// Returns `PackageError::SymlinkEscape` if a relative target leaves `root`.
///
/// # Examples
///
/// ```
/// use pkgfs_core::security::sanitize_scanned_target;
/// use std::path::Path;
///
/// let target = sanitize_scanned_target(
///     Path::new("/pkg/env/bin/python"),
///     Path::new("/pkg/runtime/python3"),
///     Path::new("/pkg"),
///     "env/bin/python",
/// )?;
/// assert_eq!(target, Path::new("../../runtime/python3"));
///
/// let escape = sanitize_scanned_target(
///     Path::new("/pkg/a/link"),
///     Path::new("../../etc/passwd"),
///     Path::new("/pkg"),
///     "a/link",
/// );
/// assert!(escape.is_err());
/// # Ok::<(), pkgfs_core::PackageError>(())
/// ```
pub fn sanitize_scanned_target(
    link: &Path,
    target: &Path,
    root: &Path,
    name: &str,
) -> Result<PathBuf> {
    let link_dir = link.parent().unwrap_or(root);

    if target.is_absolute() {
        if is_subpath(target, root) {
            // Only fails when the paths share no root, which `is_subpath`
            // already ruled out.
            if let Some(relative) = relative_to(target, link_dir) {
                return Ok(relative);
            }
        }
        return Ok(target.to_path_buf());
    }

    if !is_subpath(&link_dir.join(target), root) {
        return Err(PackageError::SymlinkEscape {
            name: name.to_owned(),
        });
    }
    Ok(target.to_path_buf())
}

/// Checks a symlink about to be created at `link` inside the staging tree
/// `out_root`.
///
/// Relative targets are resolved against the link's directory and must stay
/// inside `out_root`; absolute targets are trusted to the caller.
///
/// # Errors
///
/// Returns `PackageError::SymlinkEscape` if a relative target leaves
/// `out_root`.
pub fn validate_staged_target(
    link: &Path,
    target: &Path,
    out_root: &Path,
    name: &str,
) -> Result<()> {
    if target.is_absolute() {
        return Ok(());
    }

    let link_dir = link.parent().unwrap_or(out_root);
    if is_subpath(&link_dir.join(target), out_root) {
        Ok(())
    } else {
        Err(PackageError::SymlinkEscape {
            name: name.to_owned(),
        })
    }
}

/// Verifies that no existing directory between `root` and `path` is a
/// symlink.
///
/// Without this check a previously staged symlink `lib -> /etc` would let a
/// later member named `lib/passwd` be written outside the staging tree.
/// Components that do not exist yet are fine: they will be created as real
/// directories.
///
/// # Errors
///
/// Returns `PackageError::SymlinkEscape` if an ancestor is a symlink, or an
/// I/O error if an ancestor cannot be inspected.
pub fn verify_parent_chain(root: &Path, path: &Path, name: &str) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let Ok(relative) = parent.strip_prefix(root) else {
        return Err(PackageError::InvalidRelativePath {
            name: name.to_owned(),
        });
    };

    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(PackageError::SymlinkEscape {
                    name: name.to_owned(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
