//! Directory tree walking for package creation.

use std::io;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::wrap::wrap_file;
use crate::PackageError;
use crate::Result;
use crate::security::absolutize;
use crate::security::is_subpath;
use crate::types::Member;

/// Exclusion filter that keeps everything.
///
/// # Examples
///
/// ```no_run
/// use pkgfs_core::scan::no_exclusions;
/// use pkgfs_core::scan::scan_file_system;
/// use std::path::Path;
///
/// let members = scan_file_system(Path::new("/src/pkg"), Path::new("/src/pkg"), no_exclusions)?;
/// # Ok::<(), pkgfs_core::PackageError>(())
/// ```
#[must_use]
pub fn no_exclusions(_path: &Path) -> bool {
    false
}

/// Returns all files and symlinks under `dir`, named relative to `root`.
///
/// - `dir` must be `root` or a directory below it.
/// - Entries are visited in file-name order at every directory level, so
///   the result is reproducible for the same tree.
/// - Directories are never returned; empty directories are invisible.
/// - Symlinks are not followed, not even when `dir` itself is one; they
///   become [`Member::Symlink`]. `root` itself is never a member.
/// - `exclude` is called with the absolute path of every entry except `dir`
///   itself. Returning `true` for a directory skips its whole subtree.
/// - Sockets, pipes and device nodes are silently skipped.
///
/// Relative `dir` and `root` are resolved against the current directory.
///
/// # Errors
///
/// - `PackageError::OutsideRoot` if `dir` is not under `root`
/// - `PackageError::SymlinkEscape` if a relative symlink leaves `root`
/// - I/O errors from reading directories, metadata or link targets
///
/// # Examples
///
/// ```no_run
/// use pkgfs_core::scan::scan_file_system;
/// use std::path::Path;
///
/// let root = Path::new("/build/out");
/// let members = scan_file_system(root, root, |path: &Path| {
///     path.extension().is_some_and(|ext| ext == "pyc")
/// })?;
/// for member in &members {
///     println!("{}", member.name());
/// }
/// # Ok::<(), pkgfs_core::PackageError>(())
/// ```
pub fn scan_file_system<F>(dir: &Path, root: &Path, exclude: F) -> Result<Vec<Member>>
where
    F: Fn(&Path) -> bool,
{
    let root = absolutize(root)?;
    let dir = absolutize(dir)?;
    if !is_subpath(&dir, &root) {
        return Err(PackageError::OutsideRoot { path: dir, root });
    }

    let walker = WalkDir::new(&dir)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !exclude(entry.path()));

    let mut members = Vec::new();
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let file_type = entry.file_type();
        if entry.depth() == 0 && dir == root {
            continue;
        }
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }
        let metadata = entry.metadata().map_err(io::Error::from)?;
        members.push(wrap_file(entry.path(), &root, Some(&metadata))?);
    }

    debug!(
        dir = %dir.display(),
        root = %root.display(),
        members = members.len(),
        "scanned package tree"
    );
    Ok(members)
}
