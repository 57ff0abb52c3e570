//! Classification of a single filesystem entry into a package member.

use std::fs;
use std::fs::Metadata;
use std::path::Path;

use crate::PackageError;
use crate::Result;
use crate::security::absolutize;
use crate::security::is_subpath;
use crate::security::sanitize_scanned_target;
use crate::security::to_slash;
use crate::types::FileMember;
use crate::types::Member;
use crate::types::SymlinkMember;

/// Builds a [`Member`] for the entry at `abs`, named relative to `root`.
///
/// Symlinks are recognized as such and never followed; their targets go
/// through [`sanitize_scanned_target`]. If `metadata` is `None` the entry is
/// inspected with `symlink_metadata` (lstat).
///
/// # Errors
///
/// - `PackageError::NotAbsolute` if `abs` or `root` is relative
/// - `PackageError::OutsideRoot` if `abs` is not under `root`
/// - `PackageError::InvalidRelativePath` if `abs` is `root` itself or the
///   name or link target is not valid UTF-8
/// - `PackageError::SymlinkEscape` for a relative link leaving `root`
/// - `PackageError::UnsupportedFileType` for anything but a regular file or
///   symlink
///
/// # Examples
///
/// ```no_run
/// use pkgfs_core::scan::wrap_file;
/// use std::path::Path;
///
/// let member = wrap_file(Path::new("/pkg/bin/tool"), Path::new("/pkg"), None)?;
/// assert_eq!(member.name(), "bin/tool");
/// # Ok::<(), pkgfs_core::PackageError>(())
/// ```
pub fn wrap_file(abs: &Path, root: &Path, metadata: Option<&Metadata>) -> Result<Member> {
    for path in [abs, root] {
        if !path.is_absolute() {
            return Err(PackageError::NotAbsolute {
                path: path.to_path_buf(),
            });
        }
    }
    if !is_subpath(abs, root) {
        return Err(PackageError::OutsideRoot {
            path: abs.to_path_buf(),
            root: root.to_path_buf(),
        });
    }

    let abs = absolutize(abs)?;
    let root = absolutize(root)?;

    let looked_up;
    let metadata = if let Some(metadata) = metadata {
        metadata
    } else {
        looked_up = fs::symlink_metadata(&abs)?;
        &looked_up
    };

    let relative = abs.strip_prefix(&root).unwrap_or(Path::new(""));
    let name = to_slash(relative)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| PackageError::InvalidRelativePath {
            name: relative.to_string_lossy().into_owned(),
        })?;

    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        let raw = fs::read_link(&abs)?;
        let target = sanitize_scanned_target(&abs, &raw, &root, &name)?;
        let target = to_slash(&target).ok_or_else(|| PackageError::InvalidRelativePath {
            name: name.clone(),
        })?;
        return Ok(SymlinkMember::new(name, target).into());
    }

    if file_type.is_file() {
        return Ok(FileMember::new(name, metadata.len(), is_owner_executable(metadata), abs).into());
    }

    Err(PackageError::UnsupportedFileType { path: abs })
}

/// Reads the owner-execute permission bit.
#[cfg(unix)]
fn is_owner_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_owner_executable(_metadata: &Metadata) -> bool {
    false
}
