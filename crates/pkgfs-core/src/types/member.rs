//! Package members: the files and symlinks that make up a package.

use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::PackageError;
use crate::Result;

/// One entry of a package manifest.
///
/// Names are slash-separated and relative to the package root regardless of
/// the host platform. Directories are never members, so empty directories
/// cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// A regular file.
    File(FileMember),
    /// A symbolic link.
    Symlink(SymlinkMember),
}

/// A regular file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMember {
    name: String,
    size: u64,
    executable: bool,
    source: PathBuf,
}

/// A symbolic link with a slash-separated target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkMember {
    name: String,
    target: String,
}

impl FileMember {
    /// Describes a regular file whose content lives at `source`.
    pub fn new(name: impl Into<String>, size: u64, executable: bool, source: PathBuf) -> Self {
        Self {
            name: name.into(),
            size,
            executable,
            source,
        }
    }

    /// Slash-separated path relative to the package root.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes at scan time.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the owner-execute bit was set.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.executable
    }

    /// Absolute path of the file on the scanned host.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Opens the file content for reading.
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.source)
    }
}

impl SymlinkMember {
    /// Describes a symlink pointing at `target`.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    /// Slash-separated path relative to the package root.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slash-separated link target, relative or absolute.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Member {
    /// Slash-separated path relative to the package root.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File(file) => file.name(),
            Self::Symlink(link) => link.name(),
        }
    }

    /// File size; 0 for symlinks.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::File(file) => file.size(),
            Self::Symlink(_) => 0,
        }
    }

    /// Executable bit; always false for symlinks.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::File(file) if file.is_executable())
    }

    /// Returns `true` for symlinks.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink(_))
    }

    /// Link target, if this member is a symlink.
    #[must_use]
    pub fn symlink_target(&self) -> Option<&str> {
        match self {
            Self::File(_) => None,
            Self::Symlink(link) => Some(link.target()),
        }
    }

    /// Opens the content of a regular file.
    ///
    /// # Errors
    ///
    /// Returns `PackageError::NotAFile` for symlinks, or the I/O error from
    /// opening the file.
    pub fn open(&self) -> Result<File> {
        match self {
            Self::File(file) => Ok(file.open()?),
            Self::Symlink(link) => Err(PackageError::NotAFile {
                name: link.name().to_owned(),
            }),
        }
    }
}

impl From<FileMember> for Member {
    fn from(file: FileMember) -> Self {
        Self::File(file)
    }
}

impl From<SymlinkMember> for Member {
    fn from(link: SymlinkMember) -> Self {
        Self::Symlink(link)
    }
}
