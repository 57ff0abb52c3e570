//! Error types for package scanning, validation and extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `PackageError`.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Errors that can occur while validating identities, scanning a package
/// tree, or extracting a package onto disk.
#[derive(Error, Debug)]
pub enum PackageError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Package name does not match the `segment(/segment)*` grammar.
    #[error("invalid package name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// Instance ID is not a 40-character lowercase hex digest.
    #[error("invalid package instance ID {id:?}: {reason}")]
    InvalidInstanceId {
        /// The rejected instance ID.
        id: String,
        /// Why the ID was rejected.
        reason: String,
    },

    /// Instance tag is not a well-formed `key:value` pair.
    #[error("invalid instance tag {tag:?}: {reason}")]
    InvalidTag {
        /// The rejected tag.
        tag: String,
        /// Why the tag was rejected.
        reason: String,
    },

    /// A path lies outside the root it must be confined to.
    #[error("{} is not under root {}", path.display(), root.display())]
    OutsideRoot {
        /// The offending path.
        path: PathBuf,
        /// The root it was expected to be under.
        root: PathBuf,
    },

    /// A path that must be absolute was given as a relative path.
    #[error("expecting an absolute path, got {}", path.display())]
    NotAbsolute {
        /// The relative path.
        path: PathBuf,
    },

    /// Entry is neither a regular file nor a symlink.
    #[error("not a regular file or symlink: {}", path.display())]
    UnsupportedFileType {
        /// The unsupported entry.
        path: PathBuf,
    },

    /// A relative symlink (or a staged parent symlink) would lead outside the
    /// package root.
    #[error("symlink escapes package root: {name}")]
    SymlinkEscape {
        /// Slash-separated name of the offending member.
        name: String,
    },

    /// Member name is not a well-formed relative path inside the output root.
    #[error("invalid relative file name: {name:?}")]
    InvalidRelativePath {
        /// The rejected name.
        name: String,
    },

    /// `begin` was called on a destination with an open transaction.
    #[error("destination is already open")]
    AlreadyOpen,

    /// `create_file` was called for a name whose writer is still open.
    #[error("file {name} is already open")]
    AlreadyOpenFile {
        /// Slash-separated name of the file.
        name: String,
    },

    /// The destination has no open transaction.
    #[error("destination is not open")]
    NotOpen,

    /// `end` was called while some writers were never closed.
    #[error("not all files were closed, leaking: {}", names.join(", "))]
    LeakedOpenFiles {
        /// Names of the writers still open, sorted.
        names: Vec<String>,
    },

    /// Content was requested from a member that is not a regular file.
    #[error("not a regular file: {name}")]
    NotAFile {
        /// Slash-separated name of the member.
        name: String,
    },
}

impl PackageError {
    /// Returns `true` if this error means a path tried to leave the root it
    /// is confined to.
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgfs_core::PackageError;
    ///
    /// let err = PackageError::SymlinkEscape {
    ///     name: "bin/python".into(),
    /// };
    /// assert!(err.is_security_violation());
    ///
    /// let err = PackageError::NotOpen;
    /// assert!(!err.is_security_violation());
    /// ```
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::OutsideRoot { .. } | Self::SymlinkEscape { .. } | Self::InvalidRelativePath { .. }
        )
    }

    /// Returns `true` for syntax errors in package names, instance IDs and
    /// tags.
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidName { .. } | Self::InvalidInstanceId { .. } | Self::InvalidTag { .. }
        )
    }

    /// Returns `true` if the destination transaction was driven out of order.
    #[must_use]
    pub const fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyOpen
                | Self::AlreadyOpenFile { .. }
                | Self::NotOpen
                | Self::LeakedOpenFiles { .. }
        )
    }
}
