//! Transactional package destinations.
//!
//! A destination receives the members of a package and makes them visible
//! all at once. Nothing written between [`Destination::begin`] and
//! [`Destination::end`] is observable at the final location until
//! `end(true)` commits it; `end(false)` throws everything away.
//!
//! ```text
//! Idle --begin--> Open --create_file / create_symlink--> Open
//! Open --end(true)--> commit --> Idle
//! Open --end(false)--> rollback --> Idle
//! ```
//!
//! `begin` and `end` take `&mut self`, so one transaction at a time is
//! enforced by the borrow checker. `create_file` and `create_symlink` take
//! `&self` and may be called from several threads at once, provided callers
//! never use the same name concurrently.

pub mod filesystem;
pub mod writer;

use std::io::Write;

use crate::Result;

pub use filesystem::FileSystemDestination;
pub use writer::FileSystemWriter;

/// A byte sink for one file of a package.
///
/// Dropping a writer without calling [`close`](Self::close) keeps its name
/// registered as open, and the owning destination refuses to `end`.
pub trait DestinationWriter: Write + Sized {
    /// Finishes the file and releases its name.
    ///
    /// The name is released even if finishing the file fails; that error is
    /// returned afterwards. [`FileSystemWriter`] can only observe delayed
    /// write errors when
    /// [`sync_on_close`](crate::DestinationConfig::sync_on_close) is set;
    /// otherwise the file is dropped and errors from closing the descriptor
    /// are lost.
    fn close(self) -> Result<()>;
}

/// Knows how to materialize package members with transactional semantics.
///
/// All names and symlink targets are slash-separated.
pub trait Destination {
    /// Writer returned by [`create_file`](Self::create_file).
    type Writer: DestinationWriter;

    /// Starts a new transaction.
    ///
    /// # Errors
    ///
    /// Returns `PackageError::AlreadyOpen` if a transaction is in progress,
    /// or an I/O error if the staging area cannot be prepared.
    fn begin(&mut self) -> Result<()>;

    /// Opens a writer for the file `name`, relative to the package root.
    ///
    /// # Errors
    ///
    /// Returns `PackageError::NotOpen`, `PackageError::AlreadyOpenFile`,
    /// `PackageError::InvalidRelativePath`, or an I/O error (including
    /// `AlreadyExists` if the file was already created in this transaction).
    fn create_file(&self, name: &str, executable: bool) -> Result<Self::Writer>;

    /// Creates a symlink `name` pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns `PackageError::NotOpen`, `PackageError::InvalidRelativePath`,
    /// `PackageError::SymlinkEscape` for a relative target leaving the
    /// package, or an I/O error.
    fn create_symlink(&self, name: &str, target: &str) -> Result<()>;

    /// Commits (`success == true`) or discards the transaction.
    ///
    /// # Errors
    ///
    /// Returns `PackageError::NotOpen`, `PackageError::LeakedOpenFiles`, or
    /// the I/O error that prevented the commit.
    fn end(&mut self, success: bool) -> Result<()>;
}
