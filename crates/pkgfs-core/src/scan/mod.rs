//! Enumerating a directory tree into package members.
//!
//! The scanner walks a source directory and returns every regular file and
//! symlink below it as a [`Member`](crate::Member) whose name is relative to
//! a declared root. Directory entries themselves are never members.

pub mod walker;
pub mod wrap;

pub use walker::no_exclusions;
pub use walker::scan_file_system;
pub use wrap::wrap_file;
