//! Building blocks for an immutable package store on the local filesystem.
//!
//! `pkgfs-core` covers three concerns:
//!
//! - validating package identities ([`Pin`], package names, instance IDs and
//!   [`InstanceTag`]s);
//! - scanning a directory tree into a flat list of [`Member`]s whose names are
//!   relative to a package root ([`scan_file_system`]);
//! - extracting members into a directory with all-or-nothing visibility
//!   ([`FileSystemDestination`], [`extract_members`]).
//!
//! Symlinks are confined on both sides: a relative symlink target may never
//! leave the package root, neither when scanning nor when extracting.
//!
//! # Examples
//!
//! ```no_run
//! use pkgfs_core::FileSystemDestination;
//! use pkgfs_core::extract_members;
//! use pkgfs_core::no_exclusions;
//! use pkgfs_core::scan_file_system;
//! use pkgfs_core::validate_package_name;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), pkgfs_core::PackageError> {
//! validate_package_name("infra/tools/cipd")?;
//!
//! let build = Path::new("/build/out");
//! let members = scan_file_system(build, build, no_exclusions)?;
//!
//! let mut dest = FileSystemDestination::new("/opt/pkgs/cipd");
//! let report = extract_members(&members, &mut dest)?;
//! println!("Extracted {} files", report.files_extracted);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod destination;
pub mod error;
pub mod extract;
pub mod scan;
pub mod security;
pub mod types;

// Re-export main API types
pub use config::DestinationConfig;
pub use destination::Destination;
pub use destination::DestinationWriter;
pub use destination::FileSystemDestination;
pub use destination::FileSystemWriter;
pub use error::PackageError;
pub use error::Result;
pub use extract::ExtractionReport;
pub use extract::extract_members;
pub use scan::no_exclusions;
pub use scan::scan_file_system;
pub use scan::wrap_file;

// Re-export types module for easier access
pub use types::FileMember;
pub use types::InstanceTag;
pub use types::Member;
pub use types::Pin;
pub use types::SymlinkMember;
pub use types::validate_instance_id;
pub use types::validate_instance_tag;
pub use types::validate_package_name;
pub use types::validate_pin;
