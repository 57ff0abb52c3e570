//! Driving a [`Destination`] from a list of package members.

use std::io;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::warn;

use crate::Destination;
use crate::DestinationWriter;
use crate::Member;
use crate::Result;

/// Report of a package extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Number of regular files written.
    pub files_extracted: usize,

    /// Number of symlinks created.
    pub symlinks_created: usize,

    /// Total bytes copied into files.
    pub bytes_written: u64,

    /// Wall time from `begin` to the end of the commit.
    pub duration: Duration,
}

impl ExtractionReport {
    /// Creates a new empty extraction report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns total number of members materialized.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.files_extracted + self.symlinks_created
    }
}

/// Extracts `members` into `dest` as one transaction.
///
/// File contents are read through [`Member::open`]. On any failure the
/// transaction is rolled back and the first error is returned; whatever was
/// at the destination before stays untouched.
///
/// # Errors
///
/// Returns the error from `begin`, from materializing a member, or from the
/// final commit.
///
/// # Examples
///
/// ```no_run
/// use pkgfs_core::FileSystemDestination;
/// use pkgfs_core::extract_members;
/// use pkgfs_core::no_exclusions;
/// use pkgfs_core::scan_file_system;
/// use std::path::Path;
///
/// # fn main() -> Result<(), pkgfs_core::PackageError> {
/// let src = Path::new("/build/out");
/// let members = scan_file_system(src, src, no_exclusions)?;
///
/// let mut dest = FileSystemDestination::new("/opt/pkgs/tool");
/// let report = extract_members(&members, &mut dest)?;
/// println!("installed {} files", report.files_extracted);
/// # Ok(())
/// # }
/// ```
pub fn extract_members<D: Destination>(members: &[Member], dest: &mut D) -> Result<ExtractionReport> {
    let start = Instant::now();
    let mut report = ExtractionReport::new();

    dest.begin()?;

    let written = members
        .iter()
        .try_for_each(|member| materialize(member, &*dest, &mut report));
    if let Err(e) = written {
        if let Err(rollback) = dest.end(false) {
            warn!(error = %rollback, "failed to roll back extraction");
        }
        return Err(e);
    }

    dest.end(true)?;
    report.duration = start.elapsed();

    debug!(
        files = report.files_extracted,
        symlinks = report.symlinks_created,
        bytes = report.bytes_written,
        "extracted package"
    );
    Ok(report)
}

fn materialize<D: Destination>(member: &Member, dest: &D, report: &mut ExtractionReport) -> Result<()> {
    match member {
        Member::File(file) => {
            let mut source = file.open()?;
            let mut writer = dest.create_file(file.name(), file.is_executable())?;

            // Close before looking at the copy result so a failed copy never
            // leaves the name registered.
            let copied = io::copy(&mut source, &mut writer);
            writer.close()?;

            report.bytes_written += copied?;
            report.files_extracted += 1;
        }
        Member::Symlink(link) => {
            dest.create_symlink(link.name(), link.target())?;
            report.symlinks_created += 1;
        }
    }
    Ok(())
}
