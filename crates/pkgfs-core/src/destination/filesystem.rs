//! Directory-backed destination with an atomic rename commit.

use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use tempfile::TempDir;
use tracing::debug;
use tracing::warn;

use super::Destination;
use super::writer::FileSystemWriter;
use super::writer::OpenFiles;
use super::writer::lock;
use crate::DestinationConfig;
use crate::PackageError;
use crate::Result;
use crate::security::absolutize;
use crate::security::from_slash;
use crate::security::is_subpath;
use crate::security::normalize_lexically;
use crate::security::validate_staged_target;
use crate::security::verify_parent_chain;

/// Subdirectory of the staging root that mirrors the final layout.
const OUT_DIR: &str = "out";

/// Where a previous installation is parked while the new one is renamed in.
const OLD_DIR: &str = "old";

/// Staging area of an open transaction.
///
/// `root` is removed when this value is discarded or dropped, whichever
/// path the transaction takes.
#[derive(Debug)]
struct Staging {
    root: TempDir,
    out: PathBuf,
}

impl Staging {
    /// Creates `<parent>/<base>_XXXXXX/out`. A failure after the temporary
    /// directory exists removes it again.
    fn create(parent: &Path, base: &str) -> io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(&format!("{base}_"))
            .tempdir_in(parent)?;
        let out = root.path().join(OUT_DIR);
        fs::create_dir(&out)?;
        Ok(Self { root, out })
    }

    fn discard(self) {
        let path = self.root.path().to_path_buf();
        if let Err(e) = self.root.close() {
            warn!(staging = %path.display(), error = %e, "failed to remove staging directory");
        }
    }
}

/// Extracts a package into a directory on the local filesystem.
///
/// Files are staged in a temporary directory created next to the
/// destination (same parent, so the commit is a rename on one filesystem).
/// `end(true)` parks any previous installation inside the staging area,
/// renames the staged tree into place and then deletes the staging area,
/// previous installation included. Readers of the destination see either the
/// old tree or the complete new one.
///
/// Dropping a destination with an open transaction discards the staging
/// area.
///
/// # Examples
///
/// ```no_run
/// use pkgfs_core::Destination;
/// use pkgfs_core::DestinationWriter;
/// use pkgfs_core::FileSystemDestination;
/// use std::io::Write;
///
/// # fn main() -> Result<(), pkgfs_core::PackageError> {
/// let mut dest = FileSystemDestination::new("/opt/pkgs/tool");
/// dest.begin()?;
///
/// let mut file = dest.create_file("bin/tool", true)?;
/// file.write_all(b"#!/bin/sh\necho hi\n")?;
/// file.close()?;
/// dest.create_symlink("bin/t", "tool")?;
///
/// dest.end(true)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileSystemDestination {
    dir: PathBuf,
    config: DestinationConfig,
    staging: Option<Staging>,
    open_files: OpenFiles,
}

impl FileSystemDestination {
    /// Creates a destination for `dir` with default settings. Nothing is
    /// touched on disk until [`begin`](Destination::begin).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_config(dir, DestinationConfig::default())
    }

    /// Creates a destination for `dir` with the given settings.
    pub fn with_config(dir: impl Into<PathBuf>, config: DestinationConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
            staging: None,
            open_files: Arc::new(Mutex::new(Default::default())),
        }
    }

    /// The directory the package is committed to. Absolute once a
    /// transaction has begun.
    #[must_use]
    pub fn destination_root(&self) -> &Path {
        &self.dir
    }

    /// Settings in effect.
    #[must_use]
    pub fn config(&self) -> &DestinationConfig {
        &self.config
    }

    /// Whether a transaction is in progress.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.staging.is_some()
    }

    /// Temporary directory of the open transaction.
    #[must_use]
    pub fn staging_root(&self) -> Option<&Path> {
        self.staging.as_ref().map(|staging| staging.root.path())
    }

    /// Directory where members are staged in the open transaction.
    #[must_use]
    pub fn output_root(&self) -> Option<&Path> {
        self.staging.as_ref().map(|staging| staging.out.as_path())
    }

    fn open_staging(&self) -> Result<&Staging> {
        self.staging.as_ref().ok_or(PackageError::NotOpen)
    }

    /// Maps a slash-separated member name to its path in the staging tree
    /// and creates the parent directories.
    fn prepare_path(&self, staging: &Staging, name: &str) -> Result<PathBuf> {
        let invalid = || PackageError::InvalidRelativePath {
            name: name.to_owned(),
        };

        if name.is_empty() || name.contains('\0') {
            return Err(invalid());
        }
        let relative = from_slash(name);
        if relative.is_absolute() || relative.has_root() {
            return Err(invalid());
        }

        let path = normalize_lexically(&staging.out.join(relative));
        if path == staging.out || !is_subpath(&path, &staging.out) {
            return Err(invalid());
        }

        verify_parent_chain(&staging.out, &path, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Moves the staged tree into place, parking and if needed restoring the
    /// previous installation.
    fn commit(&self, staging: &Staging) -> Result<()> {
        let old = staging.root.path().join(OLD_DIR);
        let parked = match fs::rename(&self.dir, &old) {
            Ok(()) => true,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(
                        dest = %self.dir.display(),
                        error = %e,
                        "could not move previous installation aside"
                    );
                }
                false
            }
        };

        if let Err(e) = fs::rename(&staging.out, &self.dir) {
            if parked && let Err(restore) = fs::rename(&old, &self.dir) {
                warn!(
                    dest = %self.dir.display(),
                    error = %restore,
                    "failed to restore previous installation"
                );
            }
            return Err(e.into());
        }

        debug!(dest = %self.dir.display(), replaced = parked, "committed package");
        Ok(())
    }
}

impl Destination for FileSystemDestination {
    type Writer = FileSystemWriter;

    fn begin(&mut self) -> Result<()> {
        if self.staging.is_some() {
            return Err(PackageError::AlreadyOpen);
        }

        let dir = absolutize(&self.dir)?;
        let (Some(parent), Some(base)) = (dir.parent(), dir.file_name()) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("destination has no parent directory: {}", dir.display()),
            )
            .into());
        };
        fs::create_dir_all(parent)?;

        let staging = Staging::create(parent, &base.to_string_lossy())?;
        debug!(
            dest = %dir.display(),
            staging = %staging.root.path().display(),
            "began package transaction"
        );

        self.dir = dir;
        self.staging = Some(staging);
        Ok(())
    }

    fn create_file(&self, name: &str, executable: bool) -> Result<FileSystemWriter> {
        let staging = self.open_staging()?;
        if lock(&self.open_files).contains(name) {
            return Err(PackageError::AlreadyOpenFile {
                name: name.to_owned(),
            });
        }

        let path = self.prepare_path(staging, name)?;
        let file = create_exclusive(&path, self.config.mode_for(executable))?;

        if !lock(&self.open_files).insert(name.to_owned()) {
            return Err(PackageError::AlreadyOpenFile {
                name: name.to_owned(),
            });
        }
        Ok(FileSystemWriter::new(
            file,
            name.to_owned(),
            Arc::clone(&self.open_files),
            self.config.sync_on_close,
        ))
    }

    fn create_symlink(&self, name: &str, target: &str) -> Result<()> {
        let staging = self.open_staging()?;
        let path = self.prepare_path(staging, name)?;

        let target = from_slash(target);
        validate_staged_target(&path, &target, &staging.out, name)?;
        create_symlink(&target, &path)?;
        Ok(())
    }

    fn end(&mut self, success: bool) -> Result<()> {
        if self.staging.is_none() {
            return Err(PackageError::NotOpen);
        }
        {
            let open = lock(&self.open_files);
            if !open.is_empty() {
                return Err(PackageError::LeakedOpenFiles {
                    names: open.iter().cloned().collect(),
                });
            }
        }
        let Some(staging) = self.staging.take() else {
            return Err(PackageError::NotOpen);
        };

        let result = if success {
            self.commit(&staging)
        } else {
            debug!(dest = %self.dir.display(), "rolled back package transaction");
            Ok(())
        };
        staging.discard();
        result
    }
}

impl Drop for FileSystemDestination {
    fn drop(&mut self) {
        if let Some(staging) = self.staging.take() {
            warn!(
                dest = %self.dir.display(),
                "destination dropped with an open transaction, discarding staged files"
            );
            staging.discard();
        }
    }
}

/// Creates a new file, failing if anything already exists at `path`.
#[cfg(unix)]
fn create_exclusive(path: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn create_exclusive(path: &Path, _mode: u32) -> io::Result<File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::DestinationWriter;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dest: &FileSystemDestination, name: &str, data: &[u8]) {
        let mut file = dest.create_file(name, false).expect("create_file");
        file.write_all(data).expect("write");
        file.close().expect("close");
    }

    fn setup() -> (TempDir, FileSystemDestination) {
        let temp = TempDir::new().unwrap();
        let dest = FileSystemDestination::new(temp.path().join("pkg"));
        (temp, dest)
    }

    #[test]
    fn test_begin_creates_staging_next_to_destination() {
        let (temp, mut dest) = setup();
        dest.begin().unwrap();

        let staging = dest.staging_root().unwrap().to_path_buf();
        assert_eq!(staging.parent(), Some(temp.path()));
        let base = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(base.starts_with("pkg_"), "unexpected staging name {base}");
        assert_eq!(dest.output_root(), Some(staging.join("out").as_path()));
        assert!(staging.join("out").is_dir());
        assert!(!temp.path().join("pkg").exists());

        dest.end(false).unwrap();
        assert!(!staging.exists());
    }

    #[test]
    fn test_begin_creates_missing_parent() {
        let temp = TempDir::new().unwrap();
        let mut dest = FileSystemDestination::new(temp.path().join("deep/nested/pkg"));
        dest.begin().unwrap();
        assert!(temp.path().join("deep/nested").is_dir());
        dest.end(false).unwrap();
    }

    #[test]
    fn test_begin_twice_fails() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();
        assert!(matches!(dest.begin(), Err(PackageError::AlreadyOpen)));
        assert!(dest.is_open());
        dest.end(false).unwrap();
    }

    #[test]
    fn test_begin_failure_leaves_destination_idle() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"not a dir").unwrap();

        let mut dest = FileSystemDestination::new(blocker.join("pkg"));
        assert!(dest.begin().is_err());
        assert!(!dest.is_open());
        assert!(matches!(dest.end(true), Err(PackageError::NotOpen)));
    }

    #[test]
    fn test_calls_before_begin_fail() {
        let (_temp, mut dest) = setup();
        assert!(matches!(
            dest.create_file("a", false),
            Err(PackageError::NotOpen)
        ));
        assert!(matches!(
            dest.create_symlink("a", "b"),
            Err(PackageError::NotOpen)
        ));
        assert!(matches!(dest.end(true), Err(PackageError::NotOpen)));
    }

    #[test]
    fn test_commit_makes_files_visible() {
        let (temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "a/b/c.txt", b"hello");
        dest.end(true).unwrap();

        let path = temp.path().join("pkg/a/b/c.txt");
        assert_eq!(fs::read(path).unwrap(), b"hello");
        assert!(!dest.is_open());
    }

    #[test]
    fn test_nothing_visible_before_commit() {
        let (temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "file", b"x");
        assert!(!temp.path().join("pkg").exists());
        dest.end(true).unwrap();
        assert!(temp.path().join("pkg/file").exists());
    }

    #[test]
    fn test_commit_replaces_previous_installation() {
        let (temp, mut dest) = setup();
        fs::create_dir(temp.path().join("pkg")).unwrap();
        fs::write(temp.path().join("pkg/stale"), b"old").unwrap();

        dest.begin().unwrap();
        write_file(&dest, "fresh", b"new");
        dest.end(true).unwrap();

        assert!(!temp.path().join("pkg/stale").exists());
        assert_eq!(fs::read(temp.path().join("pkg/fresh")).unwrap(), b"new");

        // Only the destination remains in the parent directory.
        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_rollback_keeps_previous_installation() {
        let (temp, mut dest) = setup();
        fs::create_dir(temp.path().join("pkg")).unwrap();
        fs::write(temp.path().join("pkg/keep"), b"old").unwrap();

        dest.begin().unwrap();
        write_file(&dest, "keep", b"new");
        dest.end(false).unwrap();

        assert_eq!(fs::read(temp.path().join("pkg/keep")).unwrap(), b"old");
        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_end_is_single_use() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();
        dest.end(true).unwrap();
        assert!(matches!(dest.end(true), Err(PackageError::NotOpen)));
        assert!(matches!(dest.end(false), Err(PackageError::NotOpen)));
    }

    #[test]
    fn test_destination_reusable_after_end() {
        let (temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "v1", b"1");
        dest.end(true).unwrap();

        dest.begin().unwrap();
        write_file(&dest, "v2", b"2");
        dest.end(true).unwrap();

        assert!(!temp.path().join("pkg/v1").exists());
        assert!(temp.path().join("pkg/v2").exists());
    }

    #[test]
    fn test_file_already_open() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();

        let first = dest.create_file("f", false).unwrap();
        assert!(matches!(
            dest.create_file("f", false),
            Err(PackageError::AlreadyOpenFile { name }) if name == "f"
        ));
        first.close().unwrap();
        dest.end(false).unwrap();
    }

    #[test]
    fn test_file_created_twice_fails_exclusively() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "f", b"1");

        match dest.create_file("f", false) {
            Err(PackageError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::AlreadyExists),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        dest.end(false).unwrap();
    }

    #[test]
    fn test_leaked_writer_blocks_end() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();

        let writer = dest.create_file("leaky", false).unwrap();
        match dest.end(true) {
            Err(PackageError::LeakedOpenFiles { names }) => assert_eq!(names, ["leaky"]),
            other => panic!("expected LeakedOpenFiles, got {other:?}"),
        }
        assert!(dest.is_open(), "transaction stays open after a leak");

        writer.close().unwrap();
        dest.end(true).unwrap();
    }

    #[test]
    fn test_dropped_writer_counts_as_leaked() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();
        drop(dest.create_file("dropped", false).unwrap());

        assert!(matches!(
            dest.end(false),
            Err(PackageError::LeakedOpenFiles { .. })
        ));
    }

    #[test]
    fn test_invalid_relative_names() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();

        for name in ["", ".", "a/..", "../x", "a/../../x", "/etc/passwd", "a\0b"] {
            assert!(
                matches!(
                    dest.create_file(name, false),
                    Err(PackageError::InvalidRelativePath { .. })
                ),
                "{name:?} should be rejected"
            );
            assert!(
                matches!(
                    dest.create_symlink(name, "t"),
                    Err(PackageError::InvalidRelativePath { .. })
                ),
                "{name:?} should be rejected for symlinks"
            );
        }
        dest.end(false).unwrap();
    }

    #[test]
    fn test_dot_segments_inside_root_are_normalized() {
        let (temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "a/./b/../c", b"x");
        dest.end(true).unwrap();
        assert!(temp.path().join("pkg/a/c").is_file());
    }

    #[test]
    fn test_drop_discards_open_transaction() {
        let (temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "f", b"x");
        let staging = dest.staging_root().unwrap().to_path_buf();

        drop(dest);
        assert!(!staging.exists());
        assert!(!temp.path().join("pkg").exists());
    }

    #[test]
    fn test_concurrent_writers_share_transaction() {
        let (temp, mut dest) = setup();
        dest.begin().unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let dest = &dest;
                scope.spawn(move || {
                    for i in 0..8 {
                        write_file(dest, &format!("w{worker}/f{i}"), b"data");
                    }
                });
            }
        });

        dest.end(true).unwrap();
        for worker in 0..4 {
            assert_eq!(
                fs::read_dir(temp.path().join(format!("pkg/w{worker}")))
                    .unwrap()
                    .count(),
                8
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_files_created_without_write_bit() {
        use std::os::unix::fs::PermissionsExt;

        let (temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "plain", b"x");
        let mut exe = dest.create_file("exe", true).unwrap();
        exe.write_all(b"#!/bin/sh\n").unwrap();
        exe.close().unwrap();
        dest.end(true).unwrap();

        let plain = fs::metadata(temp.path().join("pkg/plain")).unwrap();
        let exe = fs::metadata(temp.path().join("pkg/exe")).unwrap();
        assert_eq!(plain.permissions().mode() & 0o222, 0);
        assert_eq!(plain.permissions().mode() & 0o111, 0);
        assert_eq!(exe.permissions().mode() & 0o222, 0);
        assert_ne!(exe.permissions().mode() & 0o100, 0);
    }

    #[test]
    fn test_failed_commit_restores_previous_installation() {
        let (temp, mut dest) = setup();
        fs::create_dir(temp.path().join("pkg")).unwrap();
        fs::write(temp.path().join("pkg/keep"), b"old").unwrap();

        dest.begin().unwrap();
        fs::remove_dir(dest.output_root().unwrap()).unwrap();

        assert!(dest.end(true).is_err());
        assert!(!dest.is_open());
        assert_eq!(fs::read(temp.path().join("pkg/keep")).unwrap(), b"old");
        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_configured_write_bits_are_dropped() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let config = DestinationConfig::default()
            .with_file_mode(0o644)
            .with_executable_mode(0o755);
        let mut dest = FileSystemDestination::with_config(temp.path().join("pkg"), config);
        dest.begin().unwrap();
        write_file(&dest, "plain", b"x");
        dest.create_file("exe", true).unwrap().close().unwrap();
        dest.end(true).unwrap();

        for name in ["plain", "exe"] {
            let mode = fs::metadata(temp.path().join("pkg").join(name))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o222, 0, "{name} is writable: {mode:o}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_on_close() {
        let temp = TempDir::new().unwrap();
        let config = DestinationConfig::default().with_sync_on_close(true);
        let mut dest = FileSystemDestination::with_config(temp.path().join("pkg"), config);
        dest.begin().unwrap();
        write_file(&dest, "synced", b"durable");
        dest.end(true).unwrap();
        assert_eq!(fs::read(temp.path().join("pkg/synced")).unwrap(), b"durable");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        let (temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "a/b.txt", b"x");
        dest.create_symlink("a/c", "b.txt").unwrap();
        dest.create_symlink("a/up", "../a/b.txt").unwrap();
        dest.create_symlink("sys", "/usr/bin/env").unwrap();
        dest.end(true).unwrap();

        let root = temp.path().join("pkg");
        assert_eq!(fs::read_link(root.join("a/c")).unwrap(), Path::new("b.txt"));
        assert_eq!(fs::read_link(root.join("a/up")).unwrap(), Path::new("../a/b.txt"));
        assert_eq!(fs::read_link(root.join("sys")).unwrap(), Path::new("/usr/bin/env"));
        assert_eq!(fs::read(root.join("a/c")).unwrap(), b"x");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();
        assert!(matches!(
            dest.create_symlink("a/link", "../../etc/passwd"),
            Err(PackageError::SymlinkEscape { .. })
        ));
        assert!(matches!(
            dest.create_symlink("link", ".."),
            Err(PackageError::SymlinkEscape { .. })
        ));
        dest.end(false).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_path_occupied() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();
        write_file(&dest, "taken", b"x");
        match dest.create_symlink("taken", "elsewhere") {
            Err(PackageError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::AlreadyExists),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        dest.end(false).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_through_staged_symlink_rejected() {
        let (_temp, mut dest) = setup();
        dest.begin().unwrap();
        dest.create_symlink("etc", "/etc").unwrap();
        assert!(matches!(
            dest.create_file("etc/passwd", false),
            Err(PackageError::SymlinkEscape { .. })
        ));
        dest.end(false).unwrap();
    }
}
