//! Configuration for extracting packages onto disk.

/// Owner, group and other write permission.
const WRITE_BITS: u32 = 0o222;

/// Settings for a [`FileSystemDestination`](crate::FileSystemDestination).
///
/// Packages are installed immutable, so the write bits of both modes are
/// always masked off when a file is created.
///
/// # Examples
///
/// ```
/// use pkgfs_core::DestinationConfig;
///
/// // Use the defaults
/// let config = DestinationConfig::default();
/// assert_eq!(config.file_mode, 0o444);
///
/// // Customize for specific needs
/// let custom = DestinationConfig::default()
///     .with_file_mode(0o440)
///     .with_executable_mode(0o550)
///     .with_sync_on_close(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    /// Permission bits for non-executable files (Unix only; write bits are
    /// ignored and the process umask trims the rest).
    ///
    /// Default: `0o444`.
    pub file_mode: u32,

    /// Permission bits for executable files (Unix only; write bits are
    /// ignored and the process umask trims the rest).
    ///
    /// Default: `0o555`.
    pub executable_mode: u32,

    /// Call `sync_all` when a file writer is closed, so delayed write errors
    /// (for example a full disk) surface from `close`. Without it `close`
    /// only drops the file and never reports such errors.
    ///
    /// Default: `false`.
    pub sync_on_close: bool,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            file_mode: 0o444,
            executable_mode: 0o555,
            sync_on_close: false,
        }
    }
}

impl DestinationConfig {
    /// Creates a new `DestinationConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mode for non-executable files.
    #[must_use]
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Sets the mode for executable files.
    #[must_use]
    pub fn with_executable_mode(mut self, mode: u32) -> Self {
        self.executable_mode = mode;
        self
    }

    /// Sets whether closing a writer syncs it to disk.
    #[must_use]
    pub fn with_sync_on_close(mut self, sync: bool) -> Self {
        self.sync_on_close = sync;
        self
    }

    /// Mode for a new file, with every write bit cleared.
    #[must_use]
    pub fn mode_for(&self, executable: bool) -> u32 {
        let mode = if executable {
            self.executable_mode
        } else {
            self.file_mode
        };
        mode & !WRITE_BITS
    }
}
