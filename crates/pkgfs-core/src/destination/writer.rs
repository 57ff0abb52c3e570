//! File writer handed out by [`FileSystemDestination`](super::FileSystemDestination).

use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use super::DestinationWriter;
use crate::Result;

/// Names of files whose writers are still open, shared between a
/// destination and its writers.
pub(crate) type OpenFiles = Arc<Mutex<BTreeSet<String>>>;

/// Locks the open-file registry. The set stays consistent even if a holder
/// panicked, so poisoning is ignored.
pub(crate) fn lock(open_files: &Mutex<BTreeSet<String>>) -> MutexGuard<'_, BTreeSet<String>> {
    open_files.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer for one file inside a staging directory.
#[derive(Debug)]
pub struct FileSystemWriter {
    file: File,
    name: String,
    open_files: OpenFiles,
    sync_on_close: bool,
}

impl FileSystemWriter {
    pub(crate) fn new(file: File, name: String, open_files: OpenFiles, sync_on_close: bool) -> Self {
        Self {
            file,
            name,
            open_files,
            sync_on_close,
        }
    }

    /// Slash-separated name this writer was opened for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Write for FileSystemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl DestinationWriter for FileSystemWriter {
    fn close(self) -> Result<()> {
        lock(&self.open_files).remove(&self.name);

        let synced = if self.sync_on_close {
            self.file.sync_all()
        } else {
            Ok(())
        };
        drop(self.file);
        Ok(synced?)
    }
}
