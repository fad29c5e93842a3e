//! Exclusive lock held for the duration of a mutating command.
//!
//! The lock is an advisory `flock` on a fixed file. The kernel drops it when
//! the holder exits, so a crashed instance never leaves a stale lock. The
//! file itself is never deleted: unlinking a locked file would let a later
//! instance lock a fresh inode while an earlier one still holds the old.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::SwapError;
use crate::fs::FileSystem;

#[derive(Debug)]
pub struct ConfigLock {
    path: PathBuf,
    file: File,
}

impl ConfigLock {
    /// Acquires the lock at `path` without waiting.
    ///
    /// An unprivileged operator may not be able to create the file; it is
    /// then created through `fs` (which may escalate) and locked through a
    /// read-only handle, so every instance locks the same inode.
    pub fn acquire<F: FileSystem>(fs: &F, path: &Path) -> Result<Self, SwapError> {
        let (mut file, writable) = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
        {
            Ok(file) => (file, true),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                if !path.exists() {
                    debug!("{}: creating lock file through the host", path.display());
                    fs.write(path, "")?;
                }
                (File::open(path)?, false)
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(SwapError::Locked {
                    path: path.to_path_buf(),
                    holder: read_holder(&mut file),
                });
            }
            return Err(e.into());
        }

        if writable {
            record_holder(&mut file)?;
        }
        debug!("{}: lock acquired", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_holder(file: &mut File) -> String {
    let mut holder = String::new();
    let _ = file.read_to_string(&mut holder);
    match holder.trim() {
        "" => "unknown".to_string(),
        pid => pid.to_string(),
    }
}

fn record_holder(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.rewind()?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("{}: failed to release lock: {}", self.path.display(), e);
        }
    }
}
