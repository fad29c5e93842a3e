//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait lets the probe and the configuration stores work
//! with the real `/proc` and `/etc` on Linux, and with in-memory state in tests.

use std::io;
use std::path::{Path, PathBuf};

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Replaces the whole content of a file.
    ///
    /// Implementations must never leave a partially written record behind:
    /// either the old content or the new content is observable.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Removes a file. Removing a missing file is not an error.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

/// Sibling path used for write-then-rename replacement.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".swaptier-tmp");
    path.with_file_name(name)
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let staging = staging_path(path);
        std::fs::write(&staging, contents)?;
        if let Ok(meta) = std::fs::metadata(path) {
            // Keep the original mode (fstab is usually 0644).
            std::fs::set_permissions(&staging, meta.permissions())?;
        }
        std::fs::rename(&staging, path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
