//! Domain Ports
//!
//! Trait abstractions for the external capabilities the core composes.
//! All filesystem calls may fail at any time (permissions, device
//! errors, races with external modification); the core treats failure
//! as a boolean/`None`/`Err` result and degrades, it never panics.
//!
//! The ports are synchronous: every operation is local-disk blocking
//! I/O, executed either on the control thread or on a background worker
//! thread of the task queue.

use std::path::{Path, PathBuf};

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Free/total byte counts of one mounted volume, as reported by the
/// filesystem at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSpace {
    pub free: u64,
    pub total: u64,
}

impl VolumeSpace {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free)
    }
}

// =============================================================================
// Filesystem Port
// =============================================================================

/// Port for primitive filesystem operations.
///
/// This is the single seam between the placement core and the operating
/// system. The production adapter wraps `std::fs`; tests use an
/// in-memory tree.
pub trait Fileops: Send + Sync {
    /// Whether any directory entry exists at `path` (no following).
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` resolves to a directory (following symlinks).
    fn is_directory(&self, path: &Path) -> bool;

    /// Whether `path` itself is a symbolic link (no following).
    fn is_symlink(&self, path: &Path) -> bool;

    /// Whether `path` itself is a regular file (no following).
    fn is_file(&self, path: &Path) -> bool;

    /// Target of a symbolic link, or `None` if unreadable.
    fn read_link(&self, path: &Path) -> Option<PathBuf>;

    /// Size of a file in bytes; `None` if it cannot be statted.
    fn file_size(&self, path: &Path) -> Option<u64>;

    /// Names of the immediate children of a directory, `.`/`..`
    /// excluded. An unreadable directory yields an empty list.
    fn list_children(&self, path: &Path) -> Vec<String>;

    /// Create a symlink at `link` pointing to `target`.
    fn create_symlink(&self, link: &Path, target: &Path) -> Result<()>;

    /// Copy a file's bytes.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// Rename a directory entry (no payload movement).
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove a file, symlink, or empty directory.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Create a directory and all missing parents.
    fn make_directories(&self, path: &Path) -> Result<()>;

    /// Query free/total bytes of the volume holding `path`.
    fn volume_space(&self, path: &Path) -> Result<VolumeSpace>;
}

// =============================================================================
// Configuration Store Port
// =============================================================================

/// Port for the host's configuration persistence.
///
/// The only durable artifact of this subsystem is the bucket-sequence
/// string (one starting symbol per volume, in table order), stored
/// under [`crate::equalizer::DISK_SEQ_KEY`].
pub trait ConfigStore: Send + Sync {
    /// Load a stored value, `None` when absent.
    fn load(&self, key: &str) -> Option<String>;

    /// Persist a value.
    fn store(&self, key: &str, value: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_space_used() {
        let s = VolumeSpace {
            free: 30,
            total: 100,
        };
        assert_eq!(s.used(), 70);

        // total below free (racing statvfs) must not underflow
        let s = VolumeSpace { free: 10, total: 5 };
        assert_eq!(s.used(), 0);
    }
}
