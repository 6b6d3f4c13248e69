//! Volume bookkeeping
//!
//! One mounted storage location. Space figures are refreshed lazily via
//! the [`Fileops`] port and are stale between refreshes; the struct is
//! owned exclusively by the [`Equalizer`](super::Equalizer) and never
//! shared outside it.

use std::path::PathBuf;

use crate::domain::Fileops;

/// One independently mounted storage volume.
#[derive(Debug, Clone)]
pub struct Volume {
    /// Mount point of the volume (`<prefix>N`).
    pub path: PathBuf,
    /// Free bytes at last refresh.
    pub free: u64,
    /// Total bytes at last refresh.
    pub total: u64,
    /// Used bytes at last refresh.
    pub used: u64,
}

impl Volume {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            free: 0,
            total: 0,
            used: 0,
        }
    }

    /// Refresh the space figures from the filesystem. Returns `false`
    /// (keeping the previous figures) when the query fails.
    pub fn refresh(&mut self, fs: &dyn Fileops) -> bool {
        match fs.volume_space(&self.path) {
            Ok(space) => {
                self.free = space.free;
                self.total = space.total;
                self.used = space.used();
                true
            }
            Err(_) => false,
        }
    }
}
