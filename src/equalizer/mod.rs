//! Partition Table / Equalizer
//!
//! Owns the ordered list of volumes and the alphabet-range-to-volume
//! assignment, computes per-bucket disk usage, and runs the rebalancing
//! algorithm when a volume runs low on space.
//!
//! Rebalancing is best effort: imbalance is tolerated until the
//! low-space threshold is crossed (or a rebuild is forced), at which
//! point the whole table is recomputed by a greedy equalization pass
//! over real disk-capacity constraints. Existing files are not moved by
//! a rebuild; only future placements follow the new table.

mod table;
mod volume;

pub use table::PartitionTable;
pub use volume::Volume;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::classifier::{alphabet_index, classify, ALPHABET, ALPHABET_LEN};
use crate::domain::Fileops;
use crate::error::{Error, Result};

/// ConfigStore key under which the bucket sequence is persisted.
pub const DISK_SEQ_KEY: &str = "disk_seq";

/// Default low-space threshold triggering a rebalance (100 GiB).
pub const DEFAULT_LOW_SPACE_BYTES: u64 = 100 * crate::config::GIBIBYTE;

/// Manages the volumes and the partition table.
///
/// Not internally synchronized: the façade serializes all access
/// (reads and rebuilds) behind a single read/write lock.
pub struct Equalizer {
    fs: Arc<dyn Fileops>,
    volumes: Vec<Volume>,
    table: PartitionTable,
    /// Accumulated byte usage per alphabet symbol, by alphabet index.
    usage: [u64; ALPHABET_LEN],
    low_space_bytes: u64,
}

impl std::fmt::Debug for Equalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Equalizer")
            .field("volumes", &self.volumes)
            .field("table", &self.table)
            .field("usage", &self.usage)
            .field("low_space_bytes", &self.low_space_bytes)
            .finish_non_exhaustive()
    }
}

impl Equalizer {
    /// Discover volumes under `mount_prefix` (`prefix0, prefix1, ...`
    /// until the first missing directory) and build the table from the
    /// persisted `seq`, falling back to an even split when the sequence
    /// is absent or cannot be applied to the discovered volume count.
    pub fn new(
        fs: Arc<dyn Fileops>,
        mount_prefix: &Path,
        seq: Option<&str>,
        low_space_bytes: u64,
    ) -> Result<Self> {
        let volumes = discover_volumes(&*fs, mount_prefix);
        if volumes.is_empty() {
            return Err(Error::NoVolumes(mount_prefix.to_path_buf()));
        }
        info!(
            count = volumes.len(),
            prefix = %mount_prefix.display(),
            "discovered volumes"
        );

        let table = match seq {
            Some(s) => match PartitionTable::from_seq(s, volumes.len()) {
                Ok(table) => table,
                Err(e) => {
                    warn!("persisted disk sequence unusable ({}), splitting evenly", e);
                    PartitionTable::split_even(volumes.len())
                }
            },
            None => PartitionTable::split_even(volumes.len()),
        };

        Ok(Self {
            fs,
            volumes,
            table,
            usage: [0; ALPHABET_LEN],
            low_space_bytes,
        })
    }

    pub fn num_volumes(&self) -> usize {
        self.volumes.len()
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    /// Serialized bucket sequence of the current table.
    pub fn seq(&self) -> String {
        self.table.seq()
    }

    /// Volume that should hold partition key `symbol`.
    ///
    /// Falls back to the first volume when no bucket matches; under the
    /// coverage invariant that only happens after a degraded rebuild.
    pub fn resolve(&self, symbol: u8) -> &Path {
        match self.table.locate(symbol) {
            Some(i) => &self.volumes[i].path,
            None => &self.volumes[0].path,
        }
    }

    /// Total free and used bytes across all volumes.
    ///
    /// A failed space query aborts the aggregation early; the partial
    /// sums for volumes already processed are still returned and must
    /// be treated as an unreliable total.
    pub fn total_space(&mut self) -> (u64, u64) {
        let mut free = 0;
        let mut used = 0;
        for vol in &mut self.volumes {
            if !vol.refresh(&*self.fs) {
                warn!(volume = %vol.path.display(), "space query failed, total is partial");
                break;
            }
            free += vol.free;
            used += vol.used;
        }
        (free, used)
    }

    /// Recompute per-symbol usage and rebuild the table when any volume
    /// is below the low-space threshold, or unconditionally when
    /// `forced`. Returns whether the table was rebuilt.
    pub fn rebalance(&mut self, forced: bool) -> bool {
        self.usage = [0; ALPHABET_LEN];
        let mut running_short = forced;
        let mut goal = 0.0f64;

        for i in 0..self.volumes.len() {
            let path = self.volumes[i].path.clone();
            if !self.volumes[i].refresh(&*self.fs) {
                warn!(volume = %path.display(), "space query failed during rebalance");
            }
            goal += self.volumes[i].free as f64;
            self.scan_usage(&path);
            if self.volumes[i].free < self.low_space_bytes {
                running_short = true;
            }
        }

        if !running_short {
            debug!("all volumes above low-space threshold, table unchanged");
            return false;
        }
        goal /= self.volumes.len() as f64;

        let buckets = self.assign_buckets(goal);
        self.table = PartitionTable::from_buckets(buckets);
        info!(seq = %self.table.seq(), "partition table rebuilt");
        true
    }

    /// Classify every immediate child of a volume and add its size to
    /// the per-symbol usage accumulator.
    fn scan_usage(&mut self, volume: &Path) {
        for child in self.fs.list_children(volume) {
            let size = self.fs.file_size(&volume.join(&child)).unwrap_or(0);
            if let Some(idx) = alphabet_index(classify(child.as_bytes())) {
                self.usage[idx] += size;
            }
        }
    }

    /// Greedy equalization over the per-symbol usage.
    ///
    /// Per volume in table order, over symbols strictly after the last
    /// one consumed: accumulate usage into the volume's bucket while
    /// the remaining capacity stays at or above the equalization goal
    /// (average free space) or the bucket is still empty; stop when the
    /// next symbol no longer fits the capacity. At the stop point a
    /// one-symbol lookahead absorbs that symbol only if it strictly
    /// improves the distance to goal. The final volume absorbs any
    /// remaining symbols so the table stays total.
    fn assign_buckets(&self, goal: f64) -> Vec<String> {
        let n = self.volumes.len();
        let mut buckets = Vec::with_capacity(n);
        let mut next = 0usize;

        for (vi, vol) in self.volumes.iter().enumerate() {
            let mut left = vol.total as f64;
            let mut letters = String::new();

            while next < ALPHABET_LEN {
                let symbol = ALPHABET[next] as char;
                let symbol_use = self.usage[next] as f64;
                debug!(symbol = %symbol, bytes = self.usage[next], "usage");

                if left < symbol_use {
                    break;
                }
                if left >= goal || letters.is_empty() {
                    letters.push(symbol);
                    left -= symbol_use;
                    next += 1;
                } else {
                    // lookahead: strictly closer to the goal with one
                    // more symbol, or stop here
                    let delta = (left - goal).abs();
                    let delta2 = (left - goal - symbol_use).abs();
                    if delta2 < delta {
                        letters.push(symbol);
                        left -= symbol_use;
                        next += 1;
                    }
                    break;
                }
            }

            if vi == n - 1 {
                while next < ALPHABET_LEN {
                    letters.push(ALPHABET[next] as char);
                    next += 1;
                }
            }

            if letters.is_empty() {
                error!(
                    volume = %vol.path.display(),
                    "volume received no symbols during rebalance; placement degrades to the first volume"
                );
            }
            debug!(volume = %vol.path.display(), bucket = %letters, "assigned");
            buckets.push(letters);
        }

        buckets
    }
}

fn discover_volumes(fs: &dyn Fileops, mount_prefix: &Path) -> Vec<Volume> {
    let prefix = mount_prefix.as_os_str().to_string_lossy();
    let mut volumes = Vec::new();
    for i in 0..256 {
        let path = PathBuf::from(format!("{}{}", prefix, i));
        if !fs.is_directory(&path) {
            break;
        }
        volumes.push(Volume::new(path));
    }
    volumes
}
