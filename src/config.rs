//! Store configuration

use std::path::PathBuf;

pub const MEBIBYTE: u64 = 0x100000;
pub const GIBIBYTE: u64 = 0x40000000;

/// Configuration for the recording store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Mount prefix of the physical volumes; `prefix0, prefix1, ...`
    /// are probed at startup until one is missing.
    pub mount_prefix: PathBuf,

    /// Root of the logical recording tree all callers address.
    pub video_dir: PathBuf,

    /// Free-space threshold below which a rebalance rebuilds the table.
    pub low_space_bytes: u64,

    /// Background worker threads executing queued relocations/imports.
    pub workers: usize,

    /// Task queue capacity; producers block while it is full.
    pub queue_capacity: usize,

    /// Whether threshold-triggered rebalancing is allowed (a forced
    /// BALANCE always runs).
    pub balance: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            mount_prefix: PathBuf::from("/mnt/video"),
            video_dir: PathBuf::from("/video"),
            low_space_bytes: 100 * GIBIBYTE,
            workers: parallelism,
            queue_capacity: parallelism,
            balance: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();

        assert_eq!(config.mount_prefix, PathBuf::from("/mnt/video"));
        assert_eq!(config.video_dir, PathBuf::from("/video"));
        assert_eq!(config.low_space_bytes, 100 * GIBIBYTE);
        assert!(config.workers >= 1);
        assert_eq!(config.queue_capacity, config.workers);
        assert!(config.balance);
    }
}
