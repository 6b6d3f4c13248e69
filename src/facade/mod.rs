//! Directory Façade
//!
//! [`MediaDir`] is the single entry point callers use to manipulate the
//! logical recording tree. Every mutation funnels through here:
//!
//! ```text
//!   caller ──> MediaDir ──> Equalizer (RwLock)   classify + resolve
//!                 │
//!                 ├──────> Fileops port          symlinks, renames
//!                 │
//!                 └──────> WorkQueue             slow copies off-thread
//! ```
//!
//! Fast metadata operations (symlink creation, renames, symlink
//! re-pointing) happen synchronously on the caller's thread; anything
//! that copies file content is enqueued as a background task.

pub mod console;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::config::{StoreConfig, MEBIBYTE};
use crate::domain::{ConfigStore, Fileops};
use crate::equalizer::{Equalizer, DISK_SEQ_KEY};
use crate::error::{Error, Result};
use crate::flatten::{flat_path, is_video_file};
use crate::queue::{import_tree, ImportReport, QueueConfig, Task, WorkQueue};

/// What an [`MediaDir::import`] call produced.
#[derive(Debug)]
pub enum ImportOutcome {
    /// Names of the subdirectories whose import tasks were enqueued.
    Enqueued(Vec<String>),
    /// Dry run: the trace of intended actions, nothing touched.
    DryRun(ImportReport),
}

/// The logical recording directory spread across physical volumes.
pub struct MediaDir {
    fs: Arc<dyn Fileops>,
    config_store: Arc<dyn ConfigStore>,
    video_dir: PathBuf,
    mount_prefix: PathBuf,
    balance_enabled: bool,
    debug: AtomicBool,
    equalizer: RwLock<Equalizer>,
    queue: WorkQueue,
}

impl MediaDir {
    /// Discover the volumes, reconcile the persisted bucket sequence
    /// against them, and start the worker pool.
    pub fn new(
        config: &StoreConfig,
        fs: Arc<dyn Fileops>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Result<Self> {
        let persisted = config_store.load(DISK_SEQ_KEY);
        let equalizer = Equalizer::new(
            Arc::clone(&fs),
            &config.mount_prefix,
            persisted.as_deref(),
            config.low_space_bytes,
        )?;

        // the persisted sequence may have been rejected (volume count
        // changed, malformed); write back what is actually in effect
        let effective = equalizer.seq();
        if persisted.as_deref() != Some(effective.as_str()) {
            config_store.store(DISK_SEQ_KEY, &effective)?;
            info!(seq = %effective, "bucket sequence reconciled and persisted");
        }

        let queue = WorkQueue::new(
            QueueConfig {
                workers: config.workers,
                capacity: config.queue_capacity,
            },
            Arc::clone(&fs),
        );

        Ok(Self {
            fs,
            config_store,
            video_dir: config.video_dir.clone(),
            mount_prefix: config.mount_prefix.clone(),
            balance_enabled: config.balance,
            debug: AtomicBool::new(false),
            equalizer: RwLock::new(equalizer),
            queue,
        })
    }

    // =========================================================================
    // Placement helpers
    // =========================================================================

    /// Path relative to the logical root, or an error (nothing outside
    /// the root is ever touched).
    fn relative(&self, path: &Path) -> Result<String> {
        match path.strip_prefix(&self.video_dir) {
            Ok(rel) if !rel.as_os_str().is_empty() => {
                Ok(rel.to_string_lossy().into_owned())
            }
            _ => Err(Error::OutsideVideoDir {
                root: self.video_dir.clone(),
                path: path.to_path_buf(),
            }),
        }
    }

    /// Volume assigned to `name` by the current partition table.
    fn volume_for(&self, name: &str) -> PathBuf {
        let symbol = classify(name.as_bytes());
        self.equalizer.read().resolve(symbol).to_path_buf()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Place a new recording path: classify its relative name, pick the
    /// volume, and symlink the logical path to the flattened location
    /// there. Returns the symlink target.
    pub fn register(&self, path: &Path) -> Result<PathBuf> {
        let rel = self.relative(path)?;
        let target = self.volume_for(&rel).join(flat_path(&rel));
        self.fs.create_symlink(path, &target)?;
        self.trace(format_args!(
            "registered {} -> {}",
            path.display(),
            target.display()
        ));
        Ok(target)
    }

    /// Metadata-only rename; symlink targets keep their old flattened
    /// names, which is harmless because nothing derives them back.
    pub fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.fs.rename(from, to)?;
        self.trace(format_args!("renamed {} -> {}", from.display(), to.display()));
        Ok(())
    }

    /// Move a recording directory within the tree. The directory is
    /// renamed first, then every symlinked payload file underneath is
    /// re-classified against the new name: a target on the same volume
    /// is renamed in place, a target on a different volume is relocated
    /// by a background task. Either way the symlink is re-pointed at
    /// the new target immediately.
    pub fn move_dir(&self, from: &Path, to: &Path) -> Result<()> {
        self.relative(from)?;
        let rel_to = self.relative(to)?;
        self.fs.rename(from, to)?;

        let new_volume = self.volume_for(&rel_to);
        self.retarget_tree(to, &rel_to, &new_volume)?;
        self.trace(format_args!("moved {} -> {}", from.display(), to.display()));
        Ok(())
    }

    fn retarget_tree(&self, dir: &Path, rel: &str, new_volume: &Path) -> Result<()> {
        for child in self.fs.list_children(dir) {
            let link = dir.join(&child);
            if self.fs.is_directory(&link) && !self.fs.is_symlink(&link) {
                self.retarget_tree(&link, &format!("{}/{}", rel, child), new_volume)?;
                continue;
            }
            if !self.fs.is_symlink(&link) || !is_video_file(&child) {
                continue;
            }
            let old_target = match self.fs.read_link(&link) {
                Some(t) => t,
                None => continue,
            };
            let new_target = new_volume.join(flat_path(&format!("{}/{}", rel, child)));
            if new_target == old_target {
                continue;
            }

            if old_target.starts_with(new_volume) {
                // same volume: a rename is cheap and atomic
                self.fs.rename(&old_target, &new_target)?;
            } else {
                self.queue.push(Task::Relocate {
                    source: old_target.clone(),
                    dest: new_target.clone(),
                    remove_source: true,
                })?;
            }
            // re-point eagerly; during a relocation the symlink briefly
            // dangles, readers retry after the task lands
            self.fs.remove(&link)?;
            self.fs.create_symlink(&link, &new_target)?;
        }
        Ok(())
    }

    /// Delete a path: files directly, symlinks target-first, directory
    /// trees bottom-up. A failing branch is logged and skipped so one
    /// stubborn entry cannot wedge the rest of the tree.
    pub fn remove(&self, path: &Path) -> Result<()> {
        if self.fs.is_symlink(path) {
            if let Some(target) = self.fs.read_link(path) {
                if let Err(e) = self.fs.remove(&target) {
                    warn!(target = %target.display(), "cannot remove symlink target: {}", e);
                }
            }
            return self.fs.remove(path);
        }
        if self.fs.is_file(path) {
            return self.fs.remove(path);
        }
        if self.fs.is_directory(path) {
            for child in self.fs.list_children(path) {
                if let Err(e) = self.remove(&path.join(&child)) {
                    warn!(path = %path.join(&child).display(), "remove failed: {}", e);
                }
            }
            return self.fs.remove(path);
        }
        if self.fs.exists(path) {
            warn!(path = %path.display(), "remove: unclassifiable entry");
        } else {
            warn!(path = %path.display(), "remove: no such entry");
        }
        Err(Error::Fileop {
            op: "remove",
            path: path.to_path_buf(),
        })
    }

    /// Whether this store is responsible for `path`: a symlink pointing
    /// into one of our volumes, or a file already living on one.
    pub fn contains(&self, path: &Path) -> bool {
        if self.fs.is_symlink(path) {
            return self
                .fs
                .read_link(path)
                .map(|t| starts_with_prefix(&t, &self.mount_prefix))
                .unwrap_or(false);
        }
        if self.fs.is_file(path) {
            return starts_with_prefix(path, &self.mount_prefix);
        }
        false
    }

    /// Migrate foreign recording trees under `source_root` into the
    /// store. Each immediate subdirectory is classified and assigned a
    /// volume; the actual walk runs as a background task, or inline
    /// without mutation when `dry_run`.
    pub fn import(&self, source_root: &Path, single: bool, dry_run: bool) -> Result<ImportOutcome> {
        let mut enqueued = Vec::new();
        let mut report = ImportReport::default();

        for entry in self.fs.list_children(source_root) {
            if !self.fs.is_directory(&source_root.join(&entry)) {
                continue;
            }
            let volume = self.volume_for(&entry);

            if dry_run {
                import_tree(
                    &*self.fs,
                    &self.video_dir,
                    &volume,
                    source_root,
                    &entry,
                    true,
                    &mut report,
                )?;
            } else {
                self.queue.push(Task::Import {
                    logical_root: self.video_dir.clone(),
                    volume,
                    source_root: source_root.to_path_buf(),
                    dir: entry.clone(),
                    dry_run: false,
                })?;
                enqueued.push(entry);
            }
            if single {
                break;
            }
        }

        if dry_run {
            Ok(ImportOutcome::DryRun(report))
        } else {
            Ok(ImportOutcome::Enqueued(enqueued))
        }
    }

    /// Name of the next subdirectory an import would pick up, without
    /// touching anything.
    pub fn import_next(&self, source_root: &Path) -> Option<String> {
        self.fs
            .list_children(source_root)
            .into_iter()
            .find(|e| self.fs.is_directory(&source_root.join(e)))
    }

    /// Recompute usage and rebuild the partition table.
    ///
    /// Unforced calls are skipped entirely when balancing is disabled;
    /// a rebuilt table is persisted before this returns.
    pub fn balance(&self, forced: bool) -> Result<bool> {
        if !forced && !self.balance_enabled {
            debug!("balancing disabled, skipping");
            return Ok(false);
        }
        let mut eq = self.equalizer.write();
        let rebuilt = eq.rebalance(forced);
        if rebuilt {
            self.config_store.store(DISK_SEQ_KEY, &eq.seq())?;
        }
        Ok(rebuilt)
    }

    /// Aggregate `(free, used)` bytes across all volumes.
    pub fn free_space(&self) -> (u64, u64) {
        self.equalizer.write().total_space()
    }

    /// Free space in whole MiB.
    pub fn free_mib(&self) -> u64 {
        self.free_space().0 / MEBIBYTE
    }

    /// Current bucket sequence (one starting symbol per volume).
    pub fn seq(&self) -> String {
        self.equalizer.read().seq()
    }

    /// Number of background tasks currently executing.
    pub fn active_tasks(&self) -> usize {
        self.queue.active_count()
    }

    /// Flip the verbose operation tracing flag; returns the new state.
    pub fn toggle_debug(&self) -> bool {
        !self.debug.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Drain the task queue and join the workers. Idempotent.
    pub fn shutdown(&mut self) {
        self.queue.shutdown();
    }

    fn trace(&self, args: std::fmt::Arguments<'_>) {
        if self.debug_enabled() {
            info!("{}", args);
        } else {
            debug!("{}", args);
        }
    }
}

fn starts_with_prefix(path: &Path, prefix: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .starts_with(&*prefix.as_os_str().to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemConfigStore, MemFileops};
    use crate::config::GIBIBYTE;
    use crate::domain::VolumeSpace;
    use crate::queue::ImportAction;
    use assert_matches::assert_matches;

    fn fixture(volume_count: usize) -> (Arc<MemFileops>, Arc<MemConfigStore>, StoreConfig) {
        let fs = MemFileops::new();
        for i in 0..volume_count {
            let path = PathBuf::from(format!("/mnt/video{}", i));
            fs.add_dir(&path);
            fs.set_space(
                &path,
                VolumeSpace {
                    free: 500 * GIBIBYTE,
                    total: 1000 * GIBIBYTE,
                },
            );
        }
        fs.add_dir(Path::new("/video"));
        let config = StoreConfig {
            workers: 1,
            queue_capacity: 4,
            ..StoreConfig::default()
        };
        (Arc::new(fs), Arc::new(MemConfigStore::new()), config)
    }

    fn media_dir(
        fs: &Arc<MemFileops>,
        store: &Arc<MemConfigStore>,
        config: &StoreConfig,
    ) -> MediaDir {
        MediaDir::new(
            config,
            Arc::clone(fs) as Arc<dyn Fileops>,
            Arc::clone(store) as Arc<dyn ConfigStore>,
        )
        .unwrap()
    }

    #[test]
    fn test_new_persists_effective_seq() {
        let (fs, store, config) = fixture(2);
        let _dir = media_dir(&fs, &store, &config);
        assert_eq!(store.load(DISK_SEQ_KEY), Some("0i".to_string()));
    }

    #[test]
    fn test_new_keeps_valid_persisted_seq() {
        let (fs, store, config) = fixture(2);
        store.store(DISK_SEQ_KEY, "0n").unwrap();
        let dir = media_dir(&fs, &store, &config);
        assert_eq!(dir.seq(), "0n");
    }

    #[test]
    fn test_register_creates_symlink_on_resolved_volume() {
        let (fs, store, config) = fixture(2);
        store.store(DISK_SEQ_KEY, "0n").unwrap();
        let dir = media_dir(&fs, &store, &config);

        let target = dir
            .register(Path::new("/video/Nature/2026.rec/00001.ts"))
            .unwrap();
        // 'n' falls in the second bucket
        assert_eq!(
            target,
            PathBuf::from("/mnt/video1/Nature~2026~00001.ts")
        );
        assert_eq!(
            fs.symlink_target(Path::new("/video/Nature/2026.rec/00001.ts")),
            Some(target)
        );
    }

    #[test]
    fn test_register_outside_root_is_rejected_without_mutation() {
        let (fs, store, config) = fixture(2);
        let dir = media_dir(&fs, &store, &config);
        let before = fs.node_count();

        let result = dir.register(Path::new("/etc/passwd"));
        assert_matches!(result, Err(Error::OutsideVideoDir { .. }));
        assert_eq!(fs.node_count(), before);
    }

    #[test]
    fn test_move_dir_same_volume_renames_target() {
        let (fs, store, config) = fixture(2);
        store.store(DISK_SEQ_KEY, "0n").unwrap();
        let dir = media_dir(&fs, &store, &config);

        // both "Alpha" and "Beta" classify into bucket 0
        fs.add_file(Path::new("/mnt/video0/Alpha~00001.ts"), 100);
        fs.add_symlink(
            Path::new("/video/Alpha/00001.ts"),
            Path::new("/mnt/video0/Alpha~00001.ts"),
        );

        dir.move_dir(Path::new("/video/Alpha"), Path::new("/video/Beta"))
            .unwrap();

        assert!(fs.is_file(Path::new("/mnt/video0/Beta~00001.ts")));
        assert!(!fs.exists(Path::new("/mnt/video0/Alpha~00001.ts")));
        assert_eq!(
            fs.symlink_target(Path::new("/video/Beta/00001.ts")),
            Some(PathBuf::from("/mnt/video0/Beta~00001.ts"))
        );
    }

    #[test]
    fn test_move_dir_changed_volume_relocates_and_repoints() {
        let (fs, store, config) = fixture(2);
        store.store(DISK_SEQ_KEY, "0n").unwrap();
        let mut dir = media_dir(&fs, &store, &config);

        // "Alpha" resolves to volume0, "Nature" to volume1
        fs.add_file(Path::new("/mnt/video0/Alpha~00001.ts"), 100);
        fs.add_symlink(
            Path::new("/video/Alpha/00001.ts"),
            Path::new("/mnt/video0/Alpha~00001.ts"),
        );

        dir.move_dir(Path::new("/video/Alpha"), Path::new("/video/Nature"))
            .unwrap();

        // symlink re-pointed eagerly
        assert_eq!(
            fs.symlink_target(Path::new("/video/Nature/00001.ts")),
            Some(PathBuf::from("/mnt/video1/Nature~00001.ts"))
        );

        // the background task performs the copy + source delete
        dir.shutdown();
        assert!(fs.is_file(Path::new("/mnt/video1/Nature~00001.ts")));
        assert!(!fs.exists(Path::new("/mnt/video0/Alpha~00001.ts")));
    }

    #[test]
    fn test_remove_symlink_deletes_target_first() {
        let (fs, store, config) = fixture(2);
        let dir = media_dir(&fs, &store, &config);

        fs.add_file(Path::new("/mnt/video0/Alpha~00001.ts"), 100);
        fs.add_symlink(
            Path::new("/video/Alpha/00001.ts"),
            Path::new("/mnt/video0/Alpha~00001.ts"),
        );

        dir.remove(Path::new("/video/Alpha/00001.ts")).unwrap();
        assert!(!fs.exists(Path::new("/video/Alpha/00001.ts")));
        assert!(!fs.exists(Path::new("/mnt/video0/Alpha~00001.ts")));
    }

    #[test]
    fn test_remove_directory_recurses() {
        let (fs, store, config) = fixture(2);
        let dir = media_dir(&fs, &store, &config);

        fs.add_file(Path::new("/mnt/video0/Alpha~00001.ts"), 100);
        fs.add_symlink(
            Path::new("/video/Alpha/00001.ts"),
            Path::new("/mnt/video0/Alpha~00001.ts"),
        );
        fs.add_file(Path::new("/video/Alpha/info.vdr"), 1);

        dir.remove(Path::new("/video/Alpha")).unwrap();
        assert!(!fs.exists(Path::new("/video/Alpha")));
        assert!(!fs.exists(Path::new("/mnt/video0/Alpha~00001.ts")));
    }

    #[test]
    fn test_remove_missing_path_is_an_error() {
        let (fs, store, config) = fixture(1);
        let dir = media_dir(&fs, &store, &config);
        assert_matches!(
            dir.remove(Path::new("/video/nope")),
            Err(Error::Fileop { op: "remove", .. })
        );
    }

    #[test]
    fn test_contains() {
        let (fs, store, config) = fixture(2);
        let dir = media_dir(&fs, &store, &config);

        fs.add_file(Path::new("/mnt/video0/Alpha~00001.ts"), 100);
        fs.add_symlink(
            Path::new("/video/Alpha/00001.ts"),
            Path::new("/mnt/video0/Alpha~00001.ts"),
        );
        fs.add_file(Path::new("/elsewhere/clip.ts"), 1);
        fs.add_symlink(Path::new("/video/foreign.ts"), Path::new("/elsewhere/clip.ts"));

        assert!(dir.contains(Path::new("/video/Alpha/00001.ts")));
        assert!(dir.contains(Path::new("/mnt/video0/Alpha~00001.ts")));
        assert!(!dir.contains(Path::new("/video/foreign.ts")));
        assert!(!dir.contains(Path::new("/elsewhere/clip.ts")));
        assert!(!dir.contains(Path::new("/video/missing.ts")));
    }

    #[test]
    fn test_import_dry_run_reports_without_enqueueing() {
        let (fs, store, config) = fixture(2);
        let dir = media_dir(&fs, &store, &config);
        fs.add_file(Path::new("/old/Show/00001.ts"), 100);
        let before = fs.node_count();

        let outcome = dir.import(Path::new("/old"), true, true).unwrap();
        let report = match outcome {
            ImportOutcome::DryRun(r) => r,
            other => panic!("expected dry run, got {:?}", other),
        };
        assert_eq!(fs.node_count(), before);
        assert!(report
            .actions
            .iter()
            .any(|a| matches!(a, ImportAction::Symlink { .. })));
    }

    #[test]
    fn test_import_enqueues_and_completes() {
        let (fs, store, config) = fixture(2);
        let mut dir = media_dir(&fs, &store, &config);
        fs.add_file(Path::new("/old/Show/00001.ts"), 100);
        fs.add_file(Path::new("/old/Other/00001.ts"), 50);

        let outcome = dir.import(Path::new("/old"), false, false).unwrap();
        assert_matches!(outcome, ImportOutcome::Enqueued(ref names) if names.len() == 2);

        dir.shutdown();
        assert!(fs.is_symlink(Path::new("/video/Show/00001.ts")));
        assert!(fs.is_symlink(Path::new("/video/Other/00001.ts")));
        assert!(!fs.exists(Path::new("/old/Show")));
    }

    #[test]
    fn test_import_single_takes_first_only() {
        let (fs, store, config) = fixture(2);
        let mut dir = media_dir(&fs, &store, &config);
        fs.add_file(Path::new("/old/Alpha/00001.ts"), 100);
        fs.add_file(Path::new("/old/Beta/00001.ts"), 50);

        let outcome = dir.import(Path::new("/old"), true, false).unwrap();
        assert_matches!(outcome, ImportOutcome::Enqueued(ref names) if names == &["Alpha"]);
        dir.shutdown();
        assert!(fs.exists(Path::new("/old/Beta")));
    }

    #[test]
    fn test_import_next_names_first_subdirectory() {
        let (fs, store, config) = fixture(1);
        let dir = media_dir(&fs, &store, &config);
        fs.add_file(Path::new("/old/loose.ts"), 1);
        fs.add_file(Path::new("/old/Show/00001.ts"), 100);

        assert_eq!(dir.import_next(Path::new("/old")), Some("Show".to_string()));
        assert_eq!(dir.import_next(Path::new("/empty")), None);
    }

    #[test]
    fn test_balance_disabled_skips_unforced() {
        let (fs, store, mut config) = fixture(2);
        config.balance = false;
        // vol0 under threshold would normally trigger a rebuild
        fs.set_space(
            Path::new("/mnt/video0"),
            VolumeSpace {
                free: GIBIBYTE,
                total: 1000 * GIBIBYTE,
            },
        );
        let dir = media_dir(&fs, &store, &config);

        assert!(!dir.balance(false).unwrap());
        assert!(dir.balance(true).unwrap());
    }

    #[test]
    fn test_balance_persists_rebuilt_seq() {
        let (fs, store, config) = fixture(2);
        let dir = media_dir(&fs, &store, &config);

        assert!(dir.balance(true).unwrap());
        assert_eq!(store.load(DISK_SEQ_KEY), Some(dir.seq()));
    }

    #[test]
    fn test_free_space_and_mib() {
        let (fs, store, config) = fixture(2);
        let dir = media_dir(&fs, &store, &config);
        let (free, used) = dir.free_space();
        assert_eq!(free, 1000 * GIBIBYTE);
        assert_eq!(used, 1000 * GIBIBYTE);
        assert_eq!(dir.free_mib(), 1000 * 1024);
    }

    #[test]
    fn test_toggle_debug() {
        let (fs, store, config) = fixture(1);
        let dir = media_dir(&fs, &store, &config);
        assert!(!dir.debug_enabled());
        assert!(dir.toggle_debug());
        assert!(dir.debug_enabled());
        assert!(!dir.toggle_debug());
    }
}
