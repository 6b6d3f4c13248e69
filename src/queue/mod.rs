//! Background Task Queue
//!
//! A bounded FIFO shared between the façade (producer) and a fixed pool
//! of worker threads. Long-running file relocations and directory
//! imports go through here so the caller's path returns immediately.
//!
//! - `push` blocks while the queue is at capacity (backpressure), never
//!   drops a task
//! - workers run each task to completion; task errors are logged and
//!   the task abandoned, the worker and its siblings keep going
//! - `shutdown` is drain-to-empty: queued tasks still execute, then
//!   every worker exits and is joined
//!
//! There is no cancellation and no timeout; a stuck I/O primitive
//! stalls its worker indefinitely (acceptable for local disks).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::domain::Fileops;
use crate::error::{Error, Result};
use crate::flatten::{flat_path, is_video_file};

// =============================================================================
// Tasks
// =============================================================================

/// One deferred operation. Created by the façade, consumed exactly once
/// by a worker, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Copy `source` to `dest`; with `remove_source` the source is
    /// deleted after the destination size has been verified.
    Relocate {
        source: PathBuf,
        dest: PathBuf,
        remove_source: bool,
    },
    /// Recursively migrate `source_root/dir` into the logical tree,
    /// placing payload files on `volume`.
    Import {
        logical_root: PathBuf,
        volume: PathBuf,
        source_root: PathBuf,
        dir: String,
        dry_run: bool,
    },
}

impl Task {
    /// Short label for logging and in-flight tracking.
    pub fn label(&self) -> String {
        match self {
            Task::Relocate { source, dest, .. } => {
                format!("relocate {} -> {}", source.display(), dest.display())
            }
            Task::Import { source_root, dir, .. } => {
                format!("import {}/{}", source_root.display(), dir)
            }
        }
    }

    /// Execute the task against the filesystem port.
    pub fn run(&self, fs: &dyn Fileops) -> Result<()> {
        match self {
            Task::Relocate {
                source,
                dest,
                remove_source,
            } => relocate_file(fs, source, dest, *remove_source),
            Task::Import {
                logical_root,
                volume,
                source_root,
                dir,
                dry_run,
            } => {
                let mut report = ImportReport::default();
                import_tree(fs, logical_root, volume, source_root, dir, *dry_run, &mut report)
            }
        }
    }
}

/// Copy a file and, for moves, delete the source only after the
/// destination reports the same size.
pub fn relocate_file(
    fs: &dyn Fileops,
    source: &Path,
    dest: &Path,
    remove_source: bool,
) -> Result<()> {
    fs.copy_file(source, dest)?;
    if remove_source {
        let src_size = fs.file_size(source);
        if src_size.is_some() && src_size == fs.file_size(dest) {
            fs.remove(source)?;
        } else {
            return Err(Error::SizeMismatch {
                source_path: source.to_path_buf(),
                dest_path: dest.to_path_buf(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Import walk
// =============================================================================

/// One intended (dry run) or performed filesystem action of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ImportAction {
    MakeDir { path: PathBuf },
    Symlink { link: PathBuf, target: PathBuf },
    MoveFile { from: PathBuf, to: PathBuf },
    RemoveDir { path: PathBuf },
}

/// Trace of an import run; for dry runs this is the entire output.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportReport {
    pub actions: Vec<ImportAction>,
}

impl ImportReport {
    fn record(&mut self, action: ImportAction, dry_run: bool) {
        if dry_run {
            info!("[DRY-RUN] {:?}", action);
        } else {
            debug!("{:?}", action);
        }
        self.actions.push(action);
    }
}

/// Recursively migrate `source_root/dir` into `logical_root/dir`.
///
/// Payload files move to `volume` under their flattened name with a
/// symlink left at the mirrored logical location; auxiliary files move
/// verbatim; subdirectories recurse with the same destination volume.
/// A fully drained source directory is removed. With `dry_run` nothing
/// on disk changes; the report carries the intended actions.
pub fn import_tree(
    fs: &dyn Fileops,
    logical_root: &Path,
    volume: &Path,
    source_root: &Path,
    dir: &str,
    dry_run: bool,
    report: &mut ImportReport,
) -> Result<()> {
    let dest = logical_root.join(dir);
    let src = source_root.join(dir);

    if !fs.is_directory(&dest) {
        report.record(ImportAction::MakeDir { path: dest.clone() }, dry_run);
        if !dry_run {
            fs.make_directories(&dest)?;
        }
    }

    for entry in fs.list_children(&src) {
        let from = src.join(&entry);
        let to = dest.join(&entry);

        if fs.is_file(&from) {
            if is_video_file(&entry) {
                let target = volume.join(flat_path(&format!("{}/{}", dir, entry)));
                report.record(
                    ImportAction::Symlink {
                        link: to.clone(),
                        target: target.clone(),
                    },
                    dry_run,
                );
                report.record(
                    ImportAction::MoveFile {
                        from: from.clone(),
                        to: target.clone(),
                    },
                    dry_run,
                );
                if !dry_run {
                    fs.create_symlink(&to, &target)?;
                    relocate_file(fs, &from, &target, true)?;
                }
            } else {
                report.record(
                    ImportAction::MoveFile {
                        from: from.clone(),
                        to: to.clone(),
                    },
                    dry_run,
                );
                if !dry_run {
                    relocate_file(fs, &from, &to, true)?;
                }
            }
        } else if fs.is_directory(&from) {
            import_tree(
                fs,
                logical_root,
                volume,
                source_root,
                &format!("{}/{}", dir, entry),
                dry_run,
                report,
            )?;
        }
    }

    report.record(ImportAction::RemoveDir { path: src.clone() }, dry_run);
    if !dry_run {
        fs.remove(&src)?;
    }
    Ok(())
}

// =============================================================================
// Work Queue
// =============================================================================

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Queue capacity; `push` blocks while full.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers: parallelism,
            capacity: parallelism,
        }
    }
}

/// Bounded FIFO plus a fixed pool of worker threads draining it.
pub struct WorkQueue {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    active: Arc<DashMap<u64, String>>,
}

impl WorkQueue {
    pub fn new(config: QueueConfig, fs: Arc<dyn Fileops>) -> Self {
        let (tx, rx) = bounded::<Task>(config.capacity.max(1));
        let active: Arc<DashMap<u64, String>> = Arc::new(DashMap::new());

        let workers = (0..config.workers.max(1))
            .filter_map(|i| {
                let rx = rx.clone();
                let fs = Arc::clone(&fs);
                let active = Arc::clone(&active);
                let spawned = std::thread::Builder::new()
                    .name(format!("mediashard-worker-{}", i))
                    .spawn(move || worker_loop(rx, fs, active));
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        error!("cannot spawn worker {}: {}", i, e);
                        None
                    }
                }
            })
            .collect();

        Self {
            tx: Some(tx),
            workers,
            active,
        }
    }

    /// Enqueue a task, blocking while the queue is at capacity.
    pub fn push(&self, task: Task) -> Result<()> {
        debug!("queueing task: {}", task.label());
        match &self.tx {
            Some(tx) => tx.send(task).map_err(|_| Error::QueueClosed),
            None => Err(Error::QueueClosed),
        }
    }

    /// Number of tasks currently being executed by workers.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Stop accepting work, let the workers drain the queue, and join
    /// them. Queued-but-unexecuted tasks complete before this returns.
    pub fn shutdown(&mut self) {
        if self.tx.take().is_some() {
            info!("task queue shutting down, draining {} workers", self.workers.len());
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Receiver<Task>, fs: Arc<dyn Fileops>, active: Arc<DashMap<u64, String>>) {
    static TASK_SEQ: AtomicU64 = AtomicU64::new(0);

    // recv fails only once every sender is gone and the queue is empty
    while let Ok(task) = rx.recv() {
        let id = TASK_SEQ.fetch_add(1, Ordering::Relaxed);
        active.insert(id, task.label());
        if let Err(e) = task.run(&*fs) {
            error!("background task failed ({}): {}", task.label(), e);
        }
        active.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemFileops;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Fileops decorator that slows down copies and counts them.
    struct SlowFs {
        inner: MemFileops,
        delay: Duration,
        copies: AtomicUsize,
    }

    impl SlowFs {
        fn new(inner: MemFileops, delay: Duration) -> Self {
            Self {
                inner,
                delay,
                copies: AtomicUsize::new(0),
            }
        }
    }

    impl Fileops for SlowFs {
        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }
        fn is_directory(&self, path: &Path) -> bool {
            self.inner.is_directory(path)
        }
        fn is_symlink(&self, path: &Path) -> bool {
            self.inner.is_symlink(path)
        }
        fn is_file(&self, path: &Path) -> bool {
            self.inner.is_file(path)
        }
        fn read_link(&self, path: &Path) -> Option<PathBuf> {
            self.inner.read_link(path)
        }
        fn file_size(&self, path: &Path) -> Option<u64> {
            self.inner.file_size(path)
        }
        fn list_children(&self, path: &Path) -> Vec<String> {
            self.inner.list_children(path)
        }
        fn create_symlink(&self, link: &Path, target: &Path) -> Result<()> {
            self.inner.create_symlink(link, target)
        }
        fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
            std::thread::sleep(self.delay);
            self.copies.fetch_add(1, Ordering::SeqCst);
            self.inner.copy_file(from, to)
        }
        fn rename(&self, from: &Path, to: &Path) -> Result<()> {
            self.inner.rename(from, to)
        }
        fn remove(&self, path: &Path) -> Result<()> {
            self.inner.remove(path)
        }
        fn make_directories(&self, path: &Path) -> Result<()> {
            self.inner.make_directories(path)
        }
        fn volume_space(&self, path: &Path) -> Result<crate::domain::VolumeSpace> {
            self.inner.volume_space(path)
        }
    }

    fn relocate_task(i: usize) -> Task {
        Task::Relocate {
            source: PathBuf::from(format!("/src/file{}.ts", i)),
            dest: PathBuf::from(format!("/dst/file{}.ts", i)),
            remove_source: false,
        }
    }

    #[test]
    fn test_relocate_copy_verify_delete() {
        let fs = MemFileops::new();
        fs.add_file(Path::new("/src/a.ts"), 42);
        fs.add_dir(Path::new("/dst"));

        relocate_file(&fs, Path::new("/src/a.ts"), Path::new("/dst/a.ts"), true).unwrap();
        assert!(!fs.exists(Path::new("/src/a.ts")));
        assert_eq!(fs.file_size(Path::new("/dst/a.ts")), Some(42));
    }

    #[test]
    fn test_relocate_copy_only_keeps_source() {
        let fs = MemFileops::new();
        fs.add_file(Path::new("/src/a.ts"), 42);
        fs.add_dir(Path::new("/dst"));

        relocate_file(&fs, Path::new("/src/a.ts"), Path::new("/dst/a.ts"), false).unwrap();
        assert!(fs.exists(Path::new("/src/a.ts")));
        assert!(fs.exists(Path::new("/dst/a.ts")));
    }

    #[test]
    fn test_relocate_missing_source_fails() {
        let fs = MemFileops::new();
        let result = relocate_file(&fs, Path::new("/nope.ts"), Path::new("/dst.ts"), true);
        assert!(result.is_err());
    }

    #[test]
    fn test_queue_processes_everything_pushed() {
        let fs = MemFileops::new();
        for i in 0..8 {
            fs.add_file(&PathBuf::from(format!("/src/file{}.ts", i)), 10);
        }
        fs.add_dir(Path::new("/dst"));
        let fs = Arc::new(fs);

        let mut queue = WorkQueue::new(
            QueueConfig {
                workers: 2,
                capacity: 2,
            },
            Arc::clone(&fs) as Arc<dyn Fileops>,
        );
        for i in 0..8 {
            queue.push(relocate_task(i)).unwrap();
        }
        queue.shutdown();

        for i in 0..8 {
            assert!(fs.exists(&PathBuf::from(format!("/dst/file{}.ts", i))));
        }
        assert_eq!(queue.active_count(), 0);
    }

    #[test]
    fn test_push_blocks_at_capacity() {
        let inner = MemFileops::new();
        for i in 0..3 {
            inner.add_file(&PathBuf::from(format!("/src/file{}.ts", i)), 10);
        }
        inner.add_dir(Path::new("/dst"));
        let fs = Arc::new(SlowFs::new(inner, Duration::from_millis(60)));

        let mut queue = WorkQueue::new(
            QueueConfig {
                workers: 1,
                capacity: 1,
            },
            Arc::clone(&fs) as Arc<dyn Fileops>,
        );

        // task0 is picked up by the worker, task1 fills the queue; the
        // third push cannot proceed before the worker finishes task0
        let start = Instant::now();
        for i in 0..3 {
            queue.push(relocate_task(i)).unwrap();
        }
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(40),
            "pushes returned after {:?}, backpressure did not engage",
            elapsed
        );

        queue.shutdown();
        assert_eq!(fs.copies.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_shutdown_drains_pending_tasks() {
        let inner = MemFileops::new();
        for i in 0..4 {
            inner.add_file(&PathBuf::from(format!("/src/file{}.ts", i)), 10);
        }
        inner.add_dir(Path::new("/dst"));
        let fs = Arc::new(SlowFs::new(inner, Duration::from_millis(20)));

        let mut queue = WorkQueue::new(
            QueueConfig {
                workers: 1,
                capacity: 4,
            },
            Arc::clone(&fs) as Arc<dyn Fileops>,
        );
        for i in 0..4 {
            queue.push(relocate_task(i)).unwrap();
        }
        queue.shutdown();

        // graceful drain: everything queued before shutdown completed
        assert_eq!(fs.copies.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_failed_task_does_not_stop_the_worker() {
        let fs = MemFileops::new();
        fs.add_file(Path::new("/src/good.ts"), 10);
        fs.add_dir(Path::new("/dst"));
        let fs = Arc::new(fs);

        let mut queue = WorkQueue::new(
            QueueConfig {
                workers: 1,
                capacity: 4,
            },
            Arc::clone(&fs) as Arc<dyn Fileops>,
        );
        queue
            .push(Task::Relocate {
                source: PathBuf::from("/src/missing.ts"),
                dest: PathBuf::from("/dst/missing.ts"),
                remove_source: true,
            })
            .unwrap();
        queue
            .push(Task::Relocate {
                source: PathBuf::from("/src/good.ts"),
                dest: PathBuf::from("/dst/good.ts"),
                remove_source: false,
            })
            .unwrap();
        queue.shutdown();

        assert!(fs.exists(Path::new("/dst/good.ts")));
        assert!(!fs.exists(Path::new("/dst/missing.ts")));
    }

    #[test]
    fn test_push_after_shutdown_is_rejected() {
        use assert_matches::assert_matches;

        let fs: Arc<dyn Fileops> = Arc::new(MemFileops::new());
        let mut queue = WorkQueue::new(QueueConfig::default(), fs);
        queue.shutdown();
        assert_matches!(queue.push(relocate_task(0)), Err(Error::QueueClosed));
    }

    #[test]
    fn test_import_tree_dry_run_reports_without_mutation() {
        let fs = MemFileops::new();
        fs.add_file(Path::new("/old/Show/00001.ts"), 100);
        fs.add_file(Path::new("/old/Show/info.vdr"), 1);
        fs.add_dir(Path::new("/video"));
        fs.add_dir(Path::new("/mnt/video0"));
        let before = fs.node_count();

        let mut report = ImportReport::default();
        import_tree(
            &fs,
            Path::new("/video"),
            Path::new("/mnt/video0"),
            Path::new("/old"),
            "Show",
            true,
            &mut report,
        )
        .unwrap();

        assert_eq!(fs.node_count(), before);
        // mkdir, symlink+move for the payload, move for the metadata,
        // and the final source removal
        assert!(report
            .actions
            .iter()
            .any(|a| matches!(a, ImportAction::Symlink { .. })));
        let moves = report
            .actions
            .iter()
            .filter(|a| matches!(a, ImportAction::MoveFile { .. }))
            .count();
        assert_eq!(moves, 2);
        assert!(report
            .actions
            .iter()
            .any(|a| matches!(a, ImportAction::RemoveDir { .. })));
    }

    #[test]
    fn test_import_tree_moves_payload_to_volume() {
        let fs = MemFileops::new();
        fs.add_file(Path::new("/old/Show/00001.ts"), 100);
        fs.add_file(Path::new("/old/Show/info.vdr"), 1);
        fs.add_file(Path::new("/old/Show/Extras/00002.ts"), 50);
        fs.add_dir(Path::new("/video"));
        fs.add_dir(Path::new("/mnt/video1"));

        let mut report = ImportReport::default();
        import_tree(
            &fs,
            Path::new("/video"),
            Path::new("/mnt/video1"),
            Path::new("/old"),
            "Show",
            false,
            &mut report,
        )
        .unwrap();

        // payload lives flat on the volume, symlinked from the tree
        assert_eq!(
            fs.symlink_target(Path::new("/video/Show/00001.ts")),
            Some(PathBuf::from("/mnt/video1/Show~00001.ts"))
        );
        assert!(fs.is_file(Path::new("/mnt/video1/Show~00001.ts")));
        // metadata moved verbatim
        assert!(fs.is_file(Path::new("/video/Show/info.vdr")));
        // nested directory recursed onto the same volume
        assert!(fs.is_file(Path::new("/mnt/video1/Show~Extras~00002.ts")));
        // drained source removed
        assert!(!fs.exists(Path::new("/old/Show")));
    }
}
