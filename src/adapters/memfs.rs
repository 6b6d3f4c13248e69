//! In-memory filesystem adapter
//!
//! Implements the [`Fileops`] port over a map of absolute paths, with
//! per-mount-point space figures. Used by unit and integration tests to
//! exercise the placement core without touching real disks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::domain::{Fileops, VolumeSpace};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    File { size: u64 },
    Symlink { target: PathBuf },
}

/// In-memory [`Fileops`] implementation.
#[derive(Default)]
pub struct MemFileops {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    spaces: Mutex<BTreeMap<PathBuf, VolumeSpace>>,
}

impl MemFileops {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Test fixture helpers
    // -------------------------------------------------------------------------

    /// Create a directory together with all parents.
    pub fn add_dir(&self, path: &Path) {
        let mut nodes = self.nodes.lock();
        for ancestor in ancestors_inclusive(path) {
            nodes.entry(ancestor).or_insert(Node::Dir);
        }
    }

    /// Create a file of `size` bytes, creating parent directories.
    pub fn add_file(&self, path: &Path, size: u64) {
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes.lock().insert(path.to_path_buf(), Node::File { size });
    }

    /// Create a symlink, creating parent directories.
    pub fn add_symlink(&self, link: &Path, target: &Path) {
        if let Some(parent) = link.parent() {
            self.add_dir(parent);
        }
        self.nodes.lock().insert(
            link.to_path_buf(),
            Node::Symlink {
                target: target.to_path_buf(),
            },
        );
    }

    /// Register space figures for the volume mounted at `mount`.
    pub fn set_space(&self, mount: &Path, space: VolumeSpace) {
        self.spaces.lock().insert(mount.to_path_buf(), space);
    }

    /// Symlink target at `path`, if the node is a symlink.
    pub fn symlink_target(&self, path: &Path) -> Option<PathBuf> {
        match self.nodes.lock().get(path) {
            Some(Node::Symlink { target }) => Some(target.clone()),
            _ => None,
        }
    }

    /// Total number of nodes (for no-mutation assertions).
    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Resolve one level of symlink indirection.
    fn resolve(&self, path: &Path) -> Option<Node> {
        let nodes = self.nodes.lock();
        let mut current = path.to_path_buf();
        // bounded walk; symlink loops are a fixture bug
        for _ in 0..16 {
            match nodes.get(&current)? {
                Node::Symlink { target } => current = target.clone(),
                node => return Some(node.clone()),
            }
        }
        None
    }
}

impl Fileops for MemFileops {
    fn exists(&self, path: &Path) -> bool {
        self.nodes.lock().contains_key(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        matches!(self.resolve(path), Some(Node::Dir))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        matches!(self.nodes.lock().get(path), Some(Node::Symlink { .. }))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.nodes.lock().get(path), Some(Node::File { .. }))
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        self.symlink_target(path)
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        match self.resolve(path)? {
            Node::File { size } => Some(size),
            _ => None,
        }
    }

    fn list_children(&self, path: &Path) -> Vec<String> {
        let nodes = self.nodes.lock();
        nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    fn create_symlink(&self, link: &Path, target: &Path) -> Result<()> {
        let mut nodes = self.nodes.lock();
        if nodes.contains_key(link) {
            return Err(Error::Fileop {
                op: "symlink",
                path: link.to_path_buf(),
            });
        }
        nodes.insert(
            link.to_path_buf(),
            Node::Symlink {
                target: target.to_path_buf(),
            },
        );
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        let size = self.file_size(from).ok_or(Error::Fileop {
            op: "copy",
            path: from.to_path_buf(),
        })?;
        self.nodes
            .lock()
            .insert(to.to_path_buf(), Node::File { size });
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut nodes = self.nodes.lock();
        if !nodes.contains_key(from) {
            return Err(Error::Fileop {
                op: "rename",
                path: from.to_path_buf(),
            });
        }
        // move the node and, for directories, the whole subtree
        let moved: Vec<(PathBuf, Node)> = nodes
            .iter()
            .filter(|(p, _)| p.as_path() == from || p.starts_with(from))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect();
        for (p, _) in &moved {
            nodes.remove(p);
        }
        for (p, n) in moved {
            let rel = p.strip_prefix(from).unwrap_or(Path::new(""));
            let dest = if rel.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(rel)
            };
            nodes.insert(dest, n);
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut nodes = self.nodes.lock();
        match nodes.get(path) {
            Some(Node::Dir) => {
                let occupied = nodes.keys().any(|p| p.parent() == Some(path));
                if occupied {
                    return Err(Error::Fileop {
                        op: "remove",
                        path: path.to_path_buf(),
                    });
                }
                nodes.remove(path);
                Ok(())
            }
            Some(_) => {
                nodes.remove(path);
                Ok(())
            }
            None => Err(Error::Fileop {
                op: "remove",
                path: path.to_path_buf(),
            }),
        }
    }

    fn make_directories(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn volume_space(&self, path: &Path) -> Result<VolumeSpace> {
        let spaces = self.spaces.lock();
        spaces
            .iter()
            .filter(|(mount, _)| path.starts_with(mount))
            .max_by_key(|(mount, _)| mount.as_os_str().len())
            .map(|(_, &space)| space)
            .ok_or_else(|| Error::SpaceQuery(path.to_path_buf()))
    }
}

fn ancestors_inclusive(path: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = path
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .collect();
    dirs.reverse();
    dirs
}
