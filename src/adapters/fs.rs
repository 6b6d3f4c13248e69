//! Standard filesystem adapter
//!
//! Production [`Fileops`] implementation over `std::fs`, plus a
//! `statvfs` free-space query on unix. Every failure degrades to a
//! boolean/`None`/`Err` result; nothing here panics.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Fileops, VolumeSpace};
use crate::error::{Error, Result};

/// [`Fileops`] backed by the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileops;

impl StdFileops {
    pub fn new() -> Self {
        Self
    }
}

impl Fileops for StdFileops {
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_directory(&self, path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_file())
            .unwrap_or(false)
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        fs::read_link(path).ok()
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        fs::metadata(path).map(|m| m.len()).ok()
    }

    fn list_children(&self, path: &Path) -> Vec<String> {
        match fs::read_dir(path) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot list directory: {}", e);
                Vec::new()
            }
        }
    }

    #[cfg(unix)]
    fn create_symlink(&self, link: &Path, target: &Path) -> Result<()> {
        std::os::unix::fs::symlink(target, link).map_err(Error::Io)
    }

    #[cfg(not(unix))]
    fn create_symlink(&self, link: &Path, _target: &Path) -> Result<()> {
        Err(Error::Fileop {
            op: "symlink",
            path: link.to_path_buf(),
        })
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        fs::copy(from, to).map_err(Error::Io)?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(Error::Io)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let meta = fs::symlink_metadata(path).map_err(Error::Io)?;
        if meta.is_dir() {
            fs::remove_dir(path).map_err(Error::Io)
        } else {
            fs::remove_file(path).map_err(Error::Io)
        }
    }

    fn make_directories(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(Error::Io)
    }

    #[cfg(unix)]
    fn volume_space(&self, path: &Path) -> Result<VolumeSpace> {
        use std::os::unix::ffi::OsStrExt;

        let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
            .map_err(|_| Error::SpaceQuery(path.to_path_buf()))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(cpath.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(Error::SpaceQuery(path.to_path_buf()));
        }

        let bsize = stat.f_bsize as u64;
        Ok(VolumeSpace {
            free: bsize * stat.f_bavail as u64,
            total: bsize * stat.f_blocks as u64,
        })
    }

    #[cfg(not(unix))]
    fn volume_space(&self, path: &Path) -> Result<VolumeSpace> {
        Err(Error::SpaceQuery(path.to_path_buf()))
    }
}
