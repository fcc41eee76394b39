//! Scoped scratch storage
//!
//! [`TempManager`] hands out uniquely named folders and files below one
//! scratch root. Names come from [`tempfile::Builder`], which creates each
//! entry exclusively, so concurrent callers on different workers can never
//! receive the same name.
//!
//! Both [`TempFolder`] and [`TempFile`] delete their entry exactly once:
//! explicitly through `release()`, or on drop if nobody released them first.
//! Releasing something that is already gone is not an error.

use crate::error::{Error, Result};
use crate::paths::AbsolutePath;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FOLDER_PREFIX: &str = "vx-";
const FILE_PREFIX: &str = "vx-";

/// Creates scratch folders and files under a shared root
#[derive(Clone, Debug)]
pub struct TempManager {
    root: PathBuf,
}

impl TempManager {
    /// Use `root` as the scratch root; it is created if missing
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| Error::Config {
            message: format!("cannot create scratch root {}: {}", root.display(), e),
            key: Some("scratch_dir".to_string()),
        })?;
        Ok(Self { root })
    }

    /// The scratch root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty, uniquely named folder
    pub fn create_folder(&self) -> Result<TempFolder> {
        let dir = tempfile::Builder::new()
            .prefix(FOLDER_PREFIX)
            .tempdir_in(&self.root)?;
        let path = AbsolutePath::new(dir.path())?;
        debug!(path = %path, "created temp folder");
        Ok(TempFolder {
            path,
            inner: Some(dir),
        })
    }

    /// Create an empty, uniquely named file with the given suffix (e.g. `.txt`)
    pub fn create_file(&self, suffix: &str) -> Result<TempFile> {
        let file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.root)?;
        let path = AbsolutePath::new(file.path())?;
        debug!(path = %path, "created temp file");
        Ok(TempFile {
            path,
            inner: Some(file.into_temp_path()),
        })
    }
}

/// A scratch directory owned by whoever created it
#[derive(Debug)]
pub struct TempFolder {
    path: AbsolutePath,
    inner: Option<tempfile::TempDir>,
}

impl TempFolder {
    /// Location on disk
    pub fn path(&self) -> &AbsolutePath {
        &self.path
    }

    /// Whether this folder has already been released
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Delete the folder and everything in it
    ///
    /// Calling this more than once, or after the folder was removed by
    /// someone else, succeeds.
    pub fn release(&mut self) -> Result<()> {
        let Some(dir) = self.inner.take() else {
            return Ok(());
        };
        match dir.close() {
            Ok(()) => {
                debug!(path = %self.path, "released temp folder");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for TempFolder {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path, error = %e, "failed to remove temp folder");
        }
    }
}

/// A scratch file owned by whoever created it
#[derive(Debug)]
pub struct TempFile {
    path: AbsolutePath,
    inner: Option<tempfile::TempPath>,
}

impl TempFile {
    /// Location on disk
    pub fn path(&self) -> &AbsolutePath {
        &self.path
    }

    /// Whether this file has already been released
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Delete the file; idempotent
    pub fn release(&mut self) -> Result<()> {
        let Some(path) = self.inner.take() else {
            return Ok(());
        };
        match path.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path, error = %e, "failed to remove temp file");
        }
    }
}
