//! Virtual files and extraction results
//!
//! A [`VirtualFile`] is a name plus a way to read its bytes. The bytes either
//! live in a real file under an extraction folder, or inside a container that
//! is still open. In the latter case every file holds an `Arc` to the shared
//! [`ArchiveHandle`], so the container stays open for as long as any of its
//! files is alive. The handle is read-only and every open decodes its own
//! copy of the entry, so files from the same container can be read
//! concurrently.

use crate::error::{Error, Result};
use crate::extraction::{ArchiveEntry, ArchiveHandle};
use crate::paths::{AbsolutePath, RelativePath};
use crate::temp::TempFolder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a virtual file's bytes come from
#[derive(Clone, Debug)]
pub enum FileSource {
    /// A real file produced by an extraction
    OnDisk {
        /// File location
        path: AbsolutePath,
        /// Size at enumeration time
        size: u64,
    },
    /// A record inside a still-open container
    InArchive {
        /// Shared container handle
        archive: Arc<ArchiveHandle>,
        /// Record location
        entry: ArchiveEntry,
    },
}

/// A named, readable unit of extracted content
#[derive(Clone, Debug)]
pub struct VirtualFile {
    path: RelativePath,
    source: FileSource,
}

impl VirtualFile {
    /// A file that exists on disk
    pub fn on_disk(path: RelativePath, location: AbsolutePath, size: u64) -> Self {
        Self {
            path,
            source: FileSource::OnDisk {
                path: location,
                size,
            },
        }
    }

    /// A record inside an open container
    pub fn in_archive(
        path: RelativePath,
        archive: Arc<ArchiveHandle>,
        entry: ArchiveEntry,
    ) -> Self {
        Self {
            path,
            source: FileSource::InArchive { archive, entry },
        }
    }

    /// Path relative to the container root
    pub fn path(&self) -> &RelativePath {
        &self.path
    }

    /// Backing storage
    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Content size in bytes
    pub fn size(&self) -> u64 {
        match &self.source {
            FileSource::OnDisk { size, .. } => *size,
            FileSource::InArchive { archive, entry } => archive.size_of(entry),
        }
    }

    /// Whether reads go to a still-open container
    pub fn is_lazy(&self) -> bool {
        matches!(self.source, FileSource::InArchive { .. })
    }

    /// On-disk location, for materialized files
    pub fn disk_path(&self) -> Option<&AbsolutePath> {
        match &self.source {
            FileSource::OnDisk { path, .. } => Some(path),
            FileSource::InArchive { .. } => None,
        }
    }

    /// Open the content for reading
    ///
    /// A file inside a container is decoded in full before the reader is
    /// returned.
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match &self.source {
            FileSource::OnDisk { path, .. } => Ok(Box::new(File::open(path)?)),
            FileSource::InArchive { .. } => Ok(Box::new(Cursor::new(self.read_all()?))),
        }
    }

    /// Read the whole content into memory
    pub fn read_all(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::OnDisk { path, size } => {
                let mut buf = Vec::with_capacity(usize::try_from(*size).unwrap_or(0));
                File::open(path)?.read_to_end(&mut buf)?;
                Ok(buf)
            }
            FileSource::InArchive { archive, entry } => {
                archive.read(entry).map_err(|e| match e {
                    Error::BackendFault {
                        source_path,
                        reason,
                    } => Error::BackendFault {
                        source_path,
                        reason: format!("{}: {reason}", self.path),
                    },
                    other => other,
                })
            }
        }
    }
}

/// The listing produced by one extraction
///
/// Owns the folder the files were extracted into, if any; dropping the result
/// (or calling [`release`](Self::release)) deletes it.
#[derive(Debug)]
pub struct ExtractionResult {
    files: BTreeMap<RelativePath, VirtualFile>,
    suppressed_error: Option<String>,
    // Declared last so it is removed after the file views above are gone
    temp: Option<TempFolder>,
}

impl ExtractionResult {
    /// Build a result from a backend listing
    pub fn new(files: Vec<VirtualFile>, temp: Option<TempFolder>) -> Self {
        let mut map = BTreeMap::new();
        for file in files {
            let key = file.path().clone();
            if let Some(previous) = map.insert(key, file) {
                debug!(path = %previous.path(), "duplicate entry, keeping the later one");
            }
        }
        Self {
            files: map,
            suppressed_error: None,
            temp,
        }
    }

    /// An empty result standing in for a failed extraction
    pub fn empty(temp: TempFolder, suppressed_error: impl Into<String>) -> Self {
        Self {
            files: BTreeMap::new(),
            suppressed_error: Some(suppressed_error.into()),
            temp: Some(temp),
        }
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the listing is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up one file (case-insensitive)
    pub fn get(&self, path: &RelativePath) -> Option<&VirtualFile> {
        self.files.get(path)
    }

    /// Whether `path` is in the listing
    pub fn contains(&self, path: &RelativePath) -> bool {
        self.files.contains_key(path)
    }

    /// Iterate over files in path order
    pub fn iter(&self) -> impl Iterator<Item = (&RelativePath, &VirtualFile)> {
        self.files.iter()
    }

    /// All paths in order
    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.files.keys()
    }

    /// The folder backing this result, if it owns one
    pub fn temp_folder(&self) -> Option<&TempFolder> {
        self.temp.as_ref()
    }

    /// Error swallowed by non-strict extraction, if this result stands in for one
    pub fn suppressed_error(&self) -> Option<&str> {
        self.suppressed_error.as_deref()
    }

    /// Drop the listing and delete the backing folder now
    pub fn release(mut self) -> Result<()> {
        self.files.clear();
        match self.temp.as_mut() {
            Some(temp) => temp.release(),
            None => Ok(()),
        }
    }
}

/// Enumerate every regular file under `root` as on-disk virtual files
///
/// Symlinks are skipped rather than followed, so nothing outside `root` can
/// end up in the listing.
pub fn collect_disk_files(root: &AbsolutePath) -> Result<Vec<VirtualFile>> {
    fn visit(dir: &Path, root: &AbsolutePath, files: &mut Vec<VirtualFile>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_symlink() {
                warn!(?path, "skipping symlink in extraction output");
                continue;
            }
            if file_type.is_dir() {
                visit(&path, root, files)?;
                continue;
            }

            let location = AbsolutePath::new(&path)?;
            let relative = location.relative_to(root)?;
            let size = entry.metadata()?.len();
            files.push(VirtualFile::on_disk(relative, location, size));
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit(root.as_path(), root, &mut files)?;
    Ok(files)
}
