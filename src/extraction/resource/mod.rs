//! Game resource containers read in-process
//!
//! BSA (Morrowind through Skyrim SE) and BA2 (Fallout 4 and Starfield,
//! general and texture) archives are opened through the `ba2` crate. Only the
//! index is read up front; each entry becomes a lazy [`VirtualFile`] holding an
//! `Arc` to the open [`ArchiveHandle`], and content is decoded on demand when a
//! caller opens the file.
//!
//! These containers always come back whole. A path filter on the request is
//! ignored, the same way the installer backends ignore it.

mod handle;

pub use handle::{ArchiveEntry, ArchiveHandle, ResourceFormat};

use super::traits::{BackendCapabilities, ExtractionBackend, ExtractionRequest};
use crate::error::{Error, Result};
use crate::paths::AbsolutePath;
use crate::vfs::VirtualFile;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Reads BSA and BA2 containers without an external tool
#[derive(Clone, Copy, Debug, Default)]
pub struct ResourceBackend;

impl ResourceBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }

    /// Open `path` and list every entry as a lazy file (blocking)
    pub fn read_index(path: &Path) -> Result<Vec<VirtualFile>> {
        let archive = Arc::new(ArchiveHandle::open(path)?);
        let entries = archive.entries()?;
        debug!(
            ?path,
            format = ?archive.format(),
            entries = entries.len(),
            "read resource index"
        );
        Ok(entries
            .into_iter()
            .map(|(name, entry)| VirtualFile::in_archive(name, Arc::clone(&archive), entry))
            .collect())
    }
}

#[async_trait]
impl ExtractionBackend for ResourceBackend {
    async fn produce(&self, request: ExtractionRequest<'_>) -> Result<Vec<VirtualFile>> {
        let label = request.label();
        request.notifier.status(format!("Reading {label}"));
        let path = request.source.as_path().to_path_buf();
        let files = tokio::task::spawn_blocking(move || Self::read_index(&path))
            .await
            .map_err(|e| Error::TaskFailed(format!("reading resource index: {e}")))??;

        info!(source = %request.source, files = files.len(), "resource container indexed");
        Ok(files)
    }

    async fn can_extract(&self, source: &AbsolutePath) -> bool {
        let path = source.as_path().to_path_buf();
        matches!(
            tokio::task::spawn_blocking(move || ArchiveHandle::open(&path)).await,
            Ok(Ok(_))
        )
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            selective: false,
            lazy: true,
        }
    }

    fn name(&self) -> &'static str {
        "resource"
    }
}

#[cfg(test)]
pub(crate) mod fixtures;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::paths::RelativePath;
    use crate::progress::Notifier;
    use crate::temp::TempManager;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_backend_lists_everything_and_stays_lazy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("textures.bsa");
        std::fs::write(
            &path,
            tes4_bsa(
                104,
                &[
                    ("textures", "a.dds", b"AAAA".as_slice(), false),
                    ("textures", "b.dds", b"BBBBBB".as_slice(), true),
                ],
            ),
        )
        .unwrap();

        let source = AbsolutePath::new(&path).unwrap();
        let temp = TempManager::new(dir.path().join("scratch")).unwrap();
        let notifier = Notifier::default();
        let only: HashSet<RelativePath> = [RelativePath::new("Textures\\B.dds").unwrap()].into();

        let backend = ResourceBackend::new();
        assert!(!backend.capabilities().selective);
        assert!(backend.can_extract(&source).await);
        let mut files = backend
            .produce(ExtractionRequest::new(&source, &notifier, &temp).with_only_files(&only))
            .await
            .unwrap();
        files.sort_by(|a, b| a.path().as_str().cmp(b.path().as_str()));

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(VirtualFile::is_lazy));
        assert_eq!(files[0].read_all().unwrap(), b"AAAA");
        assert_eq!(files[1].size(), 6);
        assert_eq!(files[1].read_all().unwrap(), b"BBBBBB");
    }

    #[tokio::test]
    async fn test_files_outlive_the_listing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Morrowind.bsa");
        std::fs::write(&path, tes3_bsa(&[("a.txt", b"first".as_slice())])).unwrap();

        let file = {
            let mut files = ResourceBackend::read_index(&path).unwrap();
            files.pop().unwrap()
        };
        assert_eq!(file.read_all().unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_can_extract_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ba2");
        std::fs::write(&path, b"BTDX\x01\x00").unwrap();
        let source = AbsolutePath::new(&path).unwrap();
        assert!(!ResourceBackend::new().can_extract(&source).await);
    }
}
