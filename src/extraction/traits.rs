//! Traits and types shared by extraction backends

use crate::error::Result;
use crate::paths::{AbsolutePath, RelativePath};
use crate::progress::Notifier;
use crate::temp::TempManager;
use crate::vfs::VirtualFile;
use async_trait::async_trait;
use std::collections::HashSet;

/// What a backend can do besides listing a whole container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Honors a requested subset of paths instead of producing everything
    pub selective: bool,
    /// Serves files straight from the open container, without a destination folder
    pub lazy: bool,
}

/// Everything a backend needs for one extraction
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// The container to read
    pub source: &'a AbsolutePath,
    /// Folder to materialize files into; `None` for lazy backends
    pub destination: Option<&'a AbsolutePath>,
    /// Only produce these paths (matched case-insensitively)
    pub only_files: Option<&'a HashSet<RelativePath>>,
    /// Where status and progress go
    pub notifier: &'a Notifier,
    /// Scratch space for list files and intermediate data
    pub temp: &'a TempManager,
}

impl<'a> ExtractionRequest<'a> {
    /// A request for every file in `source`
    pub fn new(source: &'a AbsolutePath, notifier: &'a Notifier, temp: &'a TempManager) -> Self {
        Self {
            source,
            destination: None,
            only_files: None,
            notifier,
            temp,
        }
    }

    /// Materialize files under `destination`
    pub fn with_destination(mut self, destination: &'a AbsolutePath) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Restrict the request to `only_files`
    pub fn with_only_files(mut self, only_files: &'a HashSet<RelativePath>) -> Self {
        self.only_files = Some(only_files);
        self
    }

    /// Short label for notifications
    pub fn label(&self) -> String {
        self.source
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.source.to_string())
    }

    /// Whether `path` was asked for (always true without a filter)
    pub fn wants(&self, path: &RelativePath) -> bool {
        self.only_files.is_none_or(|only| only.contains(path))
    }
}

/// A strategy that turns one container family into virtual files
///
/// Implementations either drive an external tool into a destination folder or
/// parse the container in-process and hand out lazy views into it. The
/// dispatcher picks one per [`ContainerType`](crate::ContainerType) and
/// consults [`capabilities`](Self::capabilities) to decide whether a scratch
/// folder is needed and whether the path filter is passed through.
///
/// # Examples
///
/// ```no_run
/// use virtual_extract::extraction::{ExtractionBackend, ExtractionRequest, SevenZipBackend};
/// use virtual_extract::{AbsolutePath, Notifier, TempManager};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = SevenZipBackend::new("/usr/bin/7z".into());
/// let temp = TempManager::new("/tmp/vx")?;
/// let notifier = Notifier::default();
/// let source = AbsolutePath::new("/data/mod.7z")?;
/// let dest = temp.create_folder()?;
///
/// let request = ExtractionRequest::new(&source, &notifier, &temp).with_destination(dest.path());
/// let files = backend.produce(request).await?;
/// println!("{} files", files.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Produce the files of `request.source`
    ///
    /// Errors are returned as-is; the dispatcher attaches the source path and
    /// decides whether to surface them.
    async fn produce(&self, request: ExtractionRequest<'_>) -> Result<Vec<VirtualFile>>;

    /// Cheap trial: whether this backend can read `source`
    ///
    /// Never fails; anything that goes wrong means `false`.
    async fn can_extract(&self, source: &AbsolutePath) -> bool;

    /// What the backend supports
    fn capabilities(&self) -> BackendCapabilities;

    /// Name for logs
    fn name(&self) -> &'static str;
}
