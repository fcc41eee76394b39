//! Extraction dispatcher
//!
//! [`FileExtractor`] is the single entry point callers use. For each source it:
//!
//! 1. resolves a [`ContainerType`], from the extension override table first
//!    and from the file's signature otherwise;
//! 2. picks the backend registered for that type;
//! 3. hands the backend a fresh scratch folder (unless the backend serves
//!    files lazily) and the path filter (if the backend can select);
//! 4. wraps the backend's files in an [`ExtractionResult`] that owns the
//!    scratch folder.
//!
//! ## Strict and non-strict mode
//!
//! In strict mode every failure is returned to the caller with the source path
//! attached. In non-strict mode any failure is logged and replaced by an empty
//! result that still owns a fresh, empty scratch folder; the swallowed message
//! stays available through [`ExtractionResult::suppressed_error`]. The scratch
//! folder of the failed attempt is always deleted.

use crate::config::ExtractorConfig;
use crate::error::{Error, Result};
use crate::executor::BoundedExecutor;
use crate::extraction::{
    ExtractionBackend, ExtractionRequest, InnoBackend, OmodBackend, ResourceBackend,
    SevenZipBackend,
};
use crate::hashing::ContentHasher;
use crate::paths::{AbsolutePath, Extension, RelativePath};
use crate::progress::Notifier;
use crate::signature::{SignatureChecker, StructuralProbe};
use crate::temp::TempManager;
use crate::types::{ContainerType, ExtractionEvent};
use crate::vfs::ExtractionResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Backends keyed by the container type they handle
#[derive(Clone, Default)]
pub struct BackendTable {
    backends: HashMap<ContainerType, Arc<dyn ExtractionBackend>>,
}

impl BackendTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard backend for every container type
    pub fn with_defaults(config: &ExtractorConfig) -> Self {
        let resource: Arc<dyn ExtractionBackend> = Arc::new(ResourceBackend::new());
        let mut table = Self::new();
        table.insert(
            ContainerType::GenericArchive,
            Arc::new(SevenZipBackend::from_tools(&config.tools)),
        );
        table.insert(
            ContainerType::SelfExtractingInstaller,
            Arc::new(InnoBackend::from_tools(&config.tools)),
        );
        table.insert(ContainerType::ResourceContainerV1, Arc::clone(&resource));
        table.insert(ContainerType::ResourceContainerV2, resource);
        table.insert(ContainerType::InstallerPackage, Arc::new(OmodBackend::new()));
        table
    }

    /// Register `backend` for `container`, replacing any previous one
    pub fn insert(&mut self, container: ContainerType, backend: Arc<dyn ExtractionBackend>) {
        self.backends.insert(container, backend);
    }

    /// The backend for `container`
    pub fn get(&self, container: ContainerType) -> Option<&Arc<dyn ExtractionBackend>> {
        self.backends.get(&container)
    }
}

impl std::fmt::Debug for BackendTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<(ContainerType, &'static str)> = self
            .backends
            .iter()
            .map(|(container, backend)| (*container, backend.name()))
            .collect();
        names.sort();
        f.debug_map().entries(names).finish()
    }
}

#[async_trait]
impl StructuralProbe for BackendTable {
    async fn confirms(&self, container: ContainerType, path: &Path) -> bool {
        let Some(backend) = self.get(container) else {
            return false;
        };
        match AbsolutePath::new(path) {
            Ok(source) => backend.can_extract(&source).await,
            Err(_) => false,
        }
    }
}

/// Turns container files into listings of virtual files
///
/// Cloning is cheap; clones share the executor, backends, scratch root and
/// notification channel.
///
/// # Examples
///
/// ```no_run
/// use virtual_extract::{AbsolutePath, ExtractorConfig, FileExtractor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = FileExtractor::new(ExtractorConfig::default())?;
/// let source = AbsolutePath::new("/downloads/SkyUI_5_1.7z")?;
///
/// let result = extractor.extract_all(&source, None, true).await?;
/// for (path, file) in result.iter() {
///     println!("{path}: {} bytes", file.size());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct FileExtractor {
    executor: Arc<BoundedExecutor>,
    signatures: Arc<SignatureChecker>,
    backends: Arc<BackendTable>,
    overrides: Arc<BTreeMap<Extension, ContainerType>>,
    temp: TempManager,
    notifier: Notifier,
}

impl FileExtractor {
    /// Build an extractor with the standard signatures and backends
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        let temp = TempManager::new(&config.scratch_dir)?;
        info!(
            scratch_dir = ?config.scratch_dir,
            workers = config.max_parallelism,
            tools = ?config.tools.extractors_dir(),
            "extractor ready"
        );
        Ok(Self {
            executor: Arc::new(BoundedExecutor::new(config.max_parallelism)),
            signatures: Arc::new(SignatureChecker::default()),
            backends: Arc::new(BackendTable::with_defaults(&config)),
            overrides: Arc::new(config.extension_overrides),
            temp,
            notifier: Notifier::new(config.event_buffer),
        })
    }

    /// Replace the backend for one container type
    pub fn with_backend(
        mut self,
        container: ContainerType,
        backend: Arc<dyn ExtractionBackend>,
    ) -> Self {
        Arc::make_mut(&mut self.backends).insert(container, backend);
        self
    }

    /// Replace the signature rules
    pub fn with_signatures(mut self, signatures: SignatureChecker) -> Self {
        self.signatures = Arc::new(signatures);
        self
    }

    /// Share an existing executor
    pub fn with_executor(mut self, executor: Arc<BoundedExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Report through an existing notifier
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// The notification sink
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Receive status and progress events from every extraction
    pub fn subscribe(&self) -> broadcast::Receiver<ExtractionEvent> {
        self.notifier.subscribe()
    }

    /// The shared executor
    pub fn executor(&self) -> &Arc<BoundedExecutor> {
        &self.executor
    }

    /// The scratch space manager
    pub fn temp(&self) -> &TempManager {
        &self.temp
    }

    /// A content hasher running on the shared executor
    pub fn hasher(&self) -> ContentHasher {
        ContentHasher::new(Arc::clone(&self.executor))
    }

    /// Container type of `source`, or `None` when nothing recognizes it
    pub async fn classify(&self, source: &AbsolutePath) -> Result<Option<ContainerType>> {
        if let Some(container) = source
            .extension()
            .and_then(|ext| self.overrides.get(&ext).copied())
        {
            debug!(source = %source, %container, "extension override applied");
            return Ok(Some(container));
        }
        self.signatures
            .classify(source.as_path(), self.backends.as_ref())
            .await
    }

    /// Whether some backend would accept `source`
    ///
    /// Runs the backend's trial check; never fails.
    pub async fn can_extract(&self, source: &AbsolutePath) -> bool {
        let container = match self.classify(source).await {
            Ok(Some(container)) => container,
            Ok(None) => return false,
            Err(e) => {
                debug!(source = %source, error = %e, "cannot classify");
                return false;
            }
        };
        match self.backends.get(container) {
            Some(backend) => backend.can_extract(source).await,
            None => false,
        }
    }

    /// Extract every file of `source`, or just `only_files` when given
    ///
    /// The work runs on the shared executor. See the module docs for how
    /// `strict` changes failure handling.
    pub async fn extract_all(
        &self,
        source: &AbsolutePath,
        only_files: Option<&HashSet<RelativePath>>,
        strict: bool,
    ) -> Result<ExtractionResult> {
        let this = self.clone();
        let source = source.clone();
        let only_files = only_files.cloned();
        let mut results = self
            .executor
            .map([()], move |()| {
                let this = this.clone();
                let source = source.clone();
                let only_files = only_files.clone();
                async move { this.extract_one(&source, only_files.as_ref(), strict).await }
            })
            .await?;
        results
            .pop()
            .ok_or_else(|| Error::TaskFailed("extraction produced no result".to_string()))
    }

    /// Extract several containers in parallel; results come back in input order
    ///
    /// In strict mode the first failure is returned; the other extractions
    /// still run to completion and their folders are cleaned up when their
    /// results are dropped.
    pub async fn extract_many(
        &self,
        sources: impl IntoIterator<Item = AbsolutePath>,
        strict: bool,
    ) -> Result<Vec<ExtractionResult>> {
        let this = self.clone();
        self.executor
            .map(sources, move |source| {
                let this = this.clone();
                async move { this.extract_one(&source, None, strict).await }
            })
            .await
    }

    async fn extract_one(
        &self,
        source: &AbsolutePath,
        only_files: Option<&HashSet<RelativePath>>,
        strict: bool,
    ) -> Result<ExtractionResult> {
        match self.dispatch(source, only_files).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let e = e.classify_for(source.as_path());
                if strict {
                    error!(
                        source = %source,
                        code = e.error_code(),
                        error = %e,
                        "extraction failed"
                    );
                    return Err(e);
                }
                warn!(
                    source = %source,
                    code = e.error_code(),
                    error = %e,
                    "extraction failed, continuing with an empty result"
                );
                let temp = self
                    .temp
                    .create_folder()
                    .map_err(|e| e.classify_for(source.as_path()))?;
                Ok(ExtractionResult::empty(temp, e.to_string()))
            }
        }
    }

    async fn dispatch(
        &self,
        source: &AbsolutePath,
        only_files: Option<&HashSet<RelativePath>>,
    ) -> Result<ExtractionResult> {
        let container = self
            .classify(source)
            .await?
            .ok_or_else(|| Error::UnsupportedFormat {
                source_path: source.as_path().to_path_buf(),
            })?;
        let backend = self
            .backends
            .get(container)
            .ok_or_else(|| Error::UnsupportedFormat {
                source_path: source.as_path().to_path_buf(),
            })?;
        let capabilities = backend.capabilities();
        info!(
            source = %source,
            %container,
            backend = backend.name(),
            selected = only_files.map(HashSet::len),
            "extracting"
        );

        // Dropped, and so deleted, if the backend fails
        let temp = if capabilities.lazy {
            None
        } else {
            Some(self.temp.create_folder()?)
        };

        let mut request = ExtractionRequest::new(source, &self.notifier, &self.temp);
        if let Some(folder) = &temp {
            request = request.with_destination(folder.path());
        }
        if capabilities.selective
            && let Some(only) = only_files
        {
            request = request.with_only_files(only);
        }

        let files = backend.produce(request).await?;
        self.notifier.progress(request.label(), 1.0, false);
        debug!(source = %source, files = files.len(), "extraction finished");
        Ok(ExtractionResult::new(files, temp))
    }
}
