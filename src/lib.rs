//! # virtual-extract
//!
//! Turns archives, installers and game resource containers into uniform
//! listings of virtual files.
//!
//! ## Design Philosophy
//!
//! virtual-extract is designed to be:
//! - **Format-agnostic for callers** - One entry point, whatever the container
//! - **Lazy where it can be** - Resource containers are never unpacked to disk
//! - **Bounded** - All work runs on one fixed-size executor
//! - **Event-driven** - Progress and status are broadcast, never polled
//!
//! ## How a file is extracted
//!
//! 1. An extension override or the file's leading bytes decide its
//!    [`ContainerType`] ([`signature`]).
//! 2. The backend registered for that type produces [`VirtualFile`]s, either
//!    by driving an external tool into a scratch folder or by reading the
//!    container in-process ([`extraction`]).
//! 3. The files come back as an [`ExtractionResult`], which owns the scratch
//!    folder and deletes it when dropped ([`temp`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use virtual_extract::{AbsolutePath, ExtractorConfig, FileExtractor, RelativePath};
//! use std::collections::HashSet;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = FileExtractor::new(ExtractorConfig::default())?;
//!
//!     let mut events = extractor.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{:?}", event);
//!         }
//!     });
//!
//!     // Path filters apply to generic archives; resource containers and
//!     // installers always come back whole
//!     let source = AbsolutePath::new("/downloads/SkyUI.7z")?;
//!     let wanted: HashSet<RelativePath> = [RelativePath::new("interface/skyui.swf")?].into();
//!     let result = extractor.extract_all(&source, Some(&wanted), true).await?;
//!
//!     let hasher = extractor.hasher();
//!     for (path, file) in result.iter() {
//!         let digest = hasher.hash(&file.read_all()?);
//!         println!("{path} {digest}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Bounded parallel executor
pub mod executor;
/// Extraction backends
pub mod extraction;
/// Extraction dispatcher
pub mod extractor;
/// Content hashing
pub mod hashing;
/// Validated path types
pub mod paths;
/// Progress parsing and notifications
pub mod progress;
/// Magic-byte format detection
pub mod signature;
/// Scoped scratch storage
pub mod temp;
/// Core types and events
pub mod types;
/// Virtual files and extraction results
pub mod vfs;

pub use config::{ExtractorConfig, ToolsConfig};
pub use error::{Error, Result};
pub use executor::BoundedExecutor;
pub use extractor::{BackendTable, FileExtractor};
pub use hashing::{ContentHasher, Digest};
pub use paths::{AbsolutePath, Extension, RelativePath};
pub use progress::Notifier;
pub use signature::{FileSignature, SignatureChecker, SignatureRule, StructuralProbe};
pub use temp::{TempFile, TempFolder, TempManager};
pub use types::{ContainerType, ExtractionEvent};
pub use vfs::{ExtractionResult, FileSource, VirtualFile};
