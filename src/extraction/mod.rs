//! Extraction backends
//!
//! Every container family is handled by one [`ExtractionBackend`]:
//!
//! - [`SevenZipBackend`]: generic archives through the external `7z` binary
//! - [`InnoBackend`]: self-extracting installers through `innounp`
//! - [`ResourceBackend`]: BSA and BA2 game resource containers, read in-process
//!   through the `ba2` crate and served lazily
//! - [`OmodBackend`]: OMOD installer packages, unpacked in-process
//!
//! The tool-driven backends share [`ToolCommand`], which renders the exact
//! command line, streams progress from the tool's output, and turns a
//! non-zero exit into [`Error::BackendExecutionFailure`](crate::Error::BackendExecutionFailure).

mod innounp;
mod omod;
mod process;
mod resource;
mod sevenzip;
mod shared;
mod traits;

pub use innounp::InnoBackend;
pub use omod::{OmodBackend, OmodCompression, OmodConfig};
pub use process::{ToolCommand, ToolLocation, resolve_tool};
pub use resource::{ArchiveEntry, ArchiveHandle, ResourceBackend, ResourceFormat};
pub use sevenzip::{SevenZipBackend, list_file_contents};
pub use traits::{BackendCapabilities, ExtractionBackend, ExtractionRequest};

#[cfg(test)]
pub(crate) use omod::tests::write_package as write_omod_package;
#[cfg(test)]
pub(crate) use resource::fixtures;
