//! Self-extracting installers through `innounp`

use super::process::{ToolCommand, ToolLocation};
use super::shared::{collect_output, require_destination};
use super::traits::{BackendCapabilities, ExtractionBackend, ExtractionRequest};
use crate::config::ToolsConfig;
use crate::error::Result;
use crate::paths::AbsolutePath;
use crate::vfs::VirtualFile;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Unpacks Inno Setup installers
///
/// The unpacker has no path selection, so the whole installer is always
/// extracted.
#[derive(Clone, Debug)]
pub struct InnoBackend {
    tool: ToolLocation,
}

impl InnoBackend {
    /// Use an explicit binary
    pub fn new(binary: PathBuf) -> Self {
        Self {
            tool: ToolLocation::Fixed(binary),
        }
    }

    /// Resolve the binary from tool settings on each use
    pub fn from_tools(tools: &ToolsConfig) -> Self {
        Self {
            tool: ToolLocation::Lookup {
                tools: tools.clone(),
                name: tools.innounp_name.clone(),
            },
        }
    }

    /// `-x -y -b -d"<dest>" "<source>"`
    pub fn extract_command(binary: &Path, source: &Path, destination: &Path) -> ToolCommand {
        ToolCommand::new(binary)
            .arg("-x")
            .arg("-y")
            .arg("-b")
            .path_arg("-d", destination)
            .path_arg("", source)
    }

    /// `-t "<source>"`
    pub fn test_command(binary: &Path, source: &Path) -> ToolCommand {
        ToolCommand::new(binary).arg("-t").path_arg("", source)
    }
}

#[async_trait]
impl ExtractionBackend for InnoBackend {
    async fn produce(&self, request: ExtractionRequest<'_>) -> Result<Vec<VirtualFile>> {
        let destination = require_destination(&request)?;
        let binary = self.tool.resolve()?;
        let label = request.label();
        request.notifier.status(format!("Unpacking installer {label}"));

        Self::extract_command(&binary, request.source.as_path(), destination.as_path())
            .run(
                request.source.as_path(),
                destination.as_path(),
                &label,
                request.notifier,
            )
            .await?;

        collect_output(destination, &request).await
    }

    async fn can_extract(&self, source: &AbsolutePath) -> bool {
        match self.tool.resolve() {
            Ok(binary) => Self::test_command(&binary, source.as_path()).succeeds().await,
            Err(e) => {
                debug!(error = %e, "innounp unavailable for probe");
                false
            }
        }
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            selective: false,
            lazy: false,
        }
    }

    fn name(&self) -> &'static str {
        "innounp"
    }
}
