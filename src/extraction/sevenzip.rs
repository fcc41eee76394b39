//! Generic archives through the external 7-Zip binary

use super::process::{ToolCommand, ToolLocation};
use super::shared::{collect_output, require_destination};
use super::traits::{BackendCapabilities, ExtractionBackend, ExtractionRequest};
use crate::config::ToolsConfig;
use crate::error::Result;
use crate::paths::{AbsolutePath, RelativePath};
use crate::vfs::VirtualFile;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extracts 7z, RAR, ZIP and archive-with-stub executables via `7z`
///
/// Every format the binary understands ends up here, so the signature table
/// routes all non-resource archive magics to this backend.
#[derive(Clone, Debug)]
pub struct SevenZipBackend {
    tool: ToolLocation,
}

impl SevenZipBackend {
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
                name: tools.sevenzip_name.clone(),
            },
        }
    }

    /// `x -bsp1 -y -o"<dest>" "<source>" -mmt=off [@"<list>"]`
    pub fn extract_command(
        binary: &Path,
        source: &Path,
        destination: &Path,
        list_file: Option<&Path>,
    ) -> ToolCommand {
        let command = ToolCommand::new(binary)
            .arg("x")
            .arg("-bsp1")
            .arg("-y")
            .path_arg("-o", destination)
            .path_arg("", source)
            .arg("-mmt=off");
        match list_file {
            Some(list) => command.path_arg("@", list),
            None => command,
        }
    }

    /// `t "<source>"`
    pub fn test_command(binary: &Path, source: &Path) -> ToolCommand {
        ToolCommand::new(binary).arg("t").path_arg("", source)
    }
}

/// Contents of a 7-Zip list file selecting `paths`
///
/// Each path is listed twice, once bare and once with a leading backslash,
/// both quoted and `\`-separated, so the selection matches however the
/// archive stored its names.
pub fn list_file_contents(paths: &HashSet<RelativePath>) -> String {
    let mut sorted: Vec<&RelativePath> = paths.iter().collect();
    sorted.sort();
    let mut contents = String::new();
    for path in sorted {
        let windows = path.with_separator('\\');
        contents.push_str(&format!("\"{windows}\"\n\"\\{windows}\"\n"));
    }
    contents
}

#[async_trait]
impl ExtractionBackend for SevenZipBackend {
    async fn produce(&self, request: ExtractionRequest<'_>) -> Result<Vec<VirtualFile>> {
        let destination = require_destination(&request)?;
        if request.only_files.is_some_and(HashSet::is_empty) {
            debug!(source = %request.source, "empty selection, nothing to extract");
            return Ok(Vec::new());
        }
        let binary = self.tool.resolve()?;

        let mut list_file = match request.only_files {
            Some(only) => {
                let file = request.temp.create_file(".lst")?;
                tokio::fs::write(file.path(), list_file_contents(only)).await?;
                Some(file)
            }
            None => None,
        };

        let command = Self::extract_command(
            &binary,
            request.source.as_path(),
            destination.as_path(),
            list_file.as_ref().map(|f| f.path().as_path()),
        );
        let label = request.label();
        request.notifier.status(format!("Extracting {label}"));
        let outcome = command
            .run(
                request.source.as_path(),
                destination.as_path(),
                &label,
                request.notifier,
            )
            .await;

        if let Some(file) = list_file.as_mut() {
            file.release()?;
        }
        outcome?;

        collect_output(destination, &request).await
    }

    async fn can_extract(&self, source: &AbsolutePath) -> bool {
        match self.tool.resolve() {
            Ok(binary) => Self::test_command(&binary, source.as_path()).succeeds().await,
            Err(e) => {
                debug!(error = %e, "7z unavailable for probe");
                false
            }
        }
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            selective: true,
            lazy: false,
        }
    }

    fn name(&self) -> &'static str {
        "7z"
    }
}
