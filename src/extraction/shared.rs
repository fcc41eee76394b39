//! Helpers shared by the folder-producing backends

use super::traits::ExtractionRequest;
use crate::error::{Error, Result};
use crate::paths::AbsolutePath;
use crate::vfs::{VirtualFile, collect_disk_files};

/// The destination a folder-producing backend must have been given
pub(crate) fn require_destination<'a>(request: &ExtractionRequest<'a>) -> Result<&'a AbsolutePath> {
    request.destination.ok_or_else(|| {
        Error::fault(
            request.source.as_path(),
            "backend writes to disk but no destination folder was provided",
        )
    })
}

/// List what a tool left under `destination`, keeping only requested paths
pub(crate) async fn collect_output(
    destination: &AbsolutePath,
    request: &ExtractionRequest<'_>,
) -> Result<Vec<VirtualFile>> {
    let root = destination.clone();
    let files = tokio::task::spawn_blocking(move || collect_disk_files(&root))
        .await
        .map_err(|e| Error::TaskFailed(format!("listing extraction output: {e}")))??;

    Ok(files
        .into_iter()
        .filter(|file| request.wants(file.path()))
        .collect())
}
