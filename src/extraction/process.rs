//! Running external extraction tools
//!
//! Tools are spawned with their arguments passed separately, but every command
//! also has a rendered form with paths wrapped in double quotes
//! (`x -bsp1 -y -o"<dest>" "<source>"`), which is what gets logged.
//!
//! Standard output is consumed while the tool runs. Each chunk is split on
//! newline, carriage return and backspace, and lines that look like percent
//! progress are forwarded to the [`Notifier`]. The tool's exit code alone
//! decides success.

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::progress::{Notifier, parse_progress_line, split_output_lines};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Non-progress output lines kept for the failure diagnostic
const DIAGNOSTIC_LINES: usize = 8;

const READ_CHUNK: usize = 4096;

/// Where a tool binary comes from
#[derive(Clone, Debug)]
pub enum ToolLocation {
    /// A fixed binary path
    Fixed(PathBuf),
    /// Resolved on each use: bundled copy first, then PATH if allowed
    Lookup {
        /// Install root and search settings
        tools: ToolsConfig,
        /// Tool file name without platform suffix
        name: String,
    },
}

impl ToolLocation {
    /// The binary to run
    pub fn resolve(&self) -> Result<PathBuf> {
        match self {
            Self::Fixed(path) => Ok(path.clone()),
            Self::Lookup { tools, name } => resolve_tool(tools, name),
        }
    }
}

/// Find `name` under `<install_root>/Extractors`, falling back to PATH
pub fn resolve_tool(tools: &ToolsConfig, name: &str) -> Result<PathBuf> {
    let bundled = tools.bundled_tool_path(name);
    if bundled.is_file() {
        return Ok(bundled);
    }
    if tools.search_path
        && let Ok(found) = which::which(name)
    {
        debug!(tool = name, path = ?found, "using tool from PATH");
        return Ok(found);
    }
    Err(Error::ExternalTool(format!(
        "{} not found in {}",
        name,
        tools.extractors_dir().display()
    )))
}

#[derive(Clone, Debug)]
enum ToolArg {
    Plain(String),
    Quoted { prefix: &'static str, path: PathBuf },
}

/// An external tool invocation
#[derive(Clone, Debug)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<ToolArg>,
}

impl ToolCommand {
    /// Start a command for `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a literal switch
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(ToolArg::Plain(arg.into()));
        self
    }

    /// Append `prefix` glued to `path`; rendered as `prefix"path"`
    pub fn path_arg(mut self, prefix: &'static str, path: impl AsRef<Path>) -> Self {
        self.args.push(ToolArg::Quoted {
            prefix,
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// The binary
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments as handed to the OS
    pub fn os_args(&self) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| match arg {
                ToolArg::Plain(s) => OsString::from(s),
                ToolArg::Quoted { prefix, path } => {
                    let mut joined = OsString::from(prefix);
                    joined.push(path.as_os_str());
                    joined
                }
            })
            .collect()
    }

    /// Arguments as one command line, paths in double quotes
    pub fn rendered_args(&self) -> String {
        self.args
            .iter()
            .map(|arg| match arg {
                ToolArg::Plain(s) => s.clone(),
                ToolArg::Quoted { prefix, path } => format!("{}\"{}\"", prefix, path.display()),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.os_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Run to completion, streaming progress into `notifier`
    ///
    /// A non-zero exit becomes [`Error::BackendExecutionFailure`] carrying the
    /// code, `source`, `destination` and the tail of the tool's output.
    pub async fn run(
        &self,
        source: &Path,
        destination: &Path,
        label: &str,
        notifier: &Notifier,
    ) -> Result<()> {
        info!(
            tool = %self.program.display(),
            args = %self.rendered_args(),
            "running extraction tool"
        );

        let mut child = self.command().spawn().map_err(|e| {
            Error::ExternalTool(format!(
                "failed to execute {}: {}",
                self.program.display(),
                e
            ))
        })?;

        let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_to_string(pipe)));
        let mut tail = VecDeque::with_capacity(DIAGNOSTIC_LINES);
        if let Some(stdout) = child.stdout.take() {
            stream_output(stdout, |line| match parse_progress_line(line) {
                Some(percent) => notifier.progress(label, percent, false),
                None => {
                    if tail.len() == DIAGNOSTIC_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.trim().to_string());
                }
            })
            .await?;
        }

        let status = child.wait().await?;
        let stderr_text = match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            debug!(source = ?source, "extraction tool finished");
            return Ok(());
        }

        let code = status.code().unwrap_or(-1);
        let diagnostic = if stderr_text.trim().is_empty() {
            tail.into_iter().collect::<Vec<_>>().join("\n")
        } else {
            stderr_text.trim().to_string()
        };
        warn!(
            tool = %self.program.display(),
            code,
            source = ?source,
            "extraction tool failed"
        );
        Err(Error::BackendExecutionFailure {
            code,
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
            diagnostic,
        })
    }

    /// Run without streaming; true only on exit code 0
    pub async fn succeeds(&self) -> bool {
        let mut command = self.command();
        command.stdout(Stdio::null()).stderr(Stdio::null());
        match command.status().await {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(tool = %self.program.display(), error = %e, "probe could not start");
                false
            }
        }
    }
}

/// Feed complete output lines to `on_line` as chunks arrive
///
/// A line cut in half by a chunk boundary is held back until its separator
/// shows up.
async fn stream_output<R>(mut reader: R, mut on_line: impl FnMut(&str)) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut pending = String::new();
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        pending.push_str(&String::from_utf8_lossy(&buf[..n]));
        if let Some(cut) = pending.rfind(['\n', '\r', '\u{8}']) {
            let complete: String = pending.drain(..=cut).collect();
            split_output_lines(&complete).for_each(&mut on_line);
        }
    }
    split_output_lines(&pending).for_each(&mut on_line);
    Ok(())
}

async fn read_to_string<R>(mut reader: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    if let Err(e) = reader.read_to_end(&mut bytes).await {
        debug!(error = %e, "failed to read tool stderr");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
