//! OMOD installer packages
//!
//! An OMOD is a ZIP container with a `config` record and up to two file sets,
//! `data` and `plugins`. Each set is one compressed stream holding every file
//! back to back; the matching `.crc` entry lists names and lengths in stream
//! order, so the stream is cut into files while it is being decoded.
//!
//! ```text
//! config:     u8 version, string name, i32 major, i32 minor,
//!             string author, email, website, description,
//!             creation time (i64 from version 2, string before),
//!             u8 compression, i32 build (from version 1)
//! *.crc:      repeated { string name, u32 crc, i64 length }
//! ```
//!
//! Strings carry a 7-bit variable-length byte count. Compression `0` is a raw
//! LZMA stream (five property bytes, then data); `1` wraps the stream as the
//! first entry of a nested ZIP.

mod record;

use super::shared::{collect_output, require_destination};
use super::traits::{BackendCapabilities, ExtractionBackend, ExtractionRequest};
use crate::error::{Error, Result};
use crate::paths::{AbsolutePath, RelativePath};
use crate::progress::{Notifier, ratio};
use crate::temp::TempManager;
use crate::vfs::VirtualFile;
use async_trait::async_trait;
use record::{FormatError, FormatResult, RecordReader};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LZMA_PROPS_LEN: usize = 5;

/// How an OMOD's file sets are packed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmodCompression {
    /// Raw LZMA stream
    Lzma,
    /// Nested ZIP, first entry
    Zip,
}

/// The parts of an OMOD `config` record extraction cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmodConfig {
    /// Record layout version
    pub version: u8,
    /// Mod name
    pub name: String,
    /// Major version
    pub major: i32,
    /// Minor version
    pub minor: i32,
    /// Author
    pub author: String,
    /// File set packing
    pub compression: OmodCompression,
}

impl OmodConfig {
    /// Parse a `config` record
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_inner(bytes).map_err(|e| Error::fault(PathBuf::from("config"), e.0))
    }

    fn parse_inner(bytes: &[u8]) -> FormatResult<Self> {
        let mut reader = RecordReader::new(bytes);
        let version = reader.u8()?;
        let name = reader.string()?;
        let major = reader.i32()?;
        let minor = reader.i32()?;
        let author = reader.string()?;
        let _email = reader.string()?;
        let _website = reader.string()?;
        let _description = reader.string()?;
        if version >= 2 {
            let _created = reader.i64()?;
        } else {
            let _created = reader.string()?;
        }
        let compression = match reader.u8()? {
            0 => OmodCompression::Lzma,
            1 => OmodCompression::Zip,
            other => return Err(FormatError::new(format!("unknown compression type {other}"))),
        };
        Ok(Self {
            version,
            name,
            major,
            minor,
            author,
            compression,
        })
    }
}

/// One file of a packed set
#[derive(Debug, Clone, PartialEq, Eq)]
struct PackedFile {
    path: RelativePath,
    length: u64,
}

fn parse_file_list(bytes: &[u8]) -> FormatResult<Vec<PackedFile>> {
    let mut reader = RecordReader::new(bytes);
    let mut files = Vec::new();
    while !reader.is_at_end() {
        let name = reader.string()?;
        let _crc = reader.u32()?;
        let length = reader.i64()?;
        let length = u64::try_from(length)
            .map_err(|_| FormatError::new(format!("{name}: negative length {length}")))?;
        files.push(PackedFile {
            path: RelativePath::new(&name)?,
            length,
        });
    }
    Ok(files)
}

/// Combined length of `files`, rejecting lists whose lengths overflow
fn total_length<'a>(files: impl IntoIterator<Item = &'a PackedFile>) -> FormatResult<u64> {
    files.into_iter().try_fold(0u64, |total, file| {
        total
            .checked_add(file.length)
            .ok_or_else(|| FormatError::new(format!("{}: file lengths overflow", file.path)))
    })
}

/// `.lzma` header for a raw stream: the five property bytes, then the decoded size
fn lzma_alone_header(props: &[u8; LZMA_PROPS_LEN], decoded_len: u64) -> Vec<u8> {
    let mut header = Vec::with_capacity(LZMA_PROPS_LEN + 8);
    header.extend_from_slice(props);
    header.extend_from_slice(&decoded_len.to_le_bytes());
    header
}

/// Unpacks OMOD installer packages in-process
#[derive(Clone, Copy, Debug, Default)]
pub struct OmodBackend;

impl OmodBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }

    /// Read and parse the `config` record of `source` (blocking)
    pub fn read_config(source: &Path) -> Result<OmodConfig> {
        let mut archive = open_zip(source)?;
        let bytes = read_entry(&mut archive, source, "config")?
            .ok_or_else(|| Error::fault(source, "package has no config record"))?;
        OmodConfig::parse_inner(&bytes).map_err(|e| e.into_error(source))
    }
}

#[async_trait]
impl ExtractionBackend for OmodBackend {
    async fn produce(&self, request: ExtractionRequest<'_>) -> Result<Vec<VirtualFile>> {
        let destination = require_destination(&request)?;
        let label = request.label();
        request.notifier.status(format!("Unpacking {label}"));

        let job = UnpackJob {
            source: request.source.as_path().to_path_buf(),
            destination: destination.clone(),
            temp: request.temp.clone(),
            notifier: request.notifier.clone(),
            label,
        };
        tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| Error::TaskFailed(format!("unpacking package: {e}")))??;

        collect_output(destination, &request).await
    }

    async fn can_extract(&self, source: &AbsolutePath) -> bool {
        let path = source.as_path().to_path_buf();
        matches!(
            tokio::task::spawn_blocking(move || Self::read_config(&path)).await,
            Ok(Ok(_))
        )
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            selective: false,
            lazy: false,
        }
    }

    fn name(&self) -> &'static str {
        "omod"
    }
}

struct UnpackJob {
    source: PathBuf,
    destination: AbsolutePath,
    temp: TempManager,
    notifier: Notifier,
    label: String,
}

impl UnpackJob {
    fn run(self) -> Result<()> {
        let mut archive = open_zip(&self.source)?;
        let config = match read_entry(&mut archive, &self.source, "config")? {
            Some(bytes) => OmodConfig::parse_inner(&bytes).map_err(|e| e.into_error(&self.source))?,
            None => return Err(Error::fault(&self.source, "package has no config record")),
        };
        info!(
            source = ?self.source,
            name = %config.name,
            version = %format!("{}.{}", config.major, config.minor),
            compression = ?config.compression,
            "unpacking package"
        );

        let mut sets = Vec::new();
        for (list, stream) in [("data.crc", "data"), ("plugins.crc", "plugins")] {
            if let Some(bytes) = read_entry(&mut archive, &self.source, list)? {
                let files = parse_file_list(&bytes).map_err(|e| e.into_error(&self.source))?;
                sets.push((stream, files));
            }
        }

        let total = total_length(sets.iter().flat_map(|(_, files)| files))
            .map_err(|e| e.into_error(&self.source))?;
        let mut processed = 0u64;
        for (stream, files) in sets {
            if files.is_empty() {
                continue;
            }
            let mut packed = self.temp.create_file(".bin")?;
            {
                let mut entry = archive
                    .by_name(stream)
                    .map_err(|e| Error::fault(&self.source, format!("{stream}: {e}")))?;
                let mut out = File::create(packed.path())?;
                io::copy(&mut entry, &mut out)?;
            }

            let expected = total_length(&files).map_err(|e| e.into_error(&self.source))?;
            let input = BufReader::new(File::open(packed.path())?);
            let mut on_file = |length: u64| {
                processed = processed.saturating_add(length);
                self.notifier.progress(&self.label, ratio(processed, total), false);
            };
            match config.compression {
                OmodCompression::Lzma => {
                    let mut decoder = self.lzma_reader(input, expected)?;
                    self.write_files(&mut decoder, &files, &mut on_file)?;
                }
                OmodCompression::Zip => {
                    let mut inner = zip::ZipArchive::new(input)
                        .map_err(|e| Error::fault(&self.source, format!("{stream}: {e}")))?;
                    let mut entry = inner
                        .by_index(0)
                        .map_err(|e| Error::fault(&self.source, format!("{stream}: {e}")))?;
                    self.write_files(&mut entry, &files, &mut on_file)?;
                }
            }
            packed.release()?;
            debug!(source = ?self.source, stream, files = files.len(), "file set unpacked");
        }
        Ok(())
    }

    fn lzma_reader<R: Read>(&self, mut input: R, expected: u64) -> Result<impl Read> {
        let mut props = [0u8; LZMA_PROPS_LEN];
        input.read_exact(&mut props)?;
        let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
            .map_err(|e| Error::fault(&self.source, format!("lzma decoder: {e}")))?;
        let framed = io::Cursor::new(lzma_alone_header(&props, expected)).chain(input);
        Ok(xz2::read::XzDecoder::new_stream(framed, stream))
    }

    fn write_files(
        &self,
        reader: &mut dyn Read,
        files: &[PackedFile],
        on_file: &mut dyn FnMut(u64),
    ) -> Result<()> {
        for file in files {
            let target = self.destination.join(&file.path);
            if let Some(parent) = target.as_path().parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            let copied = io::copy(&mut Read::take(&mut *reader, file.length), &mut out)?;
            if copied != file.length {
                return Err(Error::fault(
                    &self.source,
                    format!(
                        "{}: stream ended after {copied} of {} bytes",
                        file.path, file.length
                    ),
                ));
            }
            on_file(file.length);
        }
        Ok(())
    }
}

fn open_zip(source: &Path) -> Result<zip::ZipArchive<File>> {
    let file = File::open(source)?;
    zip::ZipArchive::new(file).map_err(|e| Error::fault(source, e.to_string()))
}

/// Read a whole entry; `None` if the package does not have it
fn read_entry(
    archive: &mut zip::ZipArchive<File>,
    source: &Path,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            Ok(Some(bytes))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(Error::fault(source, format!("{name}: {e}"))),
    }
}
