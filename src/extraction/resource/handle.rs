//! Shared handle over an open resource container
//!
//! Containers are read with the `ba2` crate. A container opened from a path is
//! memory-mapped, and every entry stays a view into that mapping until it is
//! read. Only the index is parsed when the handle opens; an entry is
//! decompressed (and, for BA2 textures, given its DDS header) each time a
//! [`VirtualFile`](crate::VirtualFile) backed by it is opened.

use crate::error::{Error, Result};
use crate::paths::RelativePath;
use ba2::prelude::*;
use ba2::{fo4, tes3, tes4};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// The container families the handle can read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFormat {
    /// Morrowind BSA
    Tes3,
    /// Oblivion, Fallout 3/NV and Skyrim BSA (versions 103 to 105)
    Tes4,
    /// Fallout 4 and Starfield BA2, general and texture archives
    Fo4,
}

impl ResourceFormat {
    /// Identify a container from its first four bytes
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic {
            [0x00, 0x01, 0x00, 0x00] => Some(Self::Tes3),
            b"BSA\0" => Some(Self::Tes4),
            b"BTDX" => Some(Self::Fo4),
            _ => None,
        }
    }

    /// Read the magic of the file at `path`
    pub fn detect(path: &Path) -> Result<Self> {
        let mut magic = [0u8; 4];
        let mut file = File::open(path)?;
        if file.read_exact(&mut magic).is_err() {
            return Err(Error::fault(path, "file too short for a container header"));
        }
        Self::from_magic(&magic).ok_or_else(|| {
            Error::fault(
                path,
                format!("unrecognized container magic {}", hex::encode(magic)),
            )
        })
    }
}

enum Contents {
    Tes3(tes3::Archive<'static>),
    Tes4 {
        archive: tes4::Archive<'static>,
        options: tes4::FileCompressionOptions,
    },
    Fo4 {
        archive: fo4::Archive<'static>,
        options: fo4::FileWriteOptions,
    },
}

#[derive(Clone)]
enum EntryKey {
    Tes3(tes3::ArchiveKey<'static>),
    Tes4(tes4::ArchiveKey<'static>, tes4::DirectoryKey<'static>),
    Fo4(fo4::ArchiveKey<'static>),
}

/// One record of an [`ArchiveHandle`]
///
/// Cheap to clone. The content size is known from the index for everything
/// except BA2 textures, whose DDS header is only known once the entry has been
/// rebuilt; that size is worked out on first request and remembered.
#[derive(Clone)]
pub struct ArchiveEntry {
    key: EntryKey,
    size: Option<u64>,
    rebuilt_size: Arc<OnceLock<u64>>,
}

impl ArchiveEntry {
    fn new(key: EntryKey, size: Option<u64>) -> Self {
        Self {
            key,
            size,
            rebuilt_size: Arc::new(OnceLock::new()),
        }
    }
}

impl fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("size", &self.size.or_else(|| self.rebuilt_size.get().copied()))
            .finish_non_exhaustive()
    }
}

/// An open container shared by every lazy [`VirtualFile`](crate::VirtualFile)
/// read from it
pub struct ArchiveHandle {
    path: PathBuf,
    format: ResourceFormat,
    contents: Contents,
}

impl fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("path", &self.path)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl ArchiveHandle {
    /// Open `path` and parse its index (blocking)
    pub fn open(path: &Path) -> Result<Self> {
        let format = ResourceFormat::detect(path)?;
        let contents = match format {
            ResourceFormat::Tes3 => {
                let archive =
                    tes3::Archive::read(path).map_err(|e| Error::fault(path, e.to_string()))?;
                Contents::Tes3(archive)
            }
            ResourceFormat::Tes4 => {
                let (archive, meta) =
                    tes4::Archive::read(path).map_err(|e| Error::fault(path, e.to_string()))?;
                Contents::Tes4 {
                    archive,
                    options: meta.into(),
                }
            }
            ResourceFormat::Fo4 => {
                let (archive, meta) =
                    fo4::Archive::read(path).map_err(|e| Error::fault(path, e.to_string()))?;
                Contents::Fo4 {
                    archive,
                    options: meta.into(),
                }
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            format,
            contents,
        })
    }

    /// The container's path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Which reader parsed the container
    pub fn format(&self) -> ResourceFormat {
        self.format
    }

    /// Every entry with its validated path, in index order
    pub fn entries(&self) -> Result<Vec<(RelativePath, ArchiveEntry)>> {
        let mut entries = Vec::new();
        match &self.contents {
            Contents::Tes3(archive) => {
                for (key, file) in archive.iter() {
                    let path = self.entry_path(&decode_name(key.name()))?;
                    let size = Some(file.len() as u64);
                    entries.push((path, ArchiveEntry::new(EntryKey::Tes3(key.clone()), size)));
                }
            }
            Contents::Tes4 { archive, .. } => {
                for (directory_key, directory) in archive.iter() {
                    let folder = decode_name(directory_key.name());
                    for (file_key, file) in directory.iter() {
                        let name = decode_name(file_key.name());
                        let full = match folder.as_str() {
                            "" | "." => name,
                            folder => format!("{folder}\\{name}"),
                        };
                        let path = self.entry_path(&full)?;
                        let size = file.decompressed_len().unwrap_or(file.len()) as u64;
                        let key = EntryKey::Tes4(directory_key.clone(), file_key.clone());
                        entries.push((path, ArchiveEntry::new(key, Some(size))));
                    }
                }
            }
            Contents::Fo4 { archive, .. } => {
                for (key, file) in archive.iter() {
                    let path = self.entry_path(&decode_name(key.name()))?;
                    let size = match file.header {
                        fo4::FileHeader::GNRL => Some(file.iter().map(chunk_size).sum()),
                        _ => None,
                    };
                    entries.push((path, ArchiveEntry::new(EntryKey::Fo4(key.clone()), size)));
                }
            }
        }
        Ok(entries)
    }

    /// Content size of `entry`, rebuilding it once if the index cannot tell
    pub fn size_of(&self, entry: &ArchiveEntry) -> u64 {
        if let Some(size) = entry.size {
            return size;
        }
        *entry.rebuilt_size.get_or_init(|| match self.read(entry) {
            Ok(bytes) => bytes.len() as u64,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "could not size entry");
                0
            }
        })
    }

    /// Decode one entry into memory
    pub fn read(&self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let missing = || Error::fault(&self.path, "entry is no longer in the container index");
        let mut out = Vec::new();
        let written = match (&self.contents, &entry.key) {
            (Contents::Tes3(archive), EntryKey::Tes3(key)) => {
                let file = archive.get(key).ok_or_else(missing)?;
                out.extend_from_slice(file.as_bytes());
                Ok(())
            }
            (Contents::Tes4 { archive, options }, EntryKey::Tes4(folder, name)) => {
                let file = archive
                    .get(folder)
                    .and_then(|files| files.get(name))
                    .ok_or_else(missing)?;
                file.write(&mut out, options).map_err(|e| e.to_string())
            }
            (Contents::Fo4 { archive, options }, EntryKey::Fo4(key)) => {
                let file = archive.get(key).ok_or_else(missing)?;
                file.write(&mut out, options).map_err(|e| e.to_string())
            }
            _ => return Err(Error::fault(&self.path, "entry belongs to another container")),
        };
        written.map_err(|reason| Error::fault(&self.path, reason))?;
        Ok(out)
    }

    fn entry_path(&self, name: &str) -> Result<RelativePath> {
        RelativePath::new(name).map_err(|e| Error::fault(&self.path, format!("{name:?}: {e}")))
    }
}

fn chunk_size(chunk: &fo4::Chunk<'_>) -> u64 {
    chunk.decompressed_len().unwrap_or(chunk.len()) as u64
}

/// Names are stored in a single-byte code page; non-UTF-8 bytes map byte-for-char
fn decode_name(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|b| char::from(*b)).collect(),
    }
}
