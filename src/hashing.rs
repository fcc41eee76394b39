//! Content hashing
//!
//! SHA-256 digests of in-memory buffers and files. File hashing streams the
//! content through the hasher in fixed-size chunks on a blocking worker, so
//! memory use does not depend on file size.

use crate::error::{Error, Result};
use crate::executor::BoundedExecutor;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

const CHUNK_SIZE: usize = 64 * 1024;

/// Fixed-size content digest, displayed as lowercase hex
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest([u8; 32]);

impl Digest {
    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| Error::Config {
            message: format!("invalid digest {s:?}: {e}"),
            key: None,
        })?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Digest {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_hex()
    }
}

/// Hash a byte buffer
pub fn hash(bytes: &[u8]) -> Digest {
    Digest(Sha256::digest(bytes).into())
}

/// Hash everything `reader` yields, chunk by chunk
pub fn hash_reader(mut reader: impl Read) -> std::io::Result<Digest> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Digest(hasher.finalize().into()))
}

/// Hash a file without loading it into memory (blocking)
pub fn hash_file_blocking(path: &Path) -> Result<Digest> {
    let file = std::fs::File::open(path)?;
    Ok(hash_reader(file)?)
}

/// Hashes files on the shared executor
#[derive(Clone, Debug)]
pub struct ContentHasher {
    executor: Arc<BoundedExecutor>,
}

impl ContentHasher {
    /// Create a hasher that fans out over `executor`
    pub fn new(executor: Arc<BoundedExecutor>) -> Self {
        Self { executor }
    }

    /// Hash a byte buffer
    pub fn hash(&self, bytes: &[u8]) -> Digest {
        hash(bytes)
    }

    /// Hash one file on a blocking worker
    pub async fn hash_file(&self, path: impl AsRef<Path>) -> Result<Digest> {
        let mut digests = self.hash_files([path.as_ref().to_path_buf()]).await?;
        digests.pop().ok_or_else(|| Error::TaskFailed("no digest produced".to_string()))
    }

    /// Hash many files in parallel; digests come back in input order
    pub async fn hash_files(
        &self,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> Result<Vec<Digest>> {
        self.executor
            .map_blocking(paths, |path| hash_file_blocking(&path))
            .await
    }
}
