//! Magic-byte format detection
//!
//! The checker holds an ordered list of [`SignatureRule`]s and reads only as
//! many leading bytes as its longest pattern needs.
//!
//! ## Rule order
//!
//! Matching is **first match wins, in registration order**. Longer and more
//! specific patterns are registered ahead of shorter ones they could be
//! confused with (RAR5 before RAR4, every other format before the two-byte
//! `MZ` executable header).
//!
//! Some formats cannot be told apart by prefix alone: a self-extracting
//! installer and an archive glued onto an executable stub both start with
//! `MZ`. Such rules carry a fallback, and [`SignatureChecker::classify`] asks a
//! [`StructuralProbe`] to confirm the candidate with a trial run before
//! settling on it.

use crate::error::Result;
use crate::types::ContainerType;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Specific format a rule recognizes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileSignature {
    /// Morrowind-era BSA
    Tes3Bsa,
    /// Oblivion/Skyrim BSA (`BSA\0`)
    Bsa,
    /// Fallout 4 / Starfield BA2 (`BTDX`)
    Ba2,
    /// 7-Zip
    SevenZip,
    /// RAR 5.x
    Rar5,
    /// RAR 1.5 - 4.x
    Rar,
    /// ZIP local file header
    Zip,
    /// DOS/PE executable (`MZ`)
    Exe,
}

/// One registered magic-byte pattern
#[derive(Clone, Debug)]
pub struct SignatureRule {
    /// The format this pattern identifies
    pub signature: FileSignature,
    /// Bytes expected at offset 0
    pub magic: &'static [u8],
    /// Container family the match resolves to
    pub container: ContainerType,
    /// For ambiguous prefixes: what to use when the probe does not confirm `container`
    pub fallback: Option<ContainerType>,
}

impl SignatureRule {
    /// An unambiguous rule
    pub const fn new(
        signature: FileSignature,
        magic: &'static [u8],
        container: ContainerType,
    ) -> Self {
        Self {
            signature,
            magic,
            container,
            fallback: None,
        }
    }

    /// A rule whose match must be confirmed by a structural probe
    pub const fn ambiguous(
        signature: FileSignature,
        magic: &'static [u8],
        container: ContainerType,
        fallback: ContainerType,
    ) -> Self {
        Self {
            signature,
            magic,
            container,
            fallback: Some(fallback),
        }
    }

    fn matches(&self, prefix: &[u8]) -> bool {
        prefix.starts_with(self.magic)
    }
}

/// Confirms an ambiguous classification by trying the candidate backend
#[async_trait]
pub trait StructuralProbe: Send + Sync {
    /// Whether `path` really is a `container`
    async fn confirms(&self, container: ContainerType, path: &Path) -> bool;
}

/// Default rule set, in matching order
pub fn default_rules() -> Vec<SignatureRule> {
    use ContainerType::*;
    use FileSignature::*;
    vec![
        SignatureRule::new(Tes3Bsa, &[0x00, 0x01, 0x00, 0x00], ResourceContainerV1),
        SignatureRule::new(Bsa, b"BSA\0", ResourceContainerV1),
        SignatureRule::new(Ba2, b"BTDX", ResourceContainerV2),
        SignatureRule::new(SevenZip, &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], GenericArchive),
        SignatureRule::new(Rar5, &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x01, 0x00], GenericArchive),
        SignatureRule::new(Rar, &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00], GenericArchive),
        SignatureRule::new(Zip, &[0x50, 0x4B, 0x03, 0x04], GenericArchive),
        SignatureRule::ambiguous(Exe, b"MZ", SelfExtractingInstaller, GenericArchive),
    ]
}

/// Classifies files by their leading bytes
#[derive(Clone, Debug)]
pub struct SignatureChecker {
    rules: Vec<SignatureRule>,
    prefix_len: usize,
}

impl SignatureChecker {
    /// Build a checker over `rules`, matched in the given order
    pub fn new(rules: Vec<SignatureRule>) -> Self {
        let prefix_len = rules.iter().map(|r| r.magic.len()).max().unwrap_or(0);
        Self { rules, prefix_len }
    }

    /// Registered rules in matching order
    pub fn rules(&self) -> &[SignatureRule] {
        &self.rules
    }

    /// Number of leading bytes [`classify`](Self::classify) reads
    pub fn max_prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// First rule whose pattern `prefix` starts with
    pub fn match_prefix(&self, prefix: &[u8]) -> Option<&SignatureRule> {
        self.rules.iter().find(|rule| rule.matches(prefix))
    }

    /// Container type implied by `prefix` alone, without probing
    pub fn classify_bytes(&self, prefix: &[u8]) -> Option<ContainerType> {
        self.match_prefix(prefix).map(|rule| rule.container)
    }

    /// Read the leading bytes of `path` and classify them
    ///
    /// Ambiguous matches are settled through `probe`. `Ok(None)` means no rule
    /// matched; only failing to open or read the file is an error.
    pub async fn classify(
        &self,
        path: &Path,
        probe: &dyn StructuralProbe,
    ) -> Result<Option<ContainerType>> {
        let prefix = self.read_prefix(path).await?;
        let Some(rule) = self.match_prefix(&prefix) else {
            debug!(?path, "no signature matched");
            return Ok(None);
        };

        let Some(fallback) = rule.fallback else {
            debug!(
                ?path,
                signature = ?rule.signature,
                container = ?rule.container,
                "signature matched"
            );
            return Ok(Some(rule.container));
        };

        let container = if probe.confirms(rule.container, path).await {
            rule.container
        } else {
            fallback
        };
        debug!(
            ?path,
            signature = ?rule.signature,
            ?container,
            "ambiguous signature resolved by probe"
        );
        Ok(Some(container))
    }

    async fn read_prefix(&self, path: &Path) -> Result<Vec<u8>> {
        let file = tokio::fs::File::open(path).await?;
        let mut prefix = Vec::with_capacity(self.prefix_len);
        file.take(self.prefix_len as u64)
            .read_to_end(&mut prefix)
            .await?;
        Ok(prefix)
    }
}

impl Default for SignatureChecker {
    fn default() -> Self {
        Self::new(default_rules())
    }
}
