//! Core types and events for virtual-extract

use serde::{Deserialize, Serialize};
use std::fmt;

/// Container families the signature checker can resolve a file to
///
/// This set is closed: every backend is registered against exactly one of
/// these, and nothing else produces a value of this type except the
/// signature checker and the explicit extension override table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    /// 7z, ZIP, RAR and anything else the generic archiver reads
    GenericArchive,
    /// Bethesda BSA (TES3 and TES4+ layouts)
    ResourceContainerV1,
    /// Bethesda BA2 (`BTDX`)
    ResourceContainerV2,
    /// Inno Setup style self-extracting executable
    SelfExtractingInstaller,
    /// OMOD installer package
    InstallerPackage,
}

impl ContainerType {
    /// All variants, in declaration order
    pub const ALL: [ContainerType; 5] = [
        ContainerType::GenericArchive,
        ContainerType::ResourceContainerV1,
        ContainerType::ResourceContainerV2,
        ContainerType::SelfExtractingInstaller,
        ContainerType::InstallerPackage,
    ];
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerType::GenericArchive => "generic archive",
            ContainerType::ResourceContainerV1 => "resource container (v1)",
            ContainerType::ResourceContainerV2 => "resource container (v2)",
            ContainerType::SelfExtractingInstaller => "self-extracting installer",
            ContainerType::InstallerPackage => "installer package",
        };
        f.write_str(name)
    }
}

/// Notification emitted while extracting
///
/// Delivered through [`crate::progress::Notifier`]; collaborators subscribe
/// and render or persist these however they like.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionEvent {
    /// Free-form status line
    Status {
        /// Message text
        message: String,
    },

    /// Progress update
    Progress {
        /// What is progressing (usually the source file name)
        message: String,
        /// Fraction complete, in `[0.0, 1.0]`
        percent: f32,
        /// Whether a log sink should keep this line
        persist: bool,
    },
}
