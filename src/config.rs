//! Configuration types for virtual-extract

use crate::error::{Error, Result};
use crate::paths::Extension;
use crate::types::ContainerType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the directory under the install root that holds tool binaries
pub const EXTRACTORS_DIR: &str = "Extractors";

/// External tool locations
///
/// Binaries are looked up at `<install_root>/Extractors/<tool>` first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Application install root (default: directory of the running executable)
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,

    /// Whether to search PATH when a tool is missing from the Extractors directory (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// File name of the generic archiver, without platform suffix (default: "7z")
    #[serde(default = "default_sevenzip_name")]
    pub sevenzip_name: String,

    /// File name of the installer unpacker, without platform suffix (default: "innounp")
    #[serde(default = "default_innounp_name")]
    pub innounp_name: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            search_path: true,
            sevenzip_name: default_sevenzip_name(),
            innounp_name: default_innounp_name(),
        }
    }
}

impl ToolsConfig {
    /// The `Extractors` directory under the install root
    pub fn extractors_dir(&self) -> PathBuf {
        self.install_root.join(EXTRACTORS_DIR)
    }

    /// Where the bundled copy of `tool` would live
    pub fn bundled_tool_path(&self, tool: &str) -> PathBuf {
        self.extractors_dir()
            .join(format!("{tool}{}", std::env::consts::EXE_SUFFIX))
    }
}

/// Main configuration for [`FileExtractor`](crate::FileExtractor)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Root for scratch folders and list files (default: "<system temp>/virtual-extract")
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Maximum concurrently running work items (default: available parallelism)
    #[serde(default = "crate::executor::default_parallelism")]
    pub max_parallelism: usize,

    /// Capacity of the notification channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Extensions that route to a backend without consulting signatures
    ///
    /// Default: `.omod` → installer package.
    #[serde(default = "default_extension_overrides")]
    pub extension_overrides: BTreeMap<Extension, ContainerType>,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            max_parallelism: crate::executor::default_parallelism(),
            event_buffer: default_event_buffer(),
            extension_overrides: default_extension_overrides(),
            tools: ToolsConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.max_parallelism == 0 {
            return Err(Error::Config {
                message: "max_parallelism must be at least 1".to_string(),
                key: Some("max_parallelism".to_string()),
            });
        }
        if self.event_buffer == 0 {
            return Err(Error::Config {
                message: "event_buffer must be at least 1".to_string(),
                key: Some("event_buffer".to_string()),
            });
        }
        if self.tools.sevenzip_name.trim().is_empty() {
            return Err(Error::Config {
                message: "sevenzip_name must not be empty".to_string(),
                key: Some("sevenzip_name".to_string()),
            });
        }
        if self.tools.innounp_name.trim().is_empty() {
            return Err(Error::Config {
                message: "innounp_name must not be empty".to_string(),
                key: Some("innounp_name".to_string()),
            });
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_true() -> bool {
    true
}

fn default_install_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_sevenzip_name() -> String {
    "7z".to_string()
}

fn default_innounp_name() -> String {
    "innounp".to_string()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("virtual-extract")
}

fn default_event_buffer() -> usize {
    crate::progress::DEFAULT_EVENT_BUFFER
}

fn default_extension_overrides() -> BTreeMap<Extension, ContainerType> {
    BTreeMap::from([(Extension::new(".omod"), ContainerType::InstallerPackage)])
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ExtractorConfig::default();
        config.validate().unwrap();
        assert!(config.max_parallelism >= 1);
        assert_eq!(
            config.extension_overrides.get(&Extension::new("omod")),
            Some(&ContainerType::InstallerPackage)
        );
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: ExtractorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.event_buffer, 1000);
        assert!(config.tools.search_path);
        assert_eq!(config.tools.sevenzip_name, "7z");
    }

    #[test]
    fn test_flattened_tool_settings() {
        let config: ExtractorConfig = serde_json::from_str(
            r#"{
                "install_root": "/opt/app",
                "search_path": false,
                "max_parallelism": 2,
                "extension_overrides": {
                    "OMOD": "installer_package",
                    ".exe": "self_extracting_installer"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.tools.install_root, PathBuf::from("/opt/app"));
        assert!(!config.tools.search_path);
        assert_eq!(config.max_parallelism, 2);
        assert_eq!(
            config.extension_overrides.get(&Extension::new(".exe")),
            Some(&ContainerType::SelfExtractingInstaller)
        );
        assert!(config.extension_overrides.contains_key(&Extension::new("omod")));
    }

    #[test]
    fn test_bundled_tool_path_under_extractors() {
        let tools = ToolsConfig {
            install_root: PathBuf::from("/opt/app"),
            ..Default::default()
        };
        let path = tools.bundled_tool_path("7z");
        assert!(path.starts_with("/opt/app/Extractors"));
        assert!(path.to_string_lossy().contains("7z"));
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let config = ExtractorConfig {
            max_parallelism: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("max_parallelism")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
