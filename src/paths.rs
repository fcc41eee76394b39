//! Normalized path value types
//!
//! [`AbsolutePath`] is always rooted and uses the platform separator.
//! [`RelativePath`] is always `/`-separated, never rooted, never escapes its
//! base with `..`, and compares case-insensitively while keeping the spelling
//! it was built from. [`Extension`] is a lowercase suffix with a leading dot.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// A rooted, normalized filesystem path
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct AbsolutePath(PathBuf);

impl AbsolutePath {
    /// Validate and normalize `path`
    ///
    /// `.` components are dropped and `..` components are resolved lexically.
    /// Each component keeps its original bytes; only separators the platform
    /// recognizes split components.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let raw = path.as_ref();
        if !raw.is_absolute() {
            return Err(Error::InvalidPath {
                path: raw.to_path_buf(),
                reason: "path is not rooted".to_string(),
            });
        }

        let mut normalized = PathBuf::new();
        for component in raw.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other.as_os_str()),
            }
        }
        Ok(Self(normalized))
    }

    /// Borrow as a std path
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Append a relative path
    pub fn join(&self, relative: &RelativePath) -> AbsolutePath {
        let mut joined = self.0.clone();
        for part in relative.parts() {
            joined.push(part);
        }
        AbsolutePath(joined)
    }

    /// The final component's extension, if any
    pub fn extension(&self) -> Option<Extension> {
        Extension::of(&self.0)
    }

    /// The final component as a string
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|n| n.to_str())
    }

    /// The containing directory
    pub fn parent(&self) -> Option<AbsolutePath> {
        self.0.parent().map(|p| AbsolutePath(p.to_path_buf()))
    }

    /// Express `self` relative to `base`
    ///
    /// `base` must be a component-wise ancestor of `self`. Anything else is an
    /// [`Error::InvalidPath`]; no heuristic re-rooting is attempted.
    pub fn relative_to(&self, base: &AbsolutePath) -> Result<RelativePath> {
        let suffix = self.0.strip_prefix(&base.0).map_err(|_| Error::InvalidPath {
            path: self.0.clone(),
            reason: format!("not located under {}", base.0.display()),
        })?;
        RelativePath::new(suffix.to_string_lossy())
    }

    /// Whether `self` is `base` or lies below it
    pub fn starts_with(&self, base: &AbsolutePath) -> bool {
        self.0.starts_with(&base.0)
    }
}

impl AsRef<Path> for AbsolutePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<PathBuf> for AbsolutePath {
    type Error = Error;

    fn try_from(path: PathBuf) -> Result<Self> {
        AbsolutePath::new(path)
    }
}

impl TryFrom<&Path> for AbsolutePath {
    type Error = Error;

    fn try_from(path: &Path) -> Result<Self> {
        AbsolutePath::new(path)
    }
}

impl From<AbsolutePath> for PathBuf {
    fn from(path: AbsolutePath) -> Self {
        path.0
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A path relative to some container or directory root
///
/// Equality, ordering and hashing ignore ASCII case, which is how the
/// containers this crate reads (and the filesystems they target) treat names.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath {
    display: String,
    key: String,
}

impl RelativePath {
    /// Validate and normalize `path`
    ///
    /// Both `/` and `\` are accepted as separators; empty and `.` segments are
    /// dropped. Rooted paths, drive prefixes and `..` segments are rejected.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let invalid = |reason: &str| Error::InvalidPath {
            path: PathBuf::from(raw),
            reason: reason.to_string(),
        };

        if raw.starts_with(['/', '\\']) {
            return Err(invalid("relative path begins with a root marker"));
        }
        if raw.len() >= 2 && raw.as_bytes()[1] == b':' {
            return Err(invalid("relative path carries a drive prefix"));
        }

        let mut parts = Vec::new();
        for part in raw.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => return Err(invalid("relative path escapes its base")),
                other => parts.push(other),
            }
        }
        if parts.is_empty() {
            return Err(invalid("relative path is empty"));
        }

        let display = parts.join("/");
        let key = display.to_ascii_lowercase();
        Ok(Self { display, key })
    }

    /// The path as written, `/`-separated
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Render with an arbitrary separator (archivers want `\`)
    pub fn with_separator(&self, separator: char) -> String {
        self.display.replace('/', &separator.to_string())
    }

    /// Individual segments
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.display.split('/')
    }

    /// The final segment
    pub fn file_name(&self) -> &str {
        self.parts().last().unwrap_or_default()
    }

    /// The final segment's extension, if any
    pub fn extension(&self) -> Option<Extension> {
        Extension::of(Path::new(self.file_name()))
    }

    /// Append another relative path
    pub fn join(&self, other: &RelativePath) -> RelativePath {
        let display = format!("{}/{}", self.display, other.display);
        let key = display.to_ascii_lowercase();
        RelativePath { display, key }
    }
}

impl PartialEq for RelativePath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RelativePath {}

impl Hash for RelativePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for RelativePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelativePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.display)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        RelativePath::new(value)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        RelativePath::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.display
    }
}

/// Lowercase file suffix including the leading dot (e.g. `.omod`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Extension(String);

impl Extension {
    /// Normalize `ext`; a missing leading dot is added
    pub fn new(ext: impl AsRef<str>) -> Self {
        let lower = ext.as_ref().trim().to_ascii_lowercase();
        if lower.starts_with('.') {
            Self(lower)
        } else {
            Self(format!(".{lower}"))
        }
    }

    /// Extension of the last component of `path`
    pub fn of(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(Self::new)
    }

    /// The normalized form, dot included
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Extension {
    fn from(value: String) -> Self {
        Extension::new(value)
    }
}

impl From<&str> for Extension {
    fn from(value: &str) -> Self {
        Extension::new(value)
    }
}

impl From<Extension> for String {
    fn from(ext: Extension) -> Self {
        ext.0
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn root() -> PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn test_absolute_path_rejects_relative() {
        let result = AbsolutePath::new("mods/a.7z");
        assert!(matches!(result, Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn test_absolute_path_resolves_dots() {
        let base = root();
        let path = AbsolutePath::new(base.join("a").join(".").join("b").join("..").join("c"))
            .unwrap();
        assert_eq!(path.as_path(), base.join("a").join("c"));
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_path_keeps_component_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let odd = OsStr::from_bytes(b"caf\xE9\\menu.txt");
        let raw = root().join("mods").join("x").join("..").join(odd);
        let path = AbsolutePath::new(&raw).unwrap();

        assert_eq!(path.as_path(), root().join("mods").join(odd));
        assert_eq!(path.as_path().file_name(), Some(odd));
        assert_eq!(path.parent().unwrap().as_path(), root().join("mods"));
    }

    #[test]
    fn test_relative_to_descendant() {
        let base = AbsolutePath::new(root().join("extract")).unwrap();
        let file = AbsolutePath::new(root().join("extract").join("meshes").join("a.nif")).unwrap();
        let rel = file.relative_to(&base).unwrap();
        assert_eq!(rel.as_str(), "meshes/a.nif");
        assert_eq!(base.join(&rel), file);
    }

    #[test]
    fn test_relative_to_non_ancestor_fails() {
        let base = AbsolutePath::new(root().join("extract")).unwrap();
        let other = AbsolutePath::new(root().join("extracted").join("a.nif")).unwrap();
        assert!(matches!(
            other.relative_to(&base),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_relative_path_rejects_root_and_parent() {
        assert!(RelativePath::new("/a.txt").is_err());
        assert!(RelativePath::new("\\a.txt").is_err());
        assert!(RelativePath::new("C:\\a.txt").is_err());
        assert!(RelativePath::new("a/../../b").is_err());
        assert!(RelativePath::new("").is_err());
    }

    #[test]
    fn test_relative_path_normalizes_separators() {
        let rel = RelativePath::new("Textures\\Armor//iron.dds").unwrap();
        assert_eq!(rel.as_str(), "Textures/Armor/iron.dds");
        assert_eq!(rel.with_separator('\\'), "Textures\\Armor\\iron.dds");
        assert_eq!(rel.file_name(), "iron.dds");
        assert_eq!(rel.extension(), Some(Extension::new("dds")));
    }

    #[test]
    fn test_relative_path_case_insensitive_identity() {
        let a = RelativePath::new("Meshes/Foo.NIF").unwrap();
        let b = RelativePath::new("meshes\\foo.nif").unwrap();
        assert_eq!(a, b);

        let set: HashSet<RelativePath> = [a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_eq!(a.to_string(), "Meshes/Foo.NIF");
    }

    #[test]
    fn test_extension_normalization() {
        assert_eq!(Extension::new("OMOD"), Extension::new(".omod"));
        assert_eq!(Extension::new("7z").as_str(), ".7z");
        assert_eq!(Extension::of(Path::new("archive.ZIP")), Some(Extension::new("zip")));
        assert_eq!(Extension::of(Path::new("README")), None);
    }

    #[test]
    fn test_relative_path_serde_roundtrip() {
        let rel = RelativePath::new("a\\b.txt").unwrap();
        let json = serde_json::to_string(&rel).unwrap();
        assert_eq!(json, "\"a/b.txt\"");
        let back: RelativePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rel);
        assert!(serde_json::from_str::<RelativePath>("\"../x\"").is_err());
    }
}
