//! Stand-in archiver binaries
//!
//! Shell scripts that accept the same command lines as `7z` and `innounp`
//! and understand a trivial text "archive" format (see [`fake_archive`]).
//! They are written once per test process, before anything is spawned, so
//! no test can exec a script another thread still holds open for writing.

use std::path::Path;
use std::sync::OnceLock;
use tempfile::TempDir;

/// Marker line that makes the stand-in tools fail like a corrupt archive would
pub const CORRUPT_MARKER: &str = "CORRUPT";

/// Marker that makes the installer stand-in accept an executable
pub const INSTALLER_MARKER: &str = "INNO";

const SEVENZIP_SCRIPT: &str = r#"#!/bin/sh
cmd="$1"; shift
dest=""; src=""; list=""
for arg in "$@"; do
  case "$arg" in
    -o*) dest="${arg#-o}" ;;
    @*) list="${arg#@}" ;;
    -*) ;;
    *) src="$arg" ;;
  esac
done
if grep -q CORRUPT "$src"; then
  echo "ERROR: $src : Data Error" >&2
  exit 2
fi
[ "$cmd" = "t" ] && exit 0
printf '  0%%\r'
tail -n +2 "$src" | while IFS='|' read -r path content; do
  [ -z "$path" ] && continue
  if [ -n "$list" ]; then
    win=$(printf '%s' "$path" | tr '/' '\\')
    grep -F -x -q "\"$win\"" "$list" || continue
  fi
  mkdir -p "$dest/$(dirname "$path")"
  printf '%s' "$content" > "$dest/$path"
done
printf ' 50%% 1 - files\r100%%\n'
echo "Everything is Ok"
"#;

const INNOUNP_SCRIPT: &str = r#"#!/bin/sh
dest=""; src=""; mode=""
for arg in "$@"; do
  case "$arg" in
    -x) mode=x ;;
    -t) mode=t ;;
    -d*) dest="${arg#-d}" ;;
    -*) ;;
    *) src="$arg" ;;
  esac
done
grep -q INNO "$src" || { echo "not an installer" >&2; exit 1; }
[ "$mode" = "t" ] && exit 0
mkdir -p "$dest/{app}"
printf 'installed' > "$dest/{app}/readme.txt"
printf 'install script' > "$dest/install_script.iss"
printf '100%%\n'
"#;

static INSTALL_ROOT: OnceLock<TempDir> = OnceLock::new();

/// Install root whose `Extractors` directory holds the stand-in tools
pub fn install_root() -> &'static Path {
    INSTALL_ROOT
        .get_or_init(|| {
            let root = TempDir::new().expect("create install root");
            let extractors = root.path().join("Extractors");
            std::fs::create_dir_all(&extractors).expect("create Extractors dir");
            write_script(&extractors.join("7z"), SEVENZIP_SCRIPT);
            write_script(&extractors.join("innounp"), INNOUNP_SCRIPT);
            root
        })
        .path()
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, body).expect("write tool script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("mark tool script executable");
}

#[cfg(not(unix))]
fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).expect("write tool script");
}

/// A ZIP-signed text archive the `7z` stand-in can "extract"
///
/// Every entry becomes a `path|content` line; paths use `/`.
pub fn fake_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut out = b"PK\x03\x04\n".to_vec();
    for (path, content) in entries {
        out.extend_from_slice(format!("{path}|{content}\n").as_bytes());
    }
    out
}

/// A ZIP-signed archive the stand-in tools refuse with exit code 2
pub fn corrupt_archive() -> Vec<u8> {
    let mut out = fake_archive(&[("a.txt", "alpha")]);
    out.extend_from_slice(CORRUPT_MARKER.as_bytes());
    out.push(b'\n');
    out
}

/// An `MZ` executable; `installer` decides whether `innounp` claims it
pub fn fake_executable(installer: bool) -> Vec<u8> {
    let mut out = b"MZ\x90\x00".to_vec();
    if installer {
        out.extend_from_slice(INSTALLER_MARKER.as_bytes());
    }
    out.push(b'\n');
    out
}
