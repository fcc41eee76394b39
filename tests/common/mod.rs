//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for exercising the extractor
//! end to end:
//! - Stand-in archiver scripts installed into a fake `Extractors` directory
//! - Builders for small resource containers and installer packages
//! - A workspace that wires both into an [`ExtractorConfig`]

#![allow(dead_code)]

pub mod containers;
pub mod tools;

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use virtual_extract::{AbsolutePath, ExtractorConfig, FileExtractor, ToolsConfig};

/// Scratch space for one test: input files and extractor scratch folders
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create test workspace");
        std::fs::create_dir_all(dir.path().join("inputs")).expect("create inputs dir");
        Self { dir }
    }

    /// Where extractions put their scratch folders
    pub fn scratch(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    /// Write `bytes` as an input file and return its absolute path
    pub fn input(&self, name: &str, bytes: &[u8]) -> AbsolutePath {
        let path = self.dir.path().join("inputs").join(name);
        std::fs::write(&path, bytes).expect("write input file");
        AbsolutePath::new(&path).expect("absolute input path")
    }

    /// Config using the stand-in tools and never searching PATH
    pub fn config(&self) -> ExtractorConfig {
        ExtractorConfig {
            scratch_dir: self.scratch(),
            max_parallelism: 4,
            tools: ToolsConfig {
                install_root: tools::install_root().to_path_buf(),
                search_path: false,
                ..ToolsConfig::default()
            },
            ..ExtractorConfig::default()
        }
    }

    pub fn extractor(&self) -> FileExtractor {
        FileExtractor::new(self.config()).expect("create extractor")
    }

    /// Number of entries left directly under the scratch root
    pub fn scratch_entries(&self) -> usize {
        count_entries(&self.scratch())
    }
}

/// Number of entries directly inside `dir`, 0 if it does not exist
pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
