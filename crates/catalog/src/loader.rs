// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loading a catalog from a project directory

use crate::parser::{parse_catalog, Catalog, ParseError};
use std::path::{Path, PathBuf};

/// Catalog location relative to the project root
pub const CATALOG_DIR: &str = ".cue/catalog";

pub fn catalog_dir(project_root: &Path) -> PathBuf {
    project_root.join(CATALOG_DIR)
}

/// Load every `*.toml` file under the project's catalog directory.
///
/// Files are read in name order and parsed as one document, so
/// `[[schedule]]` arrays and `[scenario.*]` tables may be split across
/// files. A missing directory is an empty catalog.
pub fn load_catalog(project_root: &Path) -> Result<Catalog, ParseError> {
    let dir = catalog_dir(project_root);
    if !dir.exists() {
        return Ok(Catalog::default());
    }

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ParseError::Io { path, source }
    };

    let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
        .map_err(io_err(&dir))?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "toml"))
        .collect();
    files.sort();

    let mut combined_content = String::new();
    for path in &files {
        let content = std::fs::read_to_string(path).map_err(io_err(path))?;
        combined_content.push_str(&content);
        combined_content.push('\n');
    }

    if combined_content.trim().is_empty() {
        return Ok(Catalog::default());
    }

    parse_catalog(&combined_content)
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
