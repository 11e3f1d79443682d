//! Workspace discovery.
//!
//! Recursively scans a directory for screen sources and their markup templates and runs the
//! validation pass over each one. A file that cannot be read or parsed yields no diagnostics and
//! never stops the sweep.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::EngineConfig;
use crate::context::ValidationContext;
use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenFileKind {
    Source,
    Markup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: ScreenFileKind,
    pub diagnostics: Vec<Diagnostic>,
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == "node_modules" || name.starts_with('.')
}

/// All screen source and markup files under `root`, sorted by path.
pub fn find_screen_files(root: &Path, config: &EngineConfig) -> Vec<(PathBuf, ScreenFileKind)> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if config.is_markup_file(path) {
            files.push((path.to_path_buf(), ScreenFileKind::Markup));
        } else if config.is_source_file(path) {
            files.push((path.to_path_buf(), ScreenFileKind::Source));
        }
    }

    files
}

/// Validate every screen file under `root`.
pub async fn validate_workspace(context: &ValidationContext, root: &Path) -> Vec<FileReport> {
    let files = find_screen_files(root, context.config());
    tracing::debug!(root = %root.display(), files = files.len(), "validating workspace");

    let mut reports = Vec::with_capacity(files.len());
    for (path, kind) in files {
        let diagnostics = match kind {
            ScreenFileKind::Markup => context.validate_markup_file(&path, None).await,
            ScreenFileKind::Source => context.validate_source_file(&path, None).await,
        };
        reports.push(FileReport {
            path,
            kind,
            diagnostics,
        });
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_screen_files_skips_vendor_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("screens/SO")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("screens/SO/SO301000.ts"), "").unwrap();
        fs::write(root.join("screens/SO/SO301000.html"), "").unwrap();
        fs::write(root.join("screens/SO/controls.d.ts"), "").unwrap();
        fs::write(root.join("screens/SO/readme.md"), "").unwrap();
        fs::write(root.join("node_modules/pkg/index.ts"), "").unwrap();
        fs::write(root.join(".git/hooks.ts"), "").unwrap();

        let files = find_screen_files(root, &EngineConfig::default());
        let names: Vec<_> = files
            .iter()
            .map(|(p, k)| (p.file_name().unwrap().to_string_lossy().to_string(), *k))
            .collect();
        assert_eq!(
            names,
            vec![
                ("SO301000.html".to_string(), ScreenFileKind::Markup),
                ("SO301000.ts".to_string(), ScreenFileKind::Source),
            ]
        );
    }
}
