//! Relative import resolution.
//!
//! Maps `(importing file, "./specifier")` to a file on disk by trying candidate extensions.
//! Package imports are never followed.

use std::path::{Component, Path, PathBuf};

use crate::source_module::is_relative_specifier;

/// Lexically normalize a path: anchor relative paths at the working directory, drop `.` segments
/// and fold `..` into their parent. Used as the key for every per-file cache so `a/./b.ts`,
/// `a/c/../b.ts` and the absolute spelling of either hit the same entry.
pub fn normalize_path(path: &Path) -> PathBuf {
    let anchored;
    let path = match std::env::current_dir() {
        Ok(cwd) if path.is_relative() => {
            anchored = cwd.join(path);
            anchored.as_path()
        }
        _ => path,
    };
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` above the root stays at the root.
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct ModuleResolver {
    extensions: Vec<String>,
}

impl ModuleResolver {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// Resolve `specifier` as imported from `from_file`. `None` for package imports or when no
    /// candidate exists.
    pub fn resolve(&self, from_file: &Path, specifier: &str) -> Option<PathBuf> {
        if !is_relative_specifier(specifier) {
            return None;
        }
        let base_dir = from_file.parent().unwrap_or_else(|| Path::new(""));
        let target = normalize_path(&base_dir.join(specifier));

        self.candidates(&target).into_iter().find(|candidate| candidate.is_file())
    }

    fn candidates(&self, target: &Path) -> Vec<PathBuf> {
        let raw = target.to_string_lossy();
        let mut candidates = vec![target.to_path_buf()];
        for ext in &self.extensions {
            candidates.push(PathBuf::from(format!("{}{}", raw, ext)));
        }
        // `./foo.js` written against a `foo.ts` source
        if let Some(stem) = raw.strip_suffix(".js") {
            candidates.push(PathBuf::from(format!("{}.ts", stem)));
        }
        candidates
    }
}
