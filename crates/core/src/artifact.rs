//! Locating a renderer's output file inside its working directory.
//!
//! External renderers nest their output under directories derived from
//! quality settings and script names. [`ArtifactLocator`] checks a list of
//! known relative locations first, falls back to a recursive scan, and
//! when nothing is found reports whether partial artifacts exist so the
//! caller can tell an interrupted render from one that never started.

use std::fs;
use std::path::{Path, PathBuf};

/// Result of looking for an expected output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLookup {
    /// The expected file exists at this (absolute) path.
    Found(PathBuf),
    /// The expected file is missing but partial artifacts are present.
    Incomplete { partials: Vec<PathBuf> },
    /// Neither the file nor any partial artifact exists.
    Absent,
}

/// Finds one expected file under a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    file_name: String,
    candidates: Vec<PathBuf>,
    partial_dirs: Vec<String>,
    partial_prefixes: Vec<String>,
}

impl ArtifactLocator {
    /// Look for a file named `file_name`.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            candidates: Vec::new(),
            partial_dirs: Vec::new(),
            partial_prefixes: Vec::new(),
        }
    }

    /// Add a relative directory (under the root) checked before the
    /// recursive scan. Candidates are tried in insertion order.
    pub fn with_candidate(mut self, relative_dir: impl Into<PathBuf>) -> Self {
        self.candidates.push(relative_dir.into());
        self
    }

    /// Files inside any directory with this name count as partial artifacts.
    pub fn with_partial_dir(mut self, dir_name: impl Into<String>) -> Self {
        self.partial_dirs.push(dir_name.into());
        self
    }

    /// Files whose name starts with this prefix count as partial artifacts.
    pub fn with_partial_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.partial_prefixes.push(prefix.into());
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Search `root`. Blocking; run it on a blocking thread from async code.
    pub fn locate(&self, root: &Path) -> ArtifactLookup {
        for candidate in &self.candidates {
            let path = root.join(candidate).join(&self.file_name);
            if path.is_file() {
                return ArtifactLookup::Found(path);
            }
        }

        let files = walk_files(root);

        if let Some(found) = files
            .iter()
            .find(|path| path.file_name().is_some_and(|n| n == self.file_name.as_str()))
        {
            return ArtifactLookup::Found(found.clone());
        }

        let partials: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| self.is_partial(root, path))
            .collect();

        if partials.is_empty() {
            ArtifactLookup::Absent
        } else {
            ArtifactLookup::Incomplete { partials }
        }
    }

    fn is_partial(&self, root: &Path, path: &Path) -> bool {
        let name_matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.partial_prefixes.iter().any(|p| name.starts_with(p.as_str())));
        if name_matches {
            return true;
        }

        path.strip_prefix(root)
            .ok()
            .and_then(Path::parent)
            .is_some_and(|parent| {
                parent.components().any(|c| {
                    c.as_os_str()
                        .to_str()
                        .is_some_and(|s| self.partial_dirs.iter().any(|d| d == s))
                })
            })
    }
}

/// Every regular file under `root`, depth-first in name order. Symlinks
/// are not followed. Unreadable directories are skipped.
fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                subdirs.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
        // Reverse so the stack pops subdirectories in name order.
        stack.extend(subdirs.into_iter().rev());
    }

    files
}
