//! Repository confinement: every tool path is resolved against a single
//! checked-out repository root and may not escape it.

use reviewloop_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// Directories never descended into by the search tools.
const SKIPPED_DIRS: [&str; 5] = [".git", "target", "node_modules", "__pycache__", ".venv"];

#[derive(Debug, Clone)]
pub struct RepoRoot {
    root: PathBuf,
}

impl RepoRoot {
    /// Canonicalize `root`. Fails if it does not exist.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a repository-relative path for `tool_name`.
    ///
    /// Rejects `..` components, absolute paths outside the root, and symlinks
    /// pointing out of the repository.
    pub fn resolve(&self, tool_name: &str, relative: &str) -> Result<PathBuf, ToolError> {
        let denied = |reason: String| ToolError::PermissionDenied {
            tool_name: tool_name.to_string(),
            reason,
        };

        let input = Path::new(relative.trim());
        if input.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(denied(format!("path traversal in '{relative}'")));
        }

        let joined = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.root.join(input)
        };

        let resolved = if joined.exists() {
            joined
                .canonicalize()
                .map_err(|e| denied(format!("cannot resolve '{relative}': {e}")))?
        } else {
            joined
        };

        if !resolved.starts_with(&self.root) {
            return Err(denied(format!("'{relative}' is outside the repository")));
        }
        Ok(resolved)
    }

    /// Path relative to the root, with `/` separators.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// All regular files under `start`, sorted, skipping vendored and build
    /// directories.
    pub async fn walk(&self, start: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![start.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let name = entry.file_name();
                if file_type.is_dir() {
                    if !SKIPPED_DIRS.iter().any(|s| name == *s) {
                        pending.push(entry.path());
                    }
                } else if file_type.is_file() {
                    files.push(entry.path());
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
