//! File path searcher: locate files by name fragments.

use async_trait::async_trait;
use reviewloop_core::error::ToolError;
use reviewloop_core::tool::Tool;

use crate::workspace::RepoRoot;

const NAME: &str = "file_path_searcher";

pub struct FilePathSearcher {
    repo: RepoRoot,
    max_results: usize,
}

impl FilePathSearcher {
    pub fn new(repo: RepoRoot, max_results: usize) -> Self {
        Self {
            repo,
            max_results: max_results.max(1),
        }
    }
}

#[async_trait]
impl Tool for FilePathSearcher {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "List files under a directory whose path contains any of the given terms \
         (case-insensitive). With no terms, lists the directory's files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory relative to the repository root"
                },
                "search_terms": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Fragments to match against file paths"
                }
            },
            "required": ["directory"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let directory = arguments["directory"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'directory' argument".into()))?;
        let terms: Vec<String> = match &arguments["search_terms"] {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|t| {
                    t.as_str()
                        .map(str::to_lowercase)
                        .ok_or_else(|| ToolError::InvalidArguments("search_terms must be strings".into()))
                })
                .collect::<Result<_, _>>()?,
            _ => {
                return Err(ToolError::InvalidArguments(
                    "search_terms must be an array of strings".into(),
                ));
            }
        };

        let dir = self.repo.resolve(NAME, directory)?;
        if !dir.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: format!("'{directory}' is not a directory"),
            });
        }

        let files = self.repo.walk(&dir).await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: format!("cannot list '{directory}': {e}"),
        })?;

        let mut matched: Vec<String> = files
            .iter()
            .map(|f| self.repo.display(f))
            .filter(|p| {
                let lower = p.to_lowercase();
                terms.is_empty() || terms.iter().any(|t| lower.contains(t.as_str()))
            })
            .collect();
        let truncated = matched.len() > self.max_results;
        matched.truncate(self.max_results);

        Ok(serde_json::json!({
            "directory": directory,
            "files": matched,
            "truncated": truncated,
        }))
    }
}
