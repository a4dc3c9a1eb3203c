//! Iterative file reader: read a repository file in line windows.

use async_trait::async_trait;
use reviewloop_core::error::ToolError;
use reviewloop_core::tool::Tool;

use crate::workspace::RepoRoot;

const NAME: &str = "iterative_file_reader";

pub struct IterativeFileReader {
    repo: RepoRoot,
    /// Lines returned when the caller gives no end line.
    chunk_lines: usize,
}

impl IterativeFileReader {
    pub fn new(repo: RepoRoot, chunk_lines: usize) -> Self {
        Self {
            repo,
            chunk_lines: chunk_lines.max(1),
        }
    }
}

#[async_trait]
impl Tool for IterativeFileReader {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read a file from the repository, a window of lines at a time. Use it to see code \
         around the diff that the diff itself does not show."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path relative to the repository root"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to read (1-based)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line to read, inclusive"
                }
            },
            "required": ["file_path", "start_line"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let file_path = arguments["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'file_path' argument".into()))?;
        let start = arguments["start_line"].as_u64().unwrap_or(1).max(1) as usize;
        let end = arguments["end_line"]
            .as_u64()
            .map(|e| e as usize)
            .unwrap_or_else(|| start.saturating_add(self.chunk_lines - 1));
        if end < start {
            return Err(ToolError::InvalidArguments(format!(
                "end_line {end} is before start_line {start}"
            )));
        }

        let path = self.repo.resolve(NAME, file_path)?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: format!("cannot read '{file_path}': {e}"),
            })?;

        let total_lines = content.lines().count();
        let numbered: Vec<String> = content
            .lines()
            .enumerate()
            .skip(start - 1)
            .take((end - start).saturating_add(1))
            .map(|(i, line)| format!("{} {line}", i + 1))
            .collect();
        let last = if numbered.is_empty() {
            total_lines
        } else {
            start - 1 + numbered.len()
        };

        tracing::debug!(file = %file_path, start, end = last, "Read file window");

        Ok(serde_json::json!({
            "file_path": self.repo.display(&path),
            "start_line": start,
            "end_line": last,
            "total_lines": total_lines,
            "eof_reached": last >= total_lines,
            "content": numbered.join("\n"),
        }))
    }
}
