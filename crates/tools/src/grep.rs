//! Grep search: find lines matching one or more regex terms across the repository.

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use reviewloop_core::error::ToolError;
use reviewloop_core::tool::Tool;

use crate::workspace::RepoRoot;

const NAME: &str = "grep_search";

pub struct GrepSearch {
    repo: RepoRoot,
    max_results: usize,
}

impl GrepSearch {
    pub fn new(repo: RepoRoot, max_results: usize) -> Self {
        Self {
            repo,
            max_results: max_results.max(1),
        }
    }
}

/// `search_terms` is either a single string or a list of strings.
fn search_terms(arguments: &serde_json::Value) -> Result<Vec<String>, ToolError> {
    let terms: Vec<String> = match &arguments["search_terms"] {
        serde_json::Value::String(term) => vec![term.clone()],
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ToolError::InvalidArguments("'search_terms' must contain only strings".into()))
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(ToolError::InvalidArguments("Missing 'search_terms' argument".into())),
    };
    let terms: Vec<String> = terms.into_iter().filter(|t| !t.is_empty()).collect();
    if terms.is_empty() {
        return Err(ToolError::InvalidArguments("'search_terms' must not be empty".into()));
    }
    Ok(terms)
}

fn compile(terms: &[String], case_insensitive: bool) -> Result<Vec<Regex>, ToolError> {
    terms
        .iter()
        .map(|term| {
            RegexBuilder::new(term)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| ToolError::InvalidArguments(format!("Invalid regex pattern '{term}': {e}")))
        })
        .collect()
}

#[async_trait]
impl Tool for GrepSearch {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search repository files for one or more regex patterns and return matching lines with \
         their file path, line number and the term that matched. Use it to find usages and \
         definitions of symbols in the diff."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "search_terms": {
                    "oneOf": [
                        { "type": "string" },
                        { "type": "array", "items": { "type": "string" } }
                    ],
                    "description": "Regex pattern, or list of patterns, to search for"
                },
                "directory_path": {
                    "type": "string",
                    "description": "Directory to search, relative to the repository root (default: whole repository)"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Ignore case when matching"
                }
            },
            "required": ["search_terms"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let terms = search_terms(&arguments)?;
        let case_insensitive = arguments["case_insensitive"].as_bool().unwrap_or(false);
        let patterns = compile(&terms, case_insensitive)?;
        let dir = match arguments["directory_path"].as_str() {
            Some(d) if !d.trim().is_empty() && d.trim() != "." => self.repo.resolve(NAME, d)?,
            _ => self.repo.path().to_path_buf(),
        };

        let files = self.repo.walk(&dir).await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: format!("cannot list '{}': {e}", self.repo.display(&dir)),
        })?;

        let mut matches = Vec::new();
        let mut truncated = false;
        'files: for file in &files {
            // Binary and non-UTF-8 files are skipped.
            let Ok(content) = tokio::fs::read_to_string(file).await else {
                continue;
            };
            for (i, line) in content.lines().enumerate() {
                let Some(hit) = patterns.iter().position(|p| p.is_match(line)) else {
                    continue;
                };
                if matches.len() == self.max_results {
                    truncated = true;
                    break 'files;
                }
                matches.push(serde_json::json!({
                    "file_path": self.repo.display(file),
                    "line_number": i + 1,
                    "line": line.trim_end(),
                    "search_term": terms[hit],
                }));
            }
        }

        tracing::debug!(terms = ?terms, matches = matches.len(), truncated, "Grep search finished");

        Ok(serde_json::json!({
            "search_terms": terms,
            "matches": matches,
            "truncated": truncated,
        }))
    }
}
