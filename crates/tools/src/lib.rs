//! Built-in tool implementations for reviewloop.
//!
//! Tools let a reviewing model look past the diff into the checked-out
//! repository: read a file window, grep for a symbol, find files by name.
//! All of them are read-only and confined to the repository root.
//!
//! The final-answer tool is registered as a definition only; calls to it are
//! intercepted by the engine.

pub mod file_reader;
pub mod final_answer;
pub mod grep;
pub mod path_search;
pub mod workspace;

use std::sync::Arc;

use reviewloop_core::tool::ToolRegistry;

pub use final_answer::final_answer_definition;
pub use workspace::RepoRoot;

/// Limits applied by the repository tools.
#[derive(Debug, Clone, Copy)]
pub struct ToolLimits {
    pub max_results: usize,
    pub read_chunk_lines: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_results: 50,
            read_chunk_lines: 100,
        }
    }
}

/// Registry holding only the final-answer definition.
pub fn final_answer_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register_definition(final_answer_definition());
    registry
}

/// Create the default registry: the repository tools rooted at `repo` plus
/// the final-answer definition.
pub fn default_registry(repo: RepoRoot, limits: ToolLimits) -> ToolRegistry {
    let mut registry = final_answer_registry();
    registry.register(Arc::new(file_reader::IterativeFileReader::new(
        repo.clone(),
        limits.read_chunk_lines,
    )));
    registry.register(Arc::new(grep::GrepSearch::new(repo.clone(), limits.max_results)));
    registry.register(Arc::new(path_search::FilePathSearcher::new(repo, limits.max_results)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewloop_core::tool::FINAL_ANSWER_TOOL;

    #[test]
    fn default_registry_contents() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(RepoRoot::new(dir.path()).unwrap(), ToolLimits::default());
        assert_eq!(
            registry.names(),
            vec!["file_path_searcher", "grep_search", "iterative_file_reader", FINAL_ANSWER_TOOL]
        );
        assert!(registry.is_intercepted(FINAL_ANSWER_TOOL));
    }
}
