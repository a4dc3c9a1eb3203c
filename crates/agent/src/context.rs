//! The pull request under review, as handed to every agent.

use reviewloop_core::prompt::PromptVariables;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewContext {
    pub pr_title: String,

    #[serde(default)]
    pub pr_description: String,

    /// Unified diff as produced by `git diff`.
    pub diff: String,

    #[serde(default)]
    pub user_story: String,

    /// Checked-out repository the tools operate on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_root: Option<PathBuf>,
}

impl ReviewContext {
    pub fn new(pr_title: impl Into<String>, diff: impl Into<String>) -> Self {
        Self {
            pr_title: pr_title.into(),
            diff: diff.into(),
            ..Self::default()
        }
    }

    /// The diff with `<+N>` / `<-N>` markers before every content line.
    pub fn numbered_diff(&self) -> String {
        number_diff_lines(&self.diff)
    }

    /// Variables shared by every agent's prompts.
    pub fn base_variables(&self) -> PromptVariables {
        PromptVariables::new()
            .with(PromptVariables::PULL_REQUEST_TITLE, &self.pr_title)
            .with(PromptVariables::PULL_REQUEST_DESCRIPTION, &self.pr_description)
            .with(PromptVariables::PULL_REQUEST_DIFF, self.numbered_diff())
            .with(PromptVariables::PR_DIFF_WITHOUT_LINE_NUMBER, &self.diff)
            .with(PromptVariables::USER_STORY, &self.user_story)
    }
}

/// Prefix each added or context line with its new-file number (`<+N>`) and
/// each removed line with its old-file number (`<-N>`). File and hunk
/// headers pass through unchanged.
pub fn number_diff_lines(diff: &str) -> String {
    let mut out = Vec::new();
    let mut old_line = 0u64;
    let mut new_line = 0u64;
    let mut in_hunk = false;

    for line in diff.lines() {
        if line.starts_with("diff --git") || line.starts_with("index ") {
            in_hunk = false;
            out.push(line.to_string());
        } else if !in_hunk && (line.starts_with("--- ") || line.starts_with("+++ ")) {
            out.push(line.to_string());
        } else if line.starts_with("@@") {
            if let Some((old, new)) = parse_hunk_header(line) {
                old_line = old;
                new_line = new;
                in_hunk = true;
            }
            out.push(line.to_string());
        } else if !in_hunk || line.starts_with('\\') {
            out.push(line.to_string());
        } else if line.starts_with('+') {
            out.push(format!("<+{new_line}> {line}"));
            new_line += 1;
        } else if line.starts_with('-') {
            out.push(format!("<-{old_line}> {line}"));
            old_line += 1;
        } else {
            out.push(format!("<+{new_line}> {line}"));
            new_line += 1;
            old_line += 1;
        }
    }
    out.join("\n")
}

/// `@@ -12,5 +14,7 @@` → `(12, 14)`. Counts are optional.
fn parse_hunk_header(line: &str) -> Option<(u64, u64)> {
    let mut parts = line.split_whitespace().skip(1);
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let start = |range: &str| range.split(',').next()?.parse::<u64>().ok();
    Some((start(old)?, start(new)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "diff --git a/app.py b/app.py
index 83db48f..bf269f4 100644
--- a/app.py
+++ b/app.py
@@ -10,4 +10,5 @@ def handler(req):
     user = req.args['user']
-    q = \"SELECT * FROM t WHERE u = '\" + user + \"'\"
+    q = \"SELECT * FROM t WHERE u = %s\"
+    params = (user,)
     return db.run(q)";

    #[test]
    fn numbers_added_removed_and_context_lines() {
        let numbered = number_diff_lines(DIFF);
        let lines: Vec<&str> = numbered.lines().collect();
        assert_eq!(lines[0], "diff --git a/app.py b/app.py");
        assert_eq!(lines[3], "+++ b/app.py");
        assert!(lines[5].starts_with("<+10>      user"));
        assert!(lines[6].starts_with("<-11> -    q"));
        assert!(lines[7].starts_with("<+11> +    q"));
        assert!(lines[8].starts_with("<+12> +    params"));
        assert!(lines[9].starts_with("<+13>      return"));
    }

    #[test]
    fn hunk_header_without_counts() {
        assert_eq!(parse_hunk_header("@@ -1 +1 @@"), Some((1, 1)));
        assert_eq!(parse_hunk_header("@@ -0,0 +1,3 @@"), Some((0, 1)));
        assert_eq!(parse_hunk_header("@@ garbage"), None);
    }

    #[test]
    fn base_variables_carry_both_diff_forms() {
        let ctx = ReviewContext::new("Parameterize query", DIFF);
        let vars = ctx.base_variables();
        assert_eq!(vars.get(PromptVariables::PR_DIFF_WITHOUT_LINE_NUMBER), Some(DIFF));
        assert!(vars.get(PromptVariables::PULL_REQUEST_DIFF).unwrap().contains("<+12>"));
        assert_eq!(vars.get(PromptVariables::USER_STORY), Some(""));
    }
}
