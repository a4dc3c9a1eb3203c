//! Template-based prompt renderer.
//!
//! Templates are looked up by feature id, most specific first:
//!
//! 1. `"{feature_id}@{model}"`: a model-specific override
//! 2. `"{feature_id}"`, e.g. `security_comments_generation_pass_1`
//! 3. the generic template for the feature kind, e.g. `comments_generation_pass_1`
//!
//! `${VAR}` placeholders are substituted from the prompt variables. Unknown
//! placeholders are left as written.

use reviewloop_core::agent::PromptFeature;
use reviewloop_core::error::PromptError;
use reviewloop_core::prompt::{PromptRenderer, PromptVariables, RenderedMessages};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
    pub disable_tools: bool,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            disable_tools: false,
        }
    }

    pub fn without_tools(mut self) -> Self {
        self.disable_tools = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplatePromptRenderer {
    templates: BTreeMap<String, PromptTemplate>,
}

impl TemplatePromptRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer preloaded with the built-in templates.
    pub fn with_defaults() -> Self {
        let mut renderer = Self::new();
        renderer.register("comments_generation_pass_1", PromptTemplate::new(COMMENTER_SYSTEM, COMMENTER_PASS_1));
        renderer.register("comments_generation_pass_2", PromptTemplate::new(COMMENTER_SYSTEM, COMMENTER_PASS_2));
        renderer.register(
            &PromptFeature::PrSummary.id(),
            PromptTemplate::new(SUMMARY_SYSTEM, SUMMARY_USER).without_tools(),
        );
        renderer.register(
            &PromptFeature::CommentValidation.id(),
            PromptTemplate::new(VALIDATION_SYSTEM, VALIDATION_USER),
        );
        renderer.register(
            &PromptFeature::CommentSummarization.id(),
            PromptTemplate::new(SUMMARIZATION_SYSTEM, SUMMARIZATION_USER).without_tools(),
        );
        renderer
    }

    pub fn register(&mut self, key: &str, template: PromptTemplate) {
        self.templates.insert(key.to_string(), template);
    }

    fn lookup(&self, feature: &PromptFeature, model: &str) -> Option<&PromptTemplate> {
        let id = feature.id();
        let generic = match feature {
            PromptFeature::CommentsGeneration { pass, .. }
            | PromptFeature::CustomAgentCommentsGeneration { pass } => Some(format!("comments_generation_pass_{pass}")),
            _ => None,
        };
        self.templates
            .get(&format!("{id}@{model}"))
            .or_else(|| self.templates.get(&id))
            .or_else(|| generic.and_then(|g| self.templates.get(&g)))
    }
}

impl PromptRenderer for TemplatePromptRenderer {
    fn render(
        &self,
        feature: &PromptFeature,
        model: &str,
        variables: &PromptVariables,
    ) -> Result<RenderedMessages, PromptError> {
        let template = self.lookup(feature, model).ok_or_else(|| PromptError::MissingTemplate {
            feature: feature.id(),
            model: model.to_string(),
        })?;
        Ok(RenderedMessages {
            system: substitute(&template.system, variables),
            user: substitute(&template.user, variables),
            disable_tools: template.disable_tools,
        })
    }
}

/// Replace `${NAME}` with the variable's value.
pub fn substitute(template: &str, variables: &PromptVariables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

const COMMENTER_SYSTEM: &str = "You are a senior software engineer acting as the ${AGENT_NAME} reviewer of a pull request. \
Use the available tools to read code outside the diff when you need more context. \
When done, call parse_final_response exactly once with your comments. \
Every comment must use the bucket ${BUCKET}.";

const COMMENTER_PASS_1: &str = "Objective:\n${AGENT_OBJECTIVE}\n\n${CUSTOM_PROMPT}\n\n\
Pull request title: ${PULL_REQUEST_TITLE}\n\
Pull request description:\n${PULL_REQUEST_DESCRIPTION}\n\n\
User story:\n${USER_STORY}\n\n\
Diff (lines prefixed with <+N> are line N of the new file, <-N> of the old file):\n${PULL_REQUEST_DIFF}";

const COMMENTER_PASS_2: &str = "Objective:\n${AGENT_OBJECTIVE}\n\n${CUSTOM_PROMPT}\n\n\
A junior developer reviewed this pull request and left the comments below. \
Verify each one against the code, drop the wrong ones, fix imprecise ones and add anything they missed.\n\n\
Comments:\n${REVIEW_COMMENTS_BY_JUNIOR_DEVELOPER}\n\n\
Pull request title: ${PULL_REQUEST_TITLE}\n\n\
Diff:\n${PULL_REQUEST_DIFF}";

const SUMMARY_SYSTEM: &str = "You write concise pull request summaries for reviewers. \
Call parse_final_response with {\"summary\": <markdown>} when done.";

const SUMMARY_USER: &str = "Title: ${PULL_REQUEST_TITLE}\n\nDescription:\n${PULL_REQUEST_DESCRIPTION}\n\n\
Diff:\n${PR_DIFF_WITHOUT_LINE_NUMBER}";

const VALIDATION_SYSTEM: &str = "You validate code review comments. Keep only comments that are correct and point at the right line. \
Call parse_final_response with the comments that survive.";

const VALIDATION_USER: &str = "Comments:\n${COMMENTS}\n\nDiff:\n${PULL_REQUEST_DIFF}";

const SUMMARIZATION_SYSTEM: &str = "You merge review comments that point at the same line into one comment each. \
Call parse_final_response with {\"comments\": [...]} when done.";

const SUMMARIZATION_USER: &str = "Comments:\n${COMMENTS}";

#[cfg(test)]
mod tests {
    use super::*;
    use reviewloop_core::agent::AgentType;

    fn security(pass: u8) -> PromptFeature {
        PromptFeature::CommentsGeneration {
            agent: AgentType::Security,
            pass,
        }
    }

    #[test]
    fn substitutes_known_and_keeps_unknown_placeholders() {
        let vars = PromptVariables::new().with("NAME", "world");
        assert_eq!(substitute("hello ${NAME} ${OTHER} ${", &vars), "hello world ${OTHER} ${");
    }

    #[test]
    fn generic_commenter_template_is_used_for_every_commenter() {
        let renderer = TemplatePromptRenderer::with_defaults();
        let vars = PromptVariables::new()
            .with(PromptVariables::AGENT_NAME, "security")
            .with(PromptVariables::PULL_REQUEST_DIFF, "<+1> +let x = 1;");
        let rendered = renderer.render(&security(1), "gpt-4.1", &vars).unwrap();
        assert!(rendered.system.contains("security reviewer"));
        assert!(rendered.user.contains("<+1> +let x = 1;"));
        assert!(!rendered.disable_tools);

        let custom = PromptFeature::CustomAgentCommentsGeneration { pass: 2 };
        let rendered = renderer.render(&custom, "gpt-4.1", &vars).unwrap();
        assert!(rendered.user.contains("junior developer"));
    }

    #[test]
    fn model_specific_override_wins() {
        let mut renderer = TemplatePromptRenderer::with_defaults();
        renderer.register(
            "security_comments_generation_pass_1@gpt-4o",
            PromptTemplate::new("override", "${PULL_REQUEST_TITLE}").without_tools(),
        );
        let vars = PromptVariables::new().with(PromptVariables::PULL_REQUEST_TITLE, "T");
        let rendered = renderer.render(&security(1), "gpt-4o", &vars).unwrap();
        assert_eq!(rendered.system, "override");
        assert_eq!(rendered.user, "T");
        assert!(rendered.disable_tools);
    }

    #[test]
    fn missing_template_is_an_error() {
        let renderer = TemplatePromptRenderer::new();
        let err = renderer
            .render(&PromptFeature::PrSummary, "gpt-4o", &PromptVariables::new())
            .unwrap_err();
        assert!(matches!(err, PromptError::MissingTemplate { .. }));
    }
}
