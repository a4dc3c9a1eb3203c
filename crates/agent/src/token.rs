//! Token estimation and the per-model budget guard.
//!
//! The default tokenizer uses a character heuristic: ~4 characters per
//! token, rounded up. It is deterministic, which keeps budget decisions
//! reproducible; swap in a real tokenizer through [`Tokenizer`].

use reviewloop_core::agent::{PassTokens, TokenKind};
use reviewloop_core::prompt::RenderedMessages;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use reviewloop_config::DEFAULT_INPUT_TOKENS_LIMIT;

pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> u64;
}

/// 1 token ≈ 4 characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> u64 {
        estimate_tokens(text)
    }
}

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    (text.len() as u64).div_ceil(4)
}

/// Input-token ceilings keyed by model name.
#[derive(Debug, Clone)]
pub struct ModelCeilings {
    ceilings: BTreeMap<String, u64>,
    fallback: u64,
}

impl ModelCeilings {
    pub fn new(ceilings: BTreeMap<String, u64>) -> Self {
        Self {
            ceilings,
            fallback: DEFAULT_INPUT_TOKENS_LIMIT,
        }
    }

    pub fn with_fallback(mut self, fallback: u64) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn ceiling_for(&self, model: &str) -> u64 {
        match self.ceilings.get(model) {
            Some(limit) => *limit,
            None => {
                tracing::warn!(model = %model, fallback = self.fallback, "No token ceiling configured for model, using fallback");
                self.fallback
            }
        }
    }
}

/// Outcome of a budget check for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetVerdict {
    /// Counts per kind, extras included.
    pub tokens: PassTokens,
    /// System + user tokens, the figure compared to the ceiling.
    pub total: u64,
    pub ceiling: u64,
    pub exceeded: bool,
}

#[derive(Clone)]
pub struct TokenBudgetGuard {
    tokenizer: Arc<dyn Tokenizer>,
    ceilings: Arc<ModelCeilings>,
}

impl TokenBudgetGuard {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, ceilings: ModelCeilings) -> Self {
        Self {
            tokenizer,
            ceilings: Arc::new(ceilings),
        }
    }

    pub fn heuristic(ceilings: ModelCeilings) -> Self {
        Self::new(Arc::new(HeuristicTokenizer), ceilings)
    }

    pub fn count(&self, text: &str) -> u64 {
        self.tokenizer.count(text)
    }

    pub fn ceiling_for(&self, model: &str) -> u64 {
        self.ceilings.ceiling_for(model)
    }

    /// Check `messages` against the ceiling configured for `model`.
    pub fn evaluate(&self, messages: &RenderedMessages, extras: &[(TokenKind, u64)], model: &str) -> BudgetVerdict {
        self.evaluate_against(messages, extras, self.ceiling_for(model))
    }

    /// Check `messages` against an explicit ceiling. `exceeded` iff
    /// system + user tokens > ceiling.
    pub fn evaluate_against(&self, messages: &RenderedMessages, extras: &[(TokenKind, u64)], ceiling: u64) -> BudgetVerdict {
        let system = self.count(&messages.system);
        let user = self.count(&messages.user);
        let mut tokens = PassTokens::new();
        tokens.insert(TokenKind::SystemPrompt, system);
        tokens.insert(TokenKind::UserPrompt, user);
        for (kind, count) in extras {
            *tokens.entry(*kind).or_default() += count;
        }
        let total = system + user;
        BudgetVerdict {
            tokens,
            total,
            ceiling,
            exceeded: total > ceiling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(system: &str, user: &str) -> RenderedMessages {
        RenderedMessages {
            system: system.into(),
            user: user.into(),
            disable_tools: false,
        }
    }

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn unknown_model_uses_fallback() {
        let ceilings = ModelCeilings::new(BTreeMap::from([("gpt-4o".to_string(), 128_000)]));
        assert_eq!(ceilings.ceiling_for("gpt-4o"), 128_000);
        assert_eq!(ceilings.ceiling_for("mystery"), 100_000);
        assert_eq!(ceilings.with_fallback(10).ceiling_for("mystery"), 10);
    }

    #[test]
    fn over_ceiling_is_exceeded() {
        let guard = TokenBudgetGuard::heuristic(ModelCeilings::new(BTreeMap::new()));
        // 36_000 chars -> 9_000 tokens
        let v = guard.evaluate_against(&messages(&"s".repeat(4_000), &"u".repeat(32_000)), &[], 8_000);
        assert_eq!(v.total, 9_000);
        assert!(v.exceeded);
    }

    #[test]
    fn at_ceiling_is_allowed_and_extras_are_recorded_only() {
        let guard = TokenBudgetGuard::heuristic(ModelCeilings::new(BTreeMap::new()));
        let v = guard.evaluate_against(
            &messages("abcd", "abcdefgh"),
            &[(TokenKind::PrDiffTokens, 500)],
            3,
        );
        assert_eq!(v.total, 3);
        assert!(!v.exceeded);
        assert_eq!(v.tokens[&TokenKind::SystemPrompt], 1);
        assert_eq!(v.tokens[&TokenKind::UserPrompt], 2);
        assert_eq!(v.tokens[&TokenKind::PrDiffTokens], 500);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let guard = TokenBudgetGuard::heuristic(ModelCeilings::new(BTreeMap::new()));
        let m = messages("system prompt", "user prompt with diff");
        assert_eq!(guard.evaluate(&m, &[], "x"), guard.evaluate(&m, &[], "x"));
    }
}
