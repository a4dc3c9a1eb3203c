//! The agent execution engine.
//!
//! Drives automated reviewers through a bounded sequence of model calls and
//! tool invocations:
//!
//! 1. **Catalog**: [`AgentFactory`] builds the ordered agent list from settings
//! 2. **Guard**: every pass is checked against the model's token ceiling
//! 3. **Loop**: [`IterationController`] runs model ⇄ tool round-trips until a
//!    final answer, no tool, or the iteration ceiling
//! 4. **Reflect**: two-pass agents feed pass 1's comments into pass 2
//! 5. **Aggregate**: [`ReviewRunner`] runs agents concurrently and collects a
//!    [`ReviewReport`], isolating failures per agent

pub mod context;
pub mod dispatcher;
pub mod factory;
pub mod iteration;
pub mod prompt;
pub mod review_agent;
pub mod runner;
pub mod services;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ReviewContext, number_diff_lines};
pub use dispatcher::ToolDispatcher;
pub use factory::{AgentBlueprint, AgentFactory};
pub use iteration::{EmptyReason, IterationController, IterationOutcome, PassScope, ResultFormat, Terminal};
pub use prompt::{PromptTemplate, TemplatePromptRenderer};
pub use review_agent::ReviewAgent;
pub use runner::{AgentFailure, PipelineReport, ReviewReport, ReviewRunner};
pub use services::EngineServices;
pub use token::{BudgetVerdict, HeuristicTokenizer, ModelCeilings, TokenBudgetGuard, Tokenizer, estimate_tokens};
