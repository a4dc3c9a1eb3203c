//! Composition root: the shared, read-only collaborators every agent run uses.

use reviewloop_config::AppConfig;
use reviewloop_core::event::EventBus;
use reviewloop_core::gateway::{ModelGateway, ToolDefinition};
use reviewloop_core::prompt::PromptRenderer;
use reviewloop_core::tool::{FINAL_ANSWER_TOOL, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;

use crate::dispatcher::ToolDispatcher;
use crate::iteration::IterationController;
use crate::prompt::TemplatePromptRenderer;
use crate::token::{ModelCeilings, TokenBudgetGuard, Tokenizer};

/// Everything an agent needs besides its own descriptor. Built once per
/// process and shared behind an `Arc`; nothing in it is mutated after
/// construction.
pub struct EngineServices {
    pub gateway: Arc<dyn ModelGateway>,
    pub renderer: Arc<dyn PromptRenderer>,
    pub guard: TokenBudgetGuard,
    pub dispatcher: Arc<ToolDispatcher>,
    pub events: EventBus,
    pub max_iterations: u32,
}

impl EngineServices {
    /// Services configured from `config`, with the default template renderer
    /// and the heuristic tokenizer.
    pub fn new(gateway: Arc<dyn ModelGateway>, tools: Arc<ToolRegistry>, config: &AppConfig) -> Self {
        Self {
            gateway,
            renderer: Arc::new(TemplatePromptRenderer::with_defaults()),
            guard: TokenBudgetGuard::heuristic(ModelCeilings::new(config.model_ceilings())),
            dispatcher: Arc::new(ToolDispatcher::new(
                tools,
                Duration::from_secs(config.tools.timeout_secs),
            )),
            events: EventBus::default(),
            max_iterations: config.runtime.max_review_tool_iterations,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>, ceilings: ModelCeilings) -> Self {
        self.guard = TokenBudgetGuard::new(tokenizer, ceilings);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn controller(&self) -> IterationController {
        IterationController::new(self.gateway.clone(), self.dispatcher.clone(), self.max_iterations)
            .with_events(self.events.clone())
    }

    /// Tools attached to a call: the full catalog, or only the final-answer
    /// tool when the prompt disables tools.
    pub fn tool_catalog(&self, disable_tools: bool) -> Vec<ToolDefinition> {
        let registry = self.dispatcher.registry();
        if disable_tools {
            registry.definition(FINAL_ANSWER_TOOL).into_iter().collect()
        } else {
            registry.definitions()
        }
    }
}
