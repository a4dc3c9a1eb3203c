//! Domain event system: lets observers follow a review without coupling to
//! the engine.
//!
//! Events are published as agents start, call the model, execute tools and
//! finish. Subscribers filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::AgentType;

/// All domain events in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReviewEvent {
    AgentStarted {
        agent: String,
        agent_type: AgentType,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// The guard stopped an agent before a model call.
    TokenBudgetExceeded {
        agent: String,
        pass: usize,
        tokens: u64,
        ceiling: u64,
        timestamp: DateTime<Utc>,
    },

    ModelCalled {
        agent: String,
        pass: usize,
        round: u32,
        input_tokens: u64,
        output_tokens: u64,
        timestamp: DateTime<Utc>,
    },

    ToolExecuted {
        agent: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    AgentFinished {
        agent: String,
        prompt_tokens_exceeded: bool,
        comments: usize,
        timestamp: DateTime<Utc>,
    },

    AgentFailed {
        agent: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for review events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<ReviewEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ReviewEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ReviewEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ReviewEvent::ToolExecuted {
            agent: "security".into(),
            tool_name: "grep_search".into(),
            success: true,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            ReviewEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "grep_search");
                assert!(success);
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(ReviewEvent::AgentFailed {
            agent: "error".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
