//! [`AgentRegistry`] – maps application names to their [`AppAgent`].
//!
//! Adding support for a new application means registering another
//! [`AppAgent`] implementation; the orchestrator never branches on
//! application names itself.

use std::collections::HashMap;
use std::sync::Arc;

use sara_types::SubAction;
use tracing::warn;

use crate::agent::{AppAgent, NotepadAgent, SettleDelays};
use crate::input::InputDevice;

/// Result of handing a plan's steps to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// A handler ran and performed every step.
    Completed,
    /// A handler ran but skipped or failed at least one step.
    Incomplete,
    /// No handler is registered for the application; nothing was done.
    NoHandler,
}

/// Central application-handler registry.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Box<dyn AppAgent>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in agent.
    pub fn with_builtin_agents(input: Arc<dyn InputDevice>, delays: SettleDelays) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(NotepadAgent::new(input, delays)));
        registry
    }

    /// Register an agent under its own [`AppAgent::application`] name.  Any
    /// previously registered agent with the same name is replaced.
    pub fn register(&mut self, agent: Box<dyn AppAgent>) {
        self.agents
            .insert(agent.application().to_lowercase(), agent);
    }

    /// `true` if an agent answers to `application` (case-insensitive).
    pub fn supports(&self, application: &str) -> bool {
        self.agents.contains_key(&application.to_lowercase())
    }

    /// Run `sub_actions` through the agent for `application`.
    pub fn execute(&self, application: &str, sub_actions: &[SubAction]) -> Execution {
        match self.agents.get(&application.to_lowercase()) {
            Some(agent) => {
                if agent.handle(sub_actions) {
                    Execution::Completed
                } else {
                    Execution::Incomplete
                }
            }
            None => {
                warn!(application, "no handler registered for application");
                Execution::NoHandler
            }
        }
    }
}
