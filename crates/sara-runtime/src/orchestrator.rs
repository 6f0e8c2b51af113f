//! [`Orchestrator`] – the command-processing state machine.
//!
//! Every command moves through
//! `Received → Recalling → Classifying → {Conversing | Reading | Remembering | Automating} → Responded`.
//!
//! 1. **Recall** – the `recall_k` most relevant memories are fetched from the
//!    [`KnowledgeStore`].  This always finishes before classification, which
//!    sees the recalled text.
//! 2. **Classify** – the [`ReasoningService`] tags the command with an
//!    [`Intent`].
//! 3. **Dispatch**
//!    - *conversation* – memories + command are sent to `generate_text`.
//!    - *screen_read* – the screen text, cut to `screen_text_limit` chars, is
//!      summarised with the memories as context.
//!    - *remember* – extracted user details and contact details are merged
//!      into the fact store and one memory entry records what was stored.
//!    - *automation* – a plan is generated with the fact document as context.
//!      A plan error is returned synchronously; a valid plan is handed to one
//!      detached background task and the caller gets an acknowledgment.
//!
//! # Background automation
//!
//! The task launches and focuses the application, waits `post_launch_delay`,
//! and runs the plan's steps through the [`AgentRegistry`].  A launch failure
//! or missing handler halts it without touching memory; otherwise one memory
//! entry describes what was done.  Outcomes are visible only in logs (each
//! task runs in an `automation` span carrying `task_id` and `application`)
//! and through later recall of that entry.
//!
//! The waits inside launch and execution are fixed delays, not readiness
//! checks, so a heavily loaded desktop can still outrun them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sara_desktop::{AgentRegistry, AppLauncher, Execution};
use sara_memory::KnowledgeStore;
use sara_perception::ScreenReader;
use sara_types::{AutomationPlan, CommandResponse, Intent, SaraError};
use tracing::{Instrument, Span, error, info, info_span, warn};
use uuid::Uuid;

use crate::reasoning::ReasoningService;
use crate::tasks::BackgroundTasks;

/// Response when extraction finds nothing to store.
pub const NOTHING_TO_REMEMBER: &str = "I couldn't find any specific facts to remember.";

/// Response to a successfully dispatched automation request.
pub const DEFAULT_ACKNOWLEDGMENT: &str = "Acknowledged, Master. Starting your task.";

/// Memory source tag for facts learned through `remember`.
const SOURCE_REMEMBER: &str = "remember";
/// Memory source tag for completed automation tasks.
const SOURCE_AUTOMATION: &str = "automation";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Memories recalled per command.
    pub recall_k: usize,
    /// Maximum characters of screen text placed in a prompt.
    pub screen_text_limit: usize,
    /// Pause between a successful launch and the first step.
    pub post_launch_delay: Duration,
    /// Text of the `async` acknowledgment.
    pub acknowledgment: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            recall_k: 2,
            screen_text_limit: 2000,
            post_launch_delay: Duration::from_secs(1),
            acknowledgment: DEFAULT_ACKNOWLEDGMENT.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompts
// ─────────────────────────────────────────────────────────────────────────────

fn memory_context(memories: &[String]) -> String {
    if memories.is_empty() {
        "Relevant context from my memory: (nothing relevant)".to_string()
    } else {
        format!("Relevant context from my memory:\n- {}", memories.join("\n- "))
    }
}

fn conversation_prompt(memories: &[String], command: &str) -> String {
    format!(
        "{}\n\nPlease provide a helpful and conversational response to the following user command: \"{command}\"",
        memory_context(memories)
    )
}

fn screen_prompt(memories: &[String], screen_text: &str) -> String {
    format!(
        "{}\n\nAnd the following text I found on the screen: \"{screen_text}\"\n\nPlease provide a helpful summary and suggest a next action.",
        memory_context(memories)
    )
}

fn join_keys(pairs: &BTreeMap<String, String>) -> String {
    pairs.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// First `limit` characters of `text`, on a char boundary.
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Routes commands to their handlers.  All collaborators are injected at
/// construction.
pub struct Orchestrator {
    knowledge: Arc<KnowledgeStore>,
    reasoner: Arc<dyn ReasoningService>,
    screen: Arc<dyn ScreenReader>,
    launcher: Arc<dyn AppLauncher>,
    agents: Arc<AgentRegistry>,
    tasks: BackgroundTasks,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        knowledge: Arc<KnowledgeStore>,
        reasoner: Arc<dyn ReasoningService>,
        screen: Arc<dyn ScreenReader>,
        launcher: Arc<dyn AppLauncher>,
        agents: Arc<AgentRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            knowledge,
            reasoner,
            screen,
            launcher,
            agents,
            tasks: BackgroundTasks::new(),
            config,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    /// Background automation tasks started by this orchestrator.
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Handle one command.
    ///
    /// # Errors
    ///
    /// Only [`SaraError::EmptyCommand`], for blank input.  Every other failure
    /// becomes a `sync` response or a log entry.
    pub async fn process_command(&self, command: &str) -> Result<CommandResponse, SaraError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(SaraError::EmptyCommand);
        }
        info!(command, "processing command");

        let memories = self
            .knowledge
            .recall_memories(command, self.config.recall_k)
            .await;
        info!(recalled = memories.len(), "memories recalled");

        let intent = self.reasoner.classify(command, &memories).await;
        info!(intent = %intent, "intent classified");

        let response = match intent {
            Intent::Conversation => self.converse(command, &memories).await,
            Intent::ScreenRead => self.read_screen(&memories).await,
            Intent::Remember => self.remember(command).await,
            Intent::Automation => self.automate(command).await,
        };
        Ok(response)
    }

    async fn converse(&self, command: &str, memories: &[String]) -> CommandResponse {
        let prompt = conversation_prompt(memories, command);
        match self.reasoner.generate_text(&prompt).await {
            Ok(text) => CommandResponse::sync(text),
            Err(e) => {
                warn!(error = %e, "conversation generation failed");
                CommandResponse::sync(format!("Sorry, I couldn't come up with a response. {e}"))
            }
        }
    }

    async fn read_screen(&self, memories: &[String]) -> CommandResponse {
        let text = match self.screen.screen_text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "screen capture failed");
                return CommandResponse::sync(format!("I couldn't read the screen. {e}"));
            }
        };

        let prompt = screen_prompt(memories, truncate_chars(&text, self.config.screen_text_limit));
        match self.reasoner.generate_text(&prompt).await {
            Ok(summary) => CommandResponse::sync(summary),
            Err(e) => {
                warn!(error = %e, "screen summary failed");
                CommandResponse::sync(format!("I read the screen but couldn't summarise it. {e}"))
            }
        }
    }

    async fn remember(&self, command: &str) -> CommandResponse {
        let extracted = self.reasoner.extract_facts(command).await;
        if extracted.is_empty() {
            info!("no facts extracted");
            return CommandResponse::sync(NOTHING_TO_REMEMBER);
        }

        // What was persisted, for the reply and the memory entry.
        let mut subjects = Vec::new();
        let mut learned = Vec::new();

        match self.knowledge.update_facts(&extracted.user_details) {
            Ok(written) if !written.is_empty() => {
                subjects.push(format!("your {}", join_keys(&written)));
                learned.extend(written.iter().map(|(k, v)| format!("{k} = {v}")));
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "failed to persist facts");
                return CommandResponse::sync(format!("I couldn't save that right now. {e}"));
            }
        }

        for (name, details) in &extracted.contacts {
            match self.knowledge.update_contact(name, details) {
                Ok(written) if !written.is_empty() => {
                    let name = name.trim();
                    subjects.push(format!("{name}'s {}", join_keys(&written)));
                    learned.extend(written.iter().map(|(k, v)| format!("{name}'s {k} = {v}")));
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, contact = %name, "failed to persist contact");
                    return CommandResponse::sync(format!("I couldn't save that right now. {e}"));
                }
            }
        }

        if learned.is_empty() {
            return CommandResponse::sync(NOTHING_TO_REMEMBER);
        }

        self.knowledge
            .add_memory(
                SOURCE_REMEMBER,
                &format!("User shared facts: {}", learned.join(", ")),
            )
            .await;

        info!(learned = learned.len(), "facts remembered");
        CommandResponse::sync(format!("Got it. I'll remember {}.", subjects.join(" and ")))
    }

    async fn automate(&self, command: &str) -> CommandResponse {
        let facts = self.knowledge.get_facts();
        let plan = match self.reasoner.generate_plan(command, &facts).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "no automation plan");
                return CommandResponse::sync(e.to_string());
            }
        };

        let task_id = Uuid::new_v4();
        info!(
            task_id = %task_id,
            application = %plan.application,
            steps = plan.sub_actions.len(),
            action = %plan.action,
            "automation plan accepted"
        );
        let span = info_span!("automation", task_id = %task_id, application = %plan.application);
        let job = AutomationJob {
            knowledge: self.knowledge.clone(),
            launcher: self.launcher.clone(),
            agents: self.agents.clone(),
            post_launch_delay: self.config.post_launch_delay,
        };
        self.tasks.spawn(job.run(plan).instrument(span));

        CommandResponse::acknowledged(self.config.acknowledgment.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Background task
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one background task needs, owned.
struct AutomationJob {
    knowledge: Arc<KnowledgeStore>,
    launcher: Arc<dyn AppLauncher>,
    agents: Arc<AgentRegistry>,
    post_launch_delay: Duration,
}

impl AutomationJob {
    async fn run(self, plan: AutomationPlan) {
        let AutomationJob {
            knowledge,
            launcher,
            agents,
            post_launch_delay,
        } = self;
        let application = plan.application.clone();
        let span = Span::current();

        // Launching and typing block on processes and fixed sleeps.
        let outcome = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let handle = launcher.launch_and_focus(&plan.application)?;
            info!(pid = handle.pid, window = %handle.window, "application focused");
            std::thread::sleep(post_launch_delay);
            Ok::<_, SaraError>(agents.execute(&plan.application, &plan.sub_actions))
        })
        .await;

        let summary = match outcome {
            Err(e) => {
                error!(error = %e, "automation worker panicked");
                return;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "could not continue automation because app launch/focus failed");
                return;
            }
            Ok(Ok(Execution::NoHandler)) => {
                warn!("no agent for application; automation halted");
                return;
            }
            Ok(Ok(Execution::Completed)) => {
                format!("I successfully performed an action in {application}.")
            }
            Ok(Ok(Execution::Incomplete)) => {
                format!("I tried to perform an action in {application}, but not every step succeeded.")
            }
        };

        knowledge.add_memory(SOURCE_AUTOMATION, &summary).await;
        info!(summary = %summary, "automation finished");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
