//! `sara-runtime` – the assistant's brain.
//!
//! # Modules
//!
//! - [`orchestrator`] – [`Orchestrator`][orchestrator::Orchestrator]: recalls
//!   memory, classifies each command and dispatches it to the conversation,
//!   screen-read, remember or automation handler.  Automation runs as a
//!   detached background task.
//! - [`reasoning`] – [`ReasoningService`][reasoning::ReasoningService]: the
//!   narrow seam to the language model (classify, plan, extract, generate),
//!   with [`LlmReasoner`][reasoning::LlmReasoner] as the production
//!   implementation and fixed fallbacks for every failure.
//! - [`llm_driver`] – [`LlmDriver`][llm_driver::LlmDriver]: OpenAI-compatible
//!   chat-completions client; plan requests carry the
//!   [`AutomationPlan`][sara_types::AutomationPlan] JSON Schema in
//!   `response_format`.
//! - [`tasks`] – [`BackgroundTasks`][tasks::BackgroundTasks]: detached spawning
//!   with an in-flight count so shutdown can wait for pending memory writes.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber with optional OTLP export.

pub mod llm_driver;
pub mod orchestrator;
pub mod reasoning;
pub mod tasks;
pub mod telemetry;

pub use llm_driver::{ChatMessage, LlmDriver, LlmError, Role};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use reasoning::{LlmReasoner, PlanError, ReasoningService};
pub use tasks::BackgroundTasks;
pub use telemetry::{TracerProviderGuard, init_tracing};
