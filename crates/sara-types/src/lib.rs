//! `sara-types` – shared vocabulary for the SARA assistant.
//!
//! Every crate in the workspace speaks in these types: the classified
//! [`Intent`] of a command, the [`AutomationPlan`] produced for automation
//! requests, the persisted [`FactDocument`], the [`CommandResponse`] handed
//! back to the caller, and the global [`SaraError`].

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The category of a user command, deciding which handler processes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Drive a desktop application through synthetic input.
    Automation,
    /// Read and summarise what is currently on screen.
    ScreenRead,
    /// Store a fact the user explicitly asked to be remembered.
    Remember,
    /// Everything else: questions, greetings, chat.
    Conversation,
}

impl Intent {
    /// All intents, in the order the classifier checks for them.
    pub const ALL: [Intent; 4] = [
        Intent::Automation,
        Intent::ScreenRead,
        Intent::Remember,
        Intent::Conversation,
    ];

    /// The wire label used in prompts and model replies.
    pub fn label(self) -> &'static str {
        match self {
            Intent::Automation => "automation",
            Intent::ScreenRead => "screen_read",
            Intent::Remember => "remember",
            Intent::Conversation => "conversation",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_filename() -> String {
    "untitled.txt".to_string()
}

/// A single declarative step of an [`AutomationPlan`].
///
/// Serialized with an internal `"type"` tag, e.g.
/// `{"type": "type_text", "text": "hello"}`.  Tags this build does not know
/// deserialize to [`SubAction::Unsupported`] so one bad step never rejects a
/// whole plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubAction {
    /// Type literal text into the focused window.
    TypeText { text: String },
    /// Save the current document under `filename`.
    SaveFile {
        #[serde(default = "default_filename")]
        filename: String,
    },
    /// Press and release a single named key (e.g. `"enter"`).
    PressKey { key: String },
    /// Press a key chord (e.g. `["ctrl", "s"]`).
    Hotkey { keys: Vec<String> },
    /// Any step with an unrecognised tag.
    #[serde(other)]
    Unsupported,
}

impl SubAction {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SubAction::TypeText { .. } => "type_text",
            SubAction::SaveFile { .. } => "save_file",
            SubAction::PressKey { .. } => "press_key",
            SubAction::Hotkey { .. } => "hotkey",
            SubAction::Unsupported => "unsupported",
        }
    }
}

/// Structured, machine-generated description of an application-control task.
///
/// Produced once per automation request and consumed once by the background
/// task that executes it.  Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AutomationPlan {
    /// Logical name of the application to drive, e.g. `"notepad"`.
    pub application: String,
    /// Free-text summary of the overall goal.
    #[serde(default)]
    pub action: String,
    /// Ordered steps to perform once the application has focus.
    #[serde(default)]
    pub sub_actions: Vec<SubAction>,
}

/// The persisted fact document.
///
/// `user_details` is a flat snake_case key → value mapping; `contacts` maps a
/// person's name to their own detail mapping.  Both default to empty so a
/// partially written or older file still loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactDocument {
    #[serde(default)]
    pub user_details: BTreeMap<String, String>,
    #[serde(default)]
    pub contacts: BTreeMap<String, BTreeMap<String, String>>,
}

impl FactDocument {
    /// `true` when neither grouping holds anything.
    pub fn is_empty(&self) -> bool {
        self.user_details.is_empty() && self.contacts.is_empty()
    }
}

/// Whether a [`CommandResponse`] is final or only an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// The response text is the final answer.
    Sync,
    /// The response acknowledges a background task; its effects surface only
    /// through the memory store.
    Async,
}

/// What `process_command` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub kind: ResponseKind,
    pub response: String,
}

impl CommandResponse {
    pub fn sync(response: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::Sync,
            response: response.into(),
        }
    }

    pub fn acknowledged(response: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::Async,
            response: response.into(),
        }
    }
}

/// The step of `launch_and_focus` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStep {
    /// Starting the resolved executable.
    Spawn,
    /// Waiting for the process to expose a window within the timeout.
    WaitResponsive,
    /// Looking up the primary window handle.
    AcquireWindow,
    /// Raising the window to the foreground.
    Focus,
}

impl fmt::Display for LaunchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LaunchStep::Spawn => "spawn",
            LaunchStep::WaitResponsive => "wait_responsive",
            LaunchStep::AcquireWindow => "acquire_window",
            LaunchStep::Focus => "focus",
        };
        f.write_str(s)
    }
}

/// Global error type spanning input, launch, perception, storage and model
/// failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaraError {
    #[error("No command provided.")]
    EmptyCommand,

    #[error("Launch of '{application}' failed at {step}: {details}")]
    LaunchFailed {
        application: String,
        step: LaunchStep,
        details: String,
    },

    #[error("Input primitive '{primitive}' failed: {details}")]
    InputFailed { primitive: String, details: String },

    #[error("Screen capture failed: {0}")]
    PerceptionFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("LLM Driver Error: {0}")]
    LlmInferenceFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_labels_match_serde() {
        for intent in Intent::ALL {
            let json = serde_json::to_string(&intent).unwrap();
            assert_eq!(json, format!("\"{}\"", intent.label()));
        }
    }

    #[test]
    fn plan_parses_planner_output() {
        let raw = r#"{
            "application": "notepad",
            "action": "create and save a file",
            "sub_actions": [
                {"type": "type_text", "text": "hello"},
                {"type": "save_file", "filename": "my_file.txt"}
            ]
        }"#;
        let plan: AutomationPlan = serde_json::from_str(raw).unwrap();
        assert_eq!(plan.application, "notepad");
        assert_eq!(
            plan.sub_actions,
            vec![
                SubAction::TypeText {
                    text: "hello".into()
                },
                SubAction::SaveFile {
                    filename: "my_file.txt".into()
                },
            ]
        );
    }

    #[test]
    fn unknown_sub_action_tag_is_unsupported() {
        let raw = r#"{"type": "drag_window", "x": 10}"#;
        let step: SubAction = serde_json::from_str(raw).unwrap();
        assert_eq!(step, SubAction::Unsupported);
    }

    #[test]
    fn save_file_without_filename_defaults() {
        let step: SubAction = serde_json::from_str(r#"{"type": "save_file"}"#).unwrap();
        assert_eq!(
            step,
            SubAction::SaveFile {
                filename: "untitled.txt".into()
            }
        );
    }

    #[test]
    fn plan_without_application_is_rejected() {
        let raw = r#"{"action": "error", "message": "nope"}"#;
        assert!(serde_json::from_str::<AutomationPlan>(raw).is_err());
    }

    #[test]
    fn fact_document_tolerates_missing_groups() {
        let doc: FactDocument = serde_json::from_str(r#"{"user_details": {"name": "Ada"}}"#).unwrap();
        assert_eq!(doc.user_details["name"], "Ada");
        assert!(doc.contacts.is_empty());
    }

    #[test]
    fn response_kind_serializes_lowercase() {
        let resp = CommandResponse::acknowledged("ok");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"async\""));
    }

    #[test]
    fn launch_error_names_the_step() {
        let err = SaraError::LaunchFailed {
            application: "notepad".into(),
            step: LaunchStep::WaitResponsive,
            details: "no window after 10s".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("notepad"));
        assert!(msg.contains("wait_responsive"));
    }
}
