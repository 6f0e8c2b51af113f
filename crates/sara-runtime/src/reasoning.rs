//! The reasoning seam: intent classification, automation planning, fact
//! extraction and free-text generation.
//!
//! [`ReasoningService`] is the only boundary between the deterministic
//! orchestrator and the language model.  [`LlmReasoner`] implements it over
//! an [`LlmDriver`]; tests substitute a scripted stub.
//!
//! Each operation has a fixed failure policy:
//!
//! | operation       | on model failure / garbage         |
//! |-----------------|------------------------------------|
//! | `classify`      | [`Intent::Conversation`]           |
//! | `generate_plan` | [`PlanError`] with the configured message |
//! | `extract_facts` | empty document                     |
//! | `generate_text` | [`SaraError::LlmInferenceFailed`]  |

use std::collections::BTreeMap;

use async_trait::async_trait;
use sara_memory::facts::snake_case_key;
use sara_types::{AutomationPlan, FactDocument, Intent, SaraError};
use schemars::schema_for;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_driver::{ChatMessage, LlmDriver};

/// Response used when no valid plan could be produced.
pub const DEFAULT_PLAN_ERROR: &str = "Failed to create a valid automation plan.";

/// Terminal failure of plan generation.  `Display` is the message alone so it
/// can be shown to the user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PlanError {
    pub message: String,
}

impl PlanError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Language-model-backed reasoning used by the orchestrator.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Classify `command`.  `context` holds recalled memories.  Never fails.
    async fn classify(&self, command: &str, context: &[String]) -> Intent;

    /// Produce a validated plan for `command`, using the user's facts as
    /// context.
    async fn generate_plan(
        &self,
        command: &str,
        facts: &FactDocument,
    ) -> Result<AutomationPlan, PlanError>;

    /// Best-effort extraction of details about the user and about named
    /// contacts.  Empty on any failure.
    async fn extract_facts(&self, command: &str) -> FactDocument;

    /// Free-text completion of `prompt`.
    async fn generate_text(&self, prompt: &str) -> Result<String, SaraError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Reply parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Map a classifier reply to an [`Intent`].
///
/// The reply is lower-cased and spaces/hyphens are folded to underscores.
/// Exactly one label must appear; none or several is ambiguous and resolves
/// to [`Intent::Conversation`].
pub fn parse_intent(reply: &str) -> Intent {
    let normalised: String = reply
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    let mut found = Intent::ALL
        .into_iter()
        .filter(|intent| normalised.contains(intent.label()));
    match (found.next(), found.next()) {
        (Some(intent), None) => intent,
        _ => Intent::Conversation,
    }
}

/// Strip a surrounding Markdown code fence (```` ```json ... ``` ````) and,
/// failing that, cut to the outermost `{ ... }`.
fn extract_json_object(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string ("json") on the opening line.
        s = rest.split_once('\n').map_or("", |(_, body)| body);
        s = s.trim_end().trim_end_matches("```").trim();
    }
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => &s[start..=end],
        _ => s,
    }
}

/// Parse and validate a planner reply.  The error describes what was wrong,
/// for logs.
pub fn parse_plan(raw: &str) -> Result<AutomationPlan, String> {
    let json = extract_json_object(raw);
    let plan: AutomationPlan =
        serde_json::from_str(json).map_err(|e| format!("plan is not valid JSON: {e}"))?;
    if plan.application.trim().is_empty() {
        return Err("plan names no application".to_string());
    }
    Ok(plan)
}

/// Scalars are stringified; nulls, arrays, nested objects, empty values and
/// keys with nothing usable are dropped.
fn scalar_pairs(map: Map<String, Value>) -> BTreeMap<String, String> {
    map.into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            let key = snake_case_key(&key);
            (!key.is_empty() && !value.is_empty()).then_some((key, value))
        })
        .collect()
}

/// Parse an extractor reply.
///
/// The expected shape is
/// `{"user_details": {...}, "contacts": {"Alice": {...}}}`.  A flat object
/// without either group is read as user details alone.
pub fn parse_facts(raw: &str) -> FactDocument {
    let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(extract_json_object(raw)) else {
        return FactDocument::default();
    };
    if !map.contains_key("user_details") && !map.contains_key("contacts") {
        return FactDocument {
            user_details: scalar_pairs(map),
            contacts: BTreeMap::new(),
        };
    }

    let user_details = match map.remove("user_details") {
        Some(Value::Object(details)) => scalar_pairs(details),
        _ => BTreeMap::new(),
    };
    let contacts = match map.remove("contacts") {
        Some(Value::Object(people)) => people
            .into_iter()
            .filter_map(|(name, details)| {
                let Value::Object(details) = details else {
                    return None;
                };
                let name = name.trim().to_string();
                let details = scalar_pairs(details);
                (!name.is_empty() && !details.is_empty()).then_some((name, details))
            })
            .collect(),
        _ => BTreeMap::new(),
    };
    FactDocument {
        user_details,
        contacts,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompts
// ─────────────────────────────────────────────────────────────────────────────

const CLASSIFIER_PROMPT: &str = "\
You are an intent router. Classify the user's command into ONE of the following four categories:
'automation', 'screen_read', 'conversation', or 'remember'.

- 'automation': Controlling an application like opening files, typing text, or saving.
- 'screen_read': Seeing, capturing, reading, or analyzing the screen's content.
- 'remember': The user explicitly asks the assistant to remember a piece of information for later.
- 'conversation': All other general questions, greetings, or chat.

Examples:
- \"open notepad and write a new story\" -> automation
- \"what is on my screen right now?\" -> screen_read
- \"Remember that my project deadline is October 25th\" -> remember
- \"what is the capital of india?\" -> conversation

Answer with the category name only.";

const PLANNER_PROMPT: &str = "\
You are an automation planner. Convert the user's request into a JSON object with the keys
\"application\", \"action\" and \"sub_actions\".
- \"application\": the application to use (e.g. \"notepad\").
- \"action\": a brief description of the overall goal.
- \"sub_actions\": ordered steps, each one of
  {\"type\": \"type_text\", \"text\": ...},
  {\"type\": \"save_file\", \"filename\": ...},
  {\"type\": \"press_key\", \"key\": ...},
  {\"type\": \"hotkey\", \"keys\": [...]}.

Example: 'in notepad, write \"hello\" and save it as my_file.txt'
{\"application\": \"notepad\", \"action\": \"create and save a file\", \"sub_actions\": [
  {\"type\": \"type_text\", \"text\": \"hello\"},
  {\"type\": \"save_file\", \"filename\": \"my_file.txt\"}]}

Respond with ONLY the JSON object.";

const EXTRACTOR_PROMPT: &str = "\
Extract the facts the user wants remembered as a JSON object with two groups:
- \"user_details\": snake_case keys to string values about the user.
- \"contacts\": a person's name to an object of snake_case keys and string values about them.

Example: \"Remember my deadline is October 25th and Alice's email is alice@example.com\"
{\"user_details\": {\"project_deadline\": \"October 25th\"}, \"contacts\": {\"Alice\": {\"email\": \"alice@example.com\"}}}

If there is nothing to remember, return {}. Respond with ONLY the JSON object.";

fn context_block(context: &[String]) -> String {
    if context.is_empty() {
        "Relevant context from memory: (none)".to_string()
    } else {
        format!("Relevant context from memory:\n- {}", context.join("\n- "))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmReasoner
// ─────────────────────────────────────────────────────────────────────────────

/// [`ReasoningService`] backed by an OpenAI-compatible model.
pub struct LlmReasoner {
    driver: LlmDriver,
    plan_error_message: String,
}

impl LlmReasoner {
    pub fn new(driver: LlmDriver) -> Self {
        Self {
            driver,
            plan_error_message: DEFAULT_PLAN_ERROR.to_string(),
        }
    }

    /// Override the message returned for unusable plans.
    pub fn with_plan_error_message(mut self, message: impl Into<String>) -> Self {
        self.plan_error_message = message.into();
        self
    }
}

#[async_trait]
impl ReasoningService for LlmReasoner {
    async fn classify(&self, command: &str, context: &[String]) -> Intent {
        let messages = [
            ChatMessage::system(CLASSIFIER_PROMPT),
            ChatMessage::user(format!(
                "{}\n\nUser command: \"{command}\"",
                context_block(context)
            )),
        ];
        match self.driver.complete(&messages).await {
            Ok(reply) => {
                let intent = parse_intent(&reply);
                debug!(reply = %reply.trim(), intent = %intent, "classifier replied");
                intent
            }
            Err(e) => {
                warn!(error = %e, "intent classification failed; defaulting to conversation");
                Intent::Conversation
            }
        }
    }

    async fn generate_plan(
        &self,
        command: &str,
        facts: &FactDocument,
    ) -> Result<AutomationPlan, PlanError> {
        let facts_json = serde_json::to_string(facts).unwrap_or_else(|_| "{}".to_string());
        let messages = [
            ChatMessage::system(PLANNER_PROMPT),
            ChatMessage::user(format!(
                "Known facts about the user: {facts_json}\n\nUser command: \"{command}\""
            )),
        ];
        let schema = serde_json::to_value(schema_for!(AutomationPlan)).unwrap_or(Value::Null);
        let reply = self
            .driver
            .complete_structured(&messages, schema)
            .await
            .map_err(|e| {
                warn!(error = %e, "planner request failed");
                PlanError::new(&self.plan_error_message)
            })?;
        parse_plan(&reply).map_err(|reason| {
            warn!(reason = %reason, reply = %reply.trim(), "planner returned an unusable plan");
            PlanError::new(&self.plan_error_message)
        })
    }

    async fn extract_facts(&self, command: &str) -> FactDocument {
        let messages = [
            ChatMessage::system(EXTRACTOR_PROMPT),
            ChatMessage::user(command),
        ];
        match self.driver.complete(&messages).await {
            Ok(reply) => parse_facts(&reply),
            Err(e) => {
                warn!(error = %e, "fact extraction failed");
                FactDocument::default()
            }
        }
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, SaraError> {
        self.driver
            .complete(&[ChatMessage::user(prompt)])
            .await
            .map_err(|e| SaraError::LlmInferenceFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sara_types::SubAction;
    use std::time::Duration;

    #[test]
    fn single_label_is_taken() {
        assert_eq!(parse_intent("automation"), Intent::Automation);
        assert_eq!(parse_intent("  Screen_Read.\n"), Intent::ScreenRead);
        assert_eq!(parse_intent("screen read"), Intent::ScreenRead);
        assert_eq!(parse_intent("'remember'"), Intent::Remember);
        assert_eq!(parse_intent("conversation"), Intent::Conversation);
    }

    #[test]
    fn garbage_or_ambiguity_falls_back_to_conversation() {
        assert_eq!(parse_intent(""), Intent::Conversation);
        assert_eq!(parse_intent("I am not sure"), Intent::Conversation);
        assert_eq!(parse_intent("automation or remember"), Intent::Conversation);
    }

    #[test]
    fn fenced_plan_is_parsed() {
        let raw = "```json\n{\"application\": \"notepad\", \"action\": \"write\", \"sub_actions\": [{\"type\": \"type_text\", \"text\": \"hello\"}]}\n```";
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.application, "notepad");
        assert_eq!(plan.sub_actions, vec![SubAction::TypeText { text: "hello".into() }]);
    }

    #[test]
    fn plan_with_leading_chatter_is_parsed() {
        let raw = "Sure! Here is the plan: {\"application\": \"notepad\"} Hope it helps.";
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.application, "notepad");
        assert!(plan.sub_actions.is_empty());
    }

    #[test]
    fn unusable_plans_are_rejected() {
        assert!(parse_plan("I cannot do that").is_err());
        assert!(parse_plan("{\"action\": \"x\"}").is_err());
        assert!(parse_plan("{\"application\": \"  \"}").is_err());
        assert!(parse_plan("{\"application\": \"notepad\", \"sub_actions\": \"nope\"}").is_err());
    }

    #[test]
    fn flat_facts_are_user_details() {
        let facts = parse_facts(
            "```json\n{\"Project Deadline\": \"Friday\", \"age\": 42, \"tags\": [\"a\"], \"empty\": \"\"}\n```",
        );
        assert_eq!(facts.user_details.len(), 2);
        assert_eq!(facts.user_details["project_deadline"], "Friday");
        assert_eq!(facts.user_details["age"], "42");
        assert!(facts.contacts.is_empty());
    }

    #[test]
    fn grouped_facts_carry_contacts() {
        let facts = parse_facts(
            r#"{"user_details": {"City": "Paris"},
                "contacts": {" Alice ": {"Email": "a@b.c"}, "Bob": {}, "Eve": "nope"}}"#,
        );
        assert_eq!(facts.user_details["city"], "Paris");
        assert_eq!(facts.contacts.len(), 1);
        assert_eq!(facts.contacts["Alice"]["email"], "a@b.c");
    }

    #[test]
    fn contacts_alone_are_enough() {
        let facts = parse_facts(r#"{"contacts": {"Alice": {"phone": 5550100}}}"#);
        assert!(facts.user_details.is_empty());
        assert_eq!(facts.contacts["Alice"]["phone"], "5550100");
    }

    #[test]
    fn unparseable_facts_are_empty() {
        assert!(parse_facts("nothing here").is_empty());
        assert!(parse_facts("[1, 2]").is_empty());
        assert!(parse_facts("{}").is_empty());
    }

    #[test]
    fn plan_error_displays_message_only() {
        assert_eq!(PlanError::new(DEFAULT_PLAN_ERROR).to_string(), DEFAULT_PLAN_ERROR);
    }

    fn offline_reasoner() -> LlmReasoner {
        LlmReasoner::new(LlmDriver::new("http://127.0.0.1:1", "llama3").with_timeout(Duration::from_secs(2)))
    }

    #[tokio::test]
    async fn unreachable_model_uses_safe_defaults() {
        let reasoner = offline_reasoner().with_plan_error_message("no plan");
        assert_eq!(reasoner.classify("open notepad", &[]).await, Intent::Conversation);
        assert!(reasoner.extract_facts("remember x").await.is_empty());
        assert_eq!(
            reasoner
                .generate_plan("open notepad", &FactDocument::default())
                .await
                .unwrap_err()
                .to_string(),
            "no plan"
        );
        assert!(matches!(
            reasoner.generate_text("hi").await,
            Err(SaraError::LlmInferenceFailed(_))
        ));
    }
}
