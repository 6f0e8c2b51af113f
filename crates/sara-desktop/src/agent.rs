//! Per-application handlers that turn declarative [`SubAction`]s into
//! [`InputDevice`] primitives.
//!
//! Every wait here is a fixed [`SettleDelays`] sleep; there is no
//! dialog-ready detection, so a slow machine can drop keystrokes into the
//! wrong window.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sara_types::{SaraError, SubAction};
use tracing::{debug, info, warn};

use crate::input::InputDevice;

/// Fixed pauses between primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleDelays {
    /// After typing text, pressing a key, or sending a plan-supplied chord.
    pub after_input: Duration,
    /// After the save chord, before typing the filename into the dialog.
    pub save_dialog: Duration,
    /// After typing the filename, before confirming.
    pub after_filename: Duration,
    /// After confirming the save dialog.
    pub after_confirm: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_input: Duration::from_millis(500),
            save_dialog: Duration::from_secs(1),
            after_filename: Duration::from_millis(500),
            after_confirm: Duration::from_secs(1),
        }
    }
}

impl SettleDelays {
    /// No waiting at all; for tests and simulated input.
    pub fn none() -> Self {
        Self {
            after_input: Duration::ZERO,
            save_dialog: Duration::ZERO,
            after_filename: Duration::ZERO,
            after_confirm: Duration::ZERO,
        }
    }
}

/// A handler that knows how to drive one application.
pub trait AppAgent: Send + Sync {
    /// Lowercase logical name this agent answers to, e.g. `"notepad"`.
    fn application(&self) -> &str;

    /// Perform `sub_actions` in order against the focused application.
    ///
    /// Returns `true` only if every step was performed.  Unsupported steps are
    /// skipped (and make the result `false`); a failing primitive stops the
    /// remaining steps.
    fn handle(&self, sub_actions: &[SubAction]) -> bool;
}

/// Drives a plain-text editor (Notepad on Windows, gedit elsewhere).
pub struct NotepadAgent {
    input: Arc<dyn InputDevice>,
    delays: SettleDelays,
    save_chord: Vec<String>,
}

impl NotepadAgent {
    pub fn new(input: Arc<dyn InputDevice>, delays: SettleDelays) -> Self {
        Self {
            input,
            delays,
            save_chord: vec!["ctrl".to_string(), "s".to_string()],
        }
    }

    fn settle(d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }

    fn chord(&self, keys: &[String]) -> Result<(), SaraError> {
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.input.hotkey(&keys)
    }

    fn perform(&self, step: &SubAction) -> Result<bool, SaraError> {
        match step {
            SubAction::TypeText { text } => {
                self.input.type_text(text)?;
                Self::settle(self.delays.after_input);
            }
            SubAction::SaveFile { filename } => {
                self.chord(&self.save_chord)?;
                Self::settle(self.delays.save_dialog);
                self.input.type_text(filename)?;
                Self::settle(self.delays.after_filename);
                self.input.press_key("enter")?;
                Self::settle(self.delays.after_confirm);
            }
            SubAction::PressKey { key } => {
                self.input.press_key(key)?;
                Self::settle(self.delays.after_input);
            }
            SubAction::Hotkey { keys } => {
                self.chord(keys)?;
                Self::settle(self.delays.after_input);
            }
            SubAction::Unsupported => {
                warn!(application = self.application(), "skipping unsupported sub-action");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl AppAgent for NotepadAgent {
    fn application(&self) -> &str {
        "notepad"
    }

    fn handle(&self, sub_actions: &[SubAction]) -> bool {
        info!(steps = sub_actions.len(), "notepad agent received sub-actions");
        let mut all_done = true;
        for (index, step) in sub_actions.iter().enumerate() {
            debug!(index, kind = step.kind(), "performing sub-action");
            match self.perform(step) {
                Ok(done) => all_done &= done,
                Err(e) => {
                    warn!(index, kind = step.kind(), error = %e, "sub-action failed; stopping");
                    return false;
                }
            }
        }
        all_done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{InputEvent, RecordingInput};

    fn agent(input: &Arc<RecordingInput>) -> NotepadAgent {
        NotepadAgent::new(input.clone(), SettleDelays::none())
    }

    #[test]
    fn type_then_save_issues_primitives_in_order() {
        let input = Arc::new(RecordingInput::new());
        let ok = agent(&input).handle(&[
            SubAction::TypeText {
                text: "hello".into(),
            },
            SubAction::SaveFile {
                filename: "x.txt".into(),
            },
        ]);
        assert!(ok);
        assert_eq!(
            input.events(),
            vec![
                InputEvent::Type("hello".into()),
                InputEvent::Hotkey(vec!["ctrl".into(), "s".into()]),
                InputEvent::Type("x.txt".into()),
                InputEvent::Key("enter".into()),
            ]
        );
    }

    #[test]
    fn unsupported_step_is_skipped_but_reported() {
        let input = Arc::new(RecordingInput::new());
        let ok = agent(&input).handle(&[
            SubAction::Unsupported,
            SubAction::PressKey { key: "tab".into() },
        ]);
        assert!(!ok);
        assert_eq!(input.events(), vec![InputEvent::Key("tab".into())]);
    }

    #[test]
    fn failing_primitive_stops_remaining_steps() {
        let input = Arc::new(RecordingInput::failing_on("hotkey"));
        let ok = agent(&input).handle(&[
            SubAction::SaveFile {
                filename: "x.txt".into(),
            },
            SubAction::TypeText {
                text: "never".into(),
            },
        ]);
        assert!(!ok);
        assert!(input.events().is_empty());
    }

    #[test]
    fn plan_supplied_hotkey_is_forwarded() {
        let input = Arc::new(RecordingInput::new());
        assert!(agent(&input).handle(&[SubAction::Hotkey {
            keys: vec!["ctrl".into(), "a".into()],
        }]));
        assert_eq!(
            input.events(),
            vec![InputEvent::Hotkey(vec!["ctrl".into(), "a".into()])]
        );
    }
}
