//! In-process simulated devices for CI and headless testing.
//!
//! [`RecordingInput`] records every primitive it receives instead of touching
//! the OS, and [`SimLauncher`] pretends to start applications.  Together they
//! let the whole automation path run in unit tests without a display.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sara_desktop::agent::SettleDelays;
//! use sara_desktop::registry::AgentRegistry;
//! use sara_desktop::sim::{InputEvent, RecordingInput};
//! use sara_types::SubAction;
//!
//! let input = Arc::new(RecordingInput::new());
//! let registry = AgentRegistry::with_builtin_agents(input.clone(), SettleDelays::none());
//! registry.execute("notepad", &[SubAction::TypeText { text: "hi".into() }]);
//! assert_eq!(input.events(), vec![InputEvent::Type("hi".into())]);
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use sara_types::{LaunchStep, SaraError};

use crate::input::{InputDevice, input_error};
use crate::launcher::{AppHandle, AppLauncher, resolve_executable};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording keyboard
// ─────────────────────────────────────────────────────────────────────────────

/// One primitive received by [`RecordingInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Type(String),
    Key(String),
    Hotkey(Vec<String>),
}

/// Keyboard that records primitives in arrival order.
///
/// Optionally fails every call to one named primitive (`"type_text"`,
/// `"press_key"` or `"hotkey"`); failed calls are not recorded.
#[derive(Debug, Default)]
pub struct RecordingInput {
    events: Mutex<Vec<InputEvent>>,
    fail_on: Option<&'static str>,
}

impl RecordingInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(primitive: &'static str) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_on: Some(primitive),
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<InputEvent> {
        lock(&self.events).clone()
    }

    fn record(&self, primitive: &'static str, event: InputEvent) -> Result<(), SaraError> {
        if self.fail_on == Some(primitive) {
            return Err(input_error(primitive, "simulated failure"));
        }
        lock(&self.events).push(event);
        Ok(())
    }
}

impl InputDevice for RecordingInput {
    fn type_text(&self, text: &str) -> Result<(), SaraError> {
        self.record("type_text", InputEvent::Type(text.to_string()))
    }

    fn press_key(&self, key: &str) -> Result<(), SaraError> {
        self.record("press_key", InputEvent::Key(key.to_string()))
    }

    fn hotkey(&self, keys: &[&str]) -> Result<(), SaraError> {
        if keys.is_empty() {
            return Err(input_error("hotkey", "empty chord"));
        }
        self.record(
            "hotkey",
            InputEvent::Hotkey(keys.iter().map(|k| k.to_string()).collect()),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulated launcher
// ─────────────────────────────────────────────────────────────────────────────

/// Blocks [`SimLauncher`] launches until [`LaunchGate::release`] is called.
#[derive(Debug, Clone, Default)]
pub struct LaunchGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl LaunchGate {
    /// Let every pending and future launch proceed.
    pub fn release(&self) {
        let (open, cvar) = &*self.inner;
        *lock(open) = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (open, cvar) = &*self.inner;
        let mut guard = lock(open);
        while !*guard {
            guard = cvar.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Launcher that never starts a real process.
#[derive(Debug, Default)]
pub struct SimLauncher {
    fail_at: Option<LaunchStep>,
    gate: Option<LaunchGate>,
    launched: Mutex<Vec<String>>,
}

impl SimLauncher {
    /// Every launch succeeds immediately.
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Every launch fails at `step`.
    pub fn failing_at(step: LaunchStep) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::default()
        }
    }

    /// Launches block until the returned gate is released, then succeed.
    pub fn gated() -> (Self, LaunchGate) {
        let gate = LaunchGate::default();
        let launcher = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (launcher, gate)
    }

    /// Applications that reached the launcher, in call order.
    pub fn launched(&self) -> Vec<String> {
        lock(&self.launched).clone()
    }
}

impl AppLauncher for SimLauncher {
    fn launch_and_focus(&self, application: &str) -> Result<AppHandle, SaraError> {
        lock(&self.launched).push(application.to_string());
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if let Some(step) = self.fail_at {
            return Err(SaraError::LaunchFailed {
                application: application.to_string(),
                step,
                details: "simulated failure".to_string(),
            });
        }
        Ok(AppHandle {
            application: application.to_string(),
            executable: resolve_executable(application),
            pid: 0,
            window: format!("sim:{application}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn recording_input_keeps_order() {
        let input = RecordingInput::new();
        input.hotkey(&["ctrl", "s"]).unwrap();
        input.type_text("a.txt").unwrap();
        input.press_key("enter").unwrap();
        assert_eq!(
            input.events(),
            vec![
                InputEvent::Hotkey(vec!["ctrl".into(), "s".into()]),
                InputEvent::Type("a.txt".into()),
                InputEvent::Key("enter".into()),
            ]
        );
    }

    #[test]
    fn failing_launcher_reports_step() {
        let launcher = SimLauncher::failing_at(LaunchStep::Focus);
        let err = launcher.launch_and_focus("notepad").unwrap_err();
        assert!(matches!(err, SaraError::LaunchFailed { step: LaunchStep::Focus, .. }));
        assert_eq!(launcher.launched(), vec!["notepad".to_string()]);
    }

    #[test]
    fn gated_launcher_waits_for_release() {
        let (launcher, gate) = SimLauncher::gated();
        let launcher = Arc::new(launcher);
        let worker = {
            let launcher = launcher.clone();
            thread::spawn(move || launcher.launch_and_focus("notepad"))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_finished());
        gate.release();
        let handle = worker.join().unwrap().unwrap();
        assert_eq!(handle.window, "sim:notepad");
    }
}
