//! `sara-desktop` – the hands of the assistant.
//!
//! Everything that touches the desktop lives here, leaves first:
//!
//! - [`input`] – [`InputDevice`][input::InputDevice]: atomic keyboard
//!   primitives (type text, press key, chord) with explicit success/failure.
//! - [`process`] – helper processes run under a hard time limit.
//! - [`xdotool`] – X11 implementations of the input and window-lookup traits.
//! - [`launcher`] – [`AppLauncher`][launcher::AppLauncher]: resolve, spawn,
//!   wait for and focus a named application, failing with the step that broke.
//! - [`agent`] – [`AppAgent`][agent::AppAgent]: per-application handlers that
//!   translate plan steps into primitives.
//! - [`registry`] – [`AgentRegistry`][registry::AgentRegistry]: name-keyed
//!   handler lookup used by the orchestrator's background tasks.
//! - [`sim`] – recording/simulated devices for headless tests.

pub mod agent;
pub mod input;
pub mod launcher;
pub mod process;
pub mod registry;
pub mod sim;
pub mod xdotool;

pub use agent::{AppAgent, NotepadAgent, SettleDelays};
pub use input::InputDevice;
pub use launcher::{AppHandle, AppLauncher, LaunchConfig, ProcessLauncher, WindowManager};
pub use registry::{AgentRegistry, Execution};
