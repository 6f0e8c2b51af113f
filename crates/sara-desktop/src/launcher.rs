//! Application Driver – start a named application and give it focus.
//!
//! [`AppLauncher::launch_and_focus`] runs four steps:
//!
//! 1. Resolve the logical name through [`resolve_executable`] (static table,
//!    falling back to `name + EXE_SUFFIX`).
//! 2. Spawn the process.
//! 3. Poll the [`WindowManager`] until the process exposes a window, bounded
//!    by [`LaunchConfig::responsive_timeout`].
//! 4. Raise that window to the foreground.
//!
//! Whichever step fails is reported in [`SaraError::LaunchFailed`] and logged,
//! and a process spawned before the failure is killed and reaped.
//!
//! The initial settle delay before polling is a timing assumption, not a
//! readiness guarantee; under heavy load the first keystrokes can still land
//! before the window accepts input.

use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use sara_types::{LaunchStep, SaraError};
use tracing::{info, warn};

use crate::xdotool::XdotoolWindows;

#[cfg(windows)]
const EXECUTABLES: &[(&str, &str)] = &[
    ("notepad", "notepad.exe"),
    ("chrome", "chrome.exe"),
    ("calculator", "calc.exe"),
];

#[cfg(not(windows))]
const EXECUTABLES: &[(&str, &str)] = &[
    ("notepad", "gedit"),
    ("chrome", "google-chrome"),
    ("calculator", "gnome-calculator"),
];

/// Map a logical application name to the executable to start.
///
/// Lookup is case-insensitive.  Names missing from the table are used as-is
/// with the platform executable suffix appended (`".exe"` on Windows).
pub fn resolve_executable(application: &str) -> String {
    let key = application.trim().to_lowercase();
    EXECUTABLES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, exe)| exe.to_string())
        .unwrap_or_else(|| format!("{key}{}", std::env::consts::EXE_SUFFIX))
}

/// A launched, focused application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHandle {
    pub application: String,
    pub executable: String,
    pub pid: u32,
    /// Backend-specific window identifier.
    pub window: String,
}

/// Starts applications and hands back a focused [`AppHandle`].
pub trait AppLauncher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SaraError::LaunchFailed`] naming the [`LaunchStep`] that
    /// failed.
    fn launch_and_focus(&self, application: &str) -> Result<AppHandle, SaraError>;
}

/// Window lookups needed by [`ProcessLauncher`].
pub trait WindowManager: Send + Sync {
    /// Return the primary window of `pid`, or `None` if it has none yet.
    fn find_window(&self, pid: u32) -> Result<Option<String>, String>;

    /// Raise `window` and give it keyboard focus.
    fn focus(&self, window: &str) -> Result<(), String>;
}

/// Timing knobs for [`ProcessLauncher`].
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Fixed wait after spawning before the first window lookup.
    pub startup_delay: Duration,
    /// Upper bound on waiting for the process to expose a window.
    pub responsive_timeout: Duration,
    /// Delay between window lookups.
    pub poll_interval: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(2),
            responsive_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Launches real OS processes.
pub struct ProcessLauncher<W: WindowManager = XdotoolWindows> {
    config: LaunchConfig,
    windows: W,
}

impl ProcessLauncher<XdotoolWindows> {
    pub fn new(config: LaunchConfig) -> Self {
        Self::with_window_manager(config, XdotoolWindows::default())
    }
}

impl<W: WindowManager> ProcessLauncher<W> {
    pub fn with_window_manager(config: LaunchConfig, windows: W) -> Self {
        Self { config, windows }
    }
}

fn failure(application: &str, step: LaunchStep, details: impl Into<String>) -> SaraError {
    let err = SaraError::LaunchFailed {
        application: application.to_string(),
        step,
        details: details.into(),
    };
    warn!(application, %step, error = %err, "application launch failed");
    err
}

/// Kill a process whose launch failed and collect its exit status.
fn abandon(mut child: Child) {
    let pid = child.id();
    if let Err(e) = child.kill() {
        warn!(pid, error = %e, "failed to kill abandoned process");
    }
    let _ = child.wait();
}

impl<W: WindowManager> AppLauncher for ProcessLauncher<W> {
    fn launch_and_focus(&self, application: &str) -> Result<AppHandle, SaraError> {
        let executable = resolve_executable(application);

        let mut child = Command::new(&executable)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| failure(application, LaunchStep::Spawn, format!("{executable}: {e}")))?;
        let pid = child.id();
        info!(application, executable = %executable, pid, "launched process");

        thread::sleep(self.config.startup_delay);

        let deadline = Instant::now() + self.config.responsive_timeout;
        let window = loop {
            match self.windows.find_window(pid) {
                Ok(Some(window)) => break window,
                Ok(None) => {}
                Err(e) => {
                    abandon(child);
                    return Err(failure(application, LaunchStep::AcquireWindow, e));
                }
            }
            if let Ok(Some(status)) = child.try_wait() {
                return Err(failure(
                    application,
                    LaunchStep::WaitResponsive,
                    format!("process exited before showing a window ({status})"),
                ));
            }
            if Instant::now() >= deadline {
                abandon(child);
                return Err(failure(
                    application,
                    LaunchStep::WaitResponsive,
                    format!("no window after {:?}", self.config.responsive_timeout),
                ));
            }
            thread::sleep(self.config.poll_interval);
        };

        if let Err(e) = self.windows.focus(&window) {
            abandon(child);
            return Err(failure(application, LaunchStep::Focus, e));
        }

        info!(application, window = %window, "application focused");
        Ok(AppHandle {
            application: application.to_string(),
            executable,
            pid,
            window,
        })
    }
}
