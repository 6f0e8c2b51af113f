//! X11 backends built on the `xdotool` command-line tool.
//!
//! [`XdotoolInput`] implements the [`InputDevice`] primitives and
//! [`XdotoolWindows`] implements the [`WindowManager`] lookups used by the
//! [`ProcessLauncher`][crate::launcher::ProcessLauncher].  Every call is a
//! short-lived child process bounded by a timeout, so a wedged X server or a
//! window manager that ignores `windowactivate --sync` surfaces as an error
//! instead of a hang.

use std::process::Output;
use std::time::Duration;

use sara_types::SaraError;

use crate::input::{InputDevice, input_error};
use crate::launcher::WindowManager;
use crate::process::run_bounded;

/// Default budget for one `xdotool` invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// `xdotool search` exit status when no window matches.
const NO_MATCH_STATUS: i32 = 1;

/// Translate the key names plans use into X keysym names.
fn keysym(key: &str) -> String {
    match key.to_ascii_lowercase().as_str() {
        "enter" | "return" => "Return".to_string(),
        "esc" | "escape" => "Escape".to_string(),
        "tab" => "Tab".to_string(),
        "backspace" => "BackSpace".to_string(),
        "delete" | "del" => "Delete".to_string(),
        "space" => "space".to_string(),
        "up" => "Up".to_string(),
        "down" => "Down".to_string(),
        "left" => "Left".to_string(),
        "right" => "Right".to_string(),
        "win" | "super" | "cmd" => "super".to_string(),
        other => other.to_string(),
    }
}

fn exit_error(binary: &str, output: &Output) -> String {
    format!(
        "{binary} exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )
}

fn run(binary: &str, args: &[String], timeout: Duration) -> Result<Output, String> {
    let output = run_bounded(binary, args, timeout).map_err(|e| e.to_string())?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(exit_error(binary, &output))
    }
}

/// Keyboard backend that shells out to `xdotool`.
#[derive(Debug, Clone)]
pub struct XdotoolInput {
    binary: String,
    type_interval_ms: u64,
    timeout: Duration,
}

impl XdotoolInput {
    /// `type_interval_ms` is the delay between typed characters.
    pub fn new(type_interval_ms: u64) -> Self {
        Self {
            binary: "xdotool".to_string(),
            type_interval_ms,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a different `xdotool` executable (e.g. an absolute path).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Upper bound on a single primitive.  Typing long text at a slow
    /// interval needs a larger budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl InputDevice for XdotoolInput {
    fn type_text(&self, text: &str) -> Result<(), SaraError> {
        let args = vec![
            "type".to_string(),
            "--delay".to_string(),
            self.type_interval_ms.to_string(),
            "--".to_string(),
            text.to_string(),
        ];
        run(&self.binary, &args, self.timeout).map_err(|e| input_error("type_text", e))?;
        Ok(())
    }

    fn press_key(&self, key: &str) -> Result<(), SaraError> {
        let args = vec!["key".to_string(), "--".to_string(), keysym(key)];
        run(&self.binary, &args, self.timeout).map_err(|e| input_error("press_key", e))?;
        Ok(())
    }

    fn hotkey(&self, keys: &[&str]) -> Result<(), SaraError> {
        if keys.is_empty() {
            return Err(input_error("hotkey", "empty chord"));
        }
        let chord = keys.iter().map(|k| keysym(k)).collect::<Vec<_>>().join("+");
        let args = vec!["key".to_string(), "--".to_string(), chord];
        run(&self.binary, &args, self.timeout).map_err(|e| input_error("hotkey", e))?;
        Ok(())
    }
}

/// Window lookup and focus through `xdotool search` / `windowactivate`.
#[derive(Debug, Clone)]
pub struct XdotoolWindows {
    binary: String,
    timeout: Duration,
}

impl Default for XdotoolWindows {
    fn default() -> Self {
        Self {
            binary: "xdotool".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl XdotoolWindows {
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl WindowManager for XdotoolWindows {
    fn find_window(&self, pid: u32) -> Result<Option<String>, String> {
        let args = vec![
            "search".to_string(),
            "--onlyvisible".to_string(),
            "--pid".to_string(),
            pid.to_string(),
        ];
        let out = run_bounded(&self.binary, &args, self.timeout).map_err(|e| e.to_string())?;
        if out.status.code() == Some(NO_MATCH_STATUS) {
            return Ok(None);
        }
        if !out.status.success() {
            return Err(exit_error(&self.binary, &out));
        }
        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string))
    }

    fn focus(&self, window: &str) -> Result<(), String> {
        let args = vec![
            "windowactivate".to_string(),
            "--sync".to_string(),
            window.to_string(),
        ];
        run(&self.binary, &args, self.timeout).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keysym_maps_common_names() {
        assert_eq!(keysym("enter"), "Return");
        assert_eq!(keysym("ENTER"), "Return");
        assert_eq!(keysym("ctrl"), "ctrl");
        assert_eq!(keysym("s"), "s");
    }

    #[test]
    fn empty_hotkey_is_rejected_before_spawning() {
        let input = XdotoolInput::new(50).with_binary("/nonexistent/xdotool");
        let err = input.hotkey(&[]).unwrap_err();
        assert!(matches!(err, SaraError::InputFailed { details, .. } if details == "empty chord"));
    }

    #[test]
    fn missing_binary_reports_input_failure() {
        let input = XdotoolInput::new(50).with_binary("/nonexistent/xdotool");
        let err = input.type_text("hello").unwrap_err();
        assert!(matches!(err, SaraError::InputFailed { primitive, .. } if primitive == "type_text"));
    }

    #[test]
    fn missing_binary_is_a_lookup_error() {
        let wm = XdotoolWindows::default().with_binary("/nonexistent/xdotool");
        assert!(wm.find_window(1).is_err());
        assert!(wm.focus("123").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn only_no_match_status_means_no_window() {
        // `false` exits 1, like `search` with nothing found.
        let wm = XdotoolWindows::default().with_binary("false");
        assert_eq!(wm.find_window(1).unwrap(), None);

        // `sh search ...` fails to open a script named "search" (status > 1).
        let wm = XdotoolWindows::default().with_binary("sh");
        assert!(wm.find_window(1).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn hung_xdotool_is_cut_off() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exec sleep 5");

        let started = std::time::Instant::now();
        let input = XdotoolInput::new(0)
            .with_binary(script.to_string_lossy())
            .with_timeout(Duration::from_millis(200));
        let err = input.type_text("hello").unwrap_err();
        assert!(
            matches!(&err, SaraError::InputFailed { primitive, details } if primitive == "type_text" && details.contains("did not finish"))
        );

        let wm = XdotoolWindows::default()
            .with_binary(script.to_string_lossy())
            .with_timeout(Duration::from_millis(200));
        assert!(wm.focus("0x1").unwrap_err().contains("did not finish"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-xdotool");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
