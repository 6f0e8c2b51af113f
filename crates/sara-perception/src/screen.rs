//! Screen text capture.
//!
//! [`OcrScreenReader`] takes a screenshot with an external capture command
//! into a temporary PNG, runs `tesseract <png> stdout` over it and returns
//! the recognised text.  Both tools share the [`OcrConfig::timeout`] budget
//! per invocation and are killed when it runs out.  The PNG is removed
//! afterwards whether or not OCR succeeded.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use sara_types::SaraError;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Placeholder in [`OcrConfig::capture_command`] replaced by the PNG path.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Returns the text currently visible on screen.
#[async_trait]
pub trait ScreenReader: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SaraError::PerceptionFailed`] if the screen cannot be
    /// captured or recognised in time.
    async fn screen_text(&self) -> Result<String, SaraError>;
}

/// External tools used by [`OcrScreenReader`].
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Screenshot program and arguments; `{path}` is replaced by the output
    /// file.
    pub capture_command: Vec<String>,
    /// Tesseract executable.
    pub tesseract: String,
    /// Directory for the temporary screenshot.
    pub scratch_dir: PathBuf,
    /// Upper bound on each tool invocation.
    pub timeout: Duration,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            capture_command: vec![
                "import".to_string(),
                "-window".to_string(),
                "root".to_string(),
                PATH_PLACEHOLDER.to_string(),
            ],
            tesseract: "tesseract".to_string(),
            scratch_dir: std::env::temp_dir(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Screenshot + Tesseract OCR.
#[derive(Debug, Clone, Default)]
pub struct OcrScreenReader {
    config: OcrConfig,
}

fn perception_error(details: impl Into<String>) -> SaraError {
    SaraError::PerceptionFailed(details.into())
}

fn spawn(program: &str, args: &[String]) -> io::Result<Child> {
    debug!(program, ?args, "running perception tool");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

impl OcrScreenReader {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Wait for `child` within the configured budget.  On timeout the child
    /// is dropped, which kills it.
    async fn finish(&self, program: &str, child: Child) -> Result<Output, SaraError> {
        let timeout = self.config.timeout;
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(perception_error(format!("{program} failed: {e}"))),
            Err(_) => {
                warn!(program, ?timeout, "perception tool timed out");
                Err(perception_error(format!(
                    "{program} did not finish within {timeout:?}"
                )))
            }
        }
    }

    async fn capture(&self, path: &Path) -> Result<(), SaraError> {
        let (program, args) = self
            .config
            .capture_command
            .split_first()
            .ok_or_else(|| perception_error("no capture command configured"))?;
        let path_str = path.to_string_lossy();
        let args: Vec<String> = args
            .iter()
            .map(|a| a.replace(PATH_PLACEHOLDER, &path_str))
            .collect();
        let child = spawn(program, &args)
            .map_err(|e| perception_error(format!("failed to run {program}: {e}")))?;
        let output = self.finish(program, child).await?;
        if !output.status.success() {
            return Err(perception_error(format!(
                "{program} exited with {}",
                output.status
            )));
        }
        Ok(())
    }

    async fn recognise(&self, path: &Path) -> Result<String, SaraError> {
        let tesseract = &self.config.tesseract;
        let args = [path.to_string_lossy().into_owned(), "stdout".to_string()];
        let child = spawn(tesseract, &args).map_err(|e| {
            perception_error(format!(
                "Tesseract is not installed or the path is incorrect ({tesseract}): {e}"
            ))
        })?;
        let output = self.finish(tesseract, child).await?;
        if !output.status.success() {
            return Err(perception_error(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ScreenReader for OcrScreenReader {
    async fn screen_text(&self) -> Result<String, SaraError> {
        let path = self
            .config
            .scratch_dir
            .join(format!("sara-screen-{}.png", Uuid::new_v4()));
        let result = match self.capture(&path).await {
            Ok(()) => self.recognise(&path).await,
            Err(e) => Err(e),
        };
        let _ = tokio::fs::remove_file(&path).await;
        if let Ok(text) = &result {
            info!(chars = text.chars().count(), "screen captured and OCR performed");
        }
        result
    }
}

/// Fixed screen contents, for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct StaticScreen {
    text: Option<String>,
}

impl StaticScreen {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// A screen that always fails to capture.
    pub fn unavailable() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl ScreenReader for StaticScreen {
    async fn screen_text(&self) -> Result<String, SaraError> {
        self.text
            .clone()
            .ok_or_else(|| perception_error("no display available"))
    }
}
