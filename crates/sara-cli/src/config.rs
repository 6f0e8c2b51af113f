//! Configuration Vault – reads/writes `~/.sara/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where memory-stream embeddings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Ollama `/api/embeddings` with `embedding_model`.
    #[default]
    Ollama,
    /// Offline feature hashing; no model needed.
    Hashing,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Ollama => write!(f, "ollama"),
            EmbeddingProvider::Hashing => write!(f, "hashing"),
        }
    }
}

/// Persisted user configuration stored in `~/.sara/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the OpenAI-compatible model server (Ollama by default).
    #[serde(default = "default_llm_url")]
    pub llm_base_url: String,

    /// Chat model name (e.g. "llama3").
    #[serde(default = "default_model")]
    pub active_model: String,

    /// Optional bearer token for hosted endpoints.  Stored as plain text;
    /// the file is written owner-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    #[serde(default)]
    pub embedding_provider: EmbeddingProvider,

    /// Embedding model used when `embedding_provider = "ollama"`.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Directory holding `knowledge_base.json` and `memory_stream.db`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Memories recalled per command.
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,

    /// Maximum characters of OCR text sent to the model.
    #[serde(default = "default_screen_text_limit")]
    pub screen_text_limit: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a launched application has to show a window.
    #[serde(default = "default_launch_timeout_secs")]
    pub launch_timeout_secs: u64,

    /// Delay between typed characters.
    #[serde(default = "default_type_interval_ms")]
    pub type_interval_ms: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("llm_base_url", &self.llm_base_url)
            .field("active_model", &self.active_model)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("embedding_provider", &self.embedding_provider)
            .field("embedding_model", &self.embedding_model)
            .field("data_dir", &self.data_dir)
            .field("recall_k", &self.recall_k)
            .field("screen_text_limit", &self.screen_text_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("launch_timeout_secs", &self.launch_timeout_secs)
            .field("type_interval_ms", &self.type_interval_ms)
            .finish()
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_data_dir() -> PathBuf {
    sara_dir_for_home(&home_dir())
}
fn default_recall_k() -> usize {
    2
}
fn default_screen_text_limit() -> usize {
    2000
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_launch_timeout_secs() -> u64 {
    10
}
fn default_type_interval_ms() -> u64 {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_base_url: default_llm_url(),
            active_model: default_model(),
            api_key: String::new(),
            embedding_provider: EmbeddingProvider::default(),
            embedding_model: default_embedding_model(),
            data_dir: default_data_dir(),
            recall_k: default_recall_k(),
            screen_text_limit: default_screen_text_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            launch_timeout_secs: default_launch_timeout_secs(),
            type_interval_ms: default_type_interval_ms(),
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn sara_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".sara")
}

/// Return the path to `~/.sara/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    sara_dir_for_home(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SARA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SARA_LLM_URL` | `llm_base_url` |
/// | `SARA_MODEL` | `active_model` |
/// | `SARA_EMBEDDING_MODEL` | `embedding_model` |
/// | `SARA_DATA_DIR` | `data_dir` |
/// | `SARA_RECALL_K` | `recall_k` (ignored unless a valid number) |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SARA_LLM_URL") {
        cfg.llm_base_url = v;
    }
    if let Ok(v) = std::env::var("SARA_MODEL") {
        cfg.active_model = v;
    }
    if let Ok(v) = std::env::var("SARA_EMBEDDING_MODEL") {
        cfg.embedding_model = v;
    }
    if let Ok(v) = std::env::var("SARA_DATA_DIR") {
        cfg.data_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("SARA_RECALL_K")
        && let Ok(k) = v.parse::<usize>()
    {
        cfg.recall_k = k;
    }
}

/// Save the config to disk, creating `~/.sara/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_api_key() {
        let cfg = Config {
            api_key: "sk-super-secret".to_string(),
            ..Config::default()
        };
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("sk-super-secret"));
        assert!(debug_str.contains("<redacted>"));
        assert!(format!("{:?}", Config::default()).contains("<not set>"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            embedding_provider: EmbeddingProvider::Hashing,
            data_dir: dir.path().join("data"),
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.embedding_provider, EmbeddingProvider::Hashing);
        assert_eq!(loaded.screen_text_limit, 2000);
        assert_eq!(loaded.launch_timeout_secs, 10);
        assert!(loaded.api_key.is_empty());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = toml::from_str("active_model = \"mistral\"\n").unwrap();
        assert_eq!(cfg.active_model, "mistral");
        assert_eq!(cfg.llm_base_url, "http://localhost:11434");
        assert_eq!(cfg.embedding_model, "nomic-embed-text");
        assert_eq!(cfg.embedding_provider, EmbeddingProvider::Ollama);
        assert_eq!(cfg.type_interval_ms, 50);
    }

    #[test]
    fn config_path_points_to_sara_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.sara/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn apply_env_overrides_changes_llm_url() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SARA_LLM_URL", "http://gpu-box:11434") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.llm_base_url, "http://gpu-box:11434");
        unsafe { std::env::remove_var("SARA_LLM_URL") };
    }

    #[test]
    fn apply_env_overrides_changes_model() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SARA_MODEL", "mistral") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.active_model, "mistral");
        unsafe { std::env::remove_var("SARA_MODEL") };
    }

    #[test]
    fn apply_env_overrides_changes_data_dir() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SARA_DATA_DIR", "/srv/sara") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/sara"));
        unsafe { std::env::remove_var("SARA_DATA_DIR") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_recall_k() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SARA_RECALL_K", "lots") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.recall_k, 2);
        unsafe { std::env::set_var("SARA_RECALL_K", "5") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.recall_k, 5);
        unsafe { std::env::remove_var("SARA_RECALL_K") };
    }
}
