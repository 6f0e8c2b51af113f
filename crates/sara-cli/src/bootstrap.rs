//! Wires a [`Config`] into a ready [`Orchestrator`] with the real desktop,
//! OCR and model backends.

use std::sync::Arc;
use std::time::Duration;

use sara_desktop::xdotool::XdotoolInput;
use sara_desktop::{AgentRegistry, InputDevice, LaunchConfig, ProcessLauncher, SettleDelays};
use sara_memory::{Embedder, HashingEmbedder, KnowledgeConfig, KnowledgeStore, OllamaEmbedder};
use sara_perception::{OcrConfig, OcrScreenReader};
use sara_runtime::{LlmDriver, LlmReasoner, Orchestrator, OrchestratorConfig};
use tracing::info;

use crate::config::{Config, EmbeddingProvider};

pub fn embedder_for(cfg: &Config) -> Arc<dyn Embedder> {
    match cfg.embedding_provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(
            &cfg.llm_base_url,
            &cfg.embedding_model,
            Duration::from_secs(cfg.request_timeout_secs),
        )),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::default()),
    }
}

pub async fn knowledge_for(cfg: &Config) -> KnowledgeStore {
    KnowledgeStore::open(KnowledgeConfig::in_dir(&cfg.data_dir), embedder_for(cfg)).await
}

/// Build the production orchestrator.  Must run inside the Tokio runtime.
pub async fn build_orchestrator(cfg: &Config) -> Orchestrator {
    let knowledge = Arc::new(knowledge_for(cfg).await);

    let driver = LlmDriver::new(&cfg.llm_base_url, &cfg.active_model)
        .with_timeout(Duration::from_secs(cfg.request_timeout_secs))
        .with_api_key(Some(cfg.api_key.clone()));
    let reasoner = Arc::new(LlmReasoner::new(driver));

    let input: Arc<dyn InputDevice> = Arc::new(XdotoolInput::new(cfg.type_interval_ms));
    let agents = Arc::new(AgentRegistry::with_builtin_agents(
        input,
        SettleDelays::default(),
    ));
    let launcher = Arc::new(ProcessLauncher::new(LaunchConfig {
        responsive_timeout: Duration::from_secs(cfg.launch_timeout_secs),
        ..LaunchConfig::default()
    }));
    let screen = Arc::new(OcrScreenReader::new(OcrConfig::default()));

    info!(
        model = %cfg.active_model,
        data_dir = %cfg.data_dir.display(),
        degraded = knowledge.is_degraded(),
        "orchestrator ready"
    );

    Orchestrator::new(
        knowledge,
        reasoner,
        screen,
        launcher,
        agents,
        OrchestratorConfig {
            recall_k: cfg.recall_k,
            screen_text_limit: cfg.screen_text_limit,
            ..OrchestratorConfig::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_config_builds_a_working_store() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            embedding_provider: EmbeddingProvider::Hashing,
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let orchestrator = build_orchestrator(&cfg).await;
        assert!(!orchestrator.knowledge().is_degraded());
        assert_eq!(orchestrator.tasks().in_flight(), 0);
    }

    #[tokio::test]
    async fn unreachable_embedding_server_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            llm_base_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 2,
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = knowledge_for(&cfg).await;
        assert!(store.is_degraded());
        assert!(store.get_facts().is_empty());
    }
}
