//! [`KnowledgeStore`] – the single memory surface the orchestrator talks to.
//!
//! It combines the JSON [`FactStore`] with the embedding-backed
//! [`MemoryStream`].  If the stream database cannot be opened or the
//! embedder does not answer at start-up, the store runs *degraded*: facts
//! keep working, `add_memory` is a no-op and recall returns nothing.  The
//! condition is logged once, when the store is opened.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use sara_types::FactDocument;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::facts::{FactStore, FactStoreError};
use crate::stream::MemoryStream;

/// Where the knowledge store keeps its data.
#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    /// JSON fact document.
    pub facts_path: PathBuf,
    /// SQLite memory stream; `None` keeps the stream in memory.
    pub memory_path: Option<PathBuf>,
}

impl KnowledgeConfig {
    /// `knowledge_base.json` and `memory_stream.db` under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            facts_path: dir.join("knowledge_base.json"),
            memory_path: Some(dir.join("memory_stream.db")),
        }
    }
}

enum MemorySurface {
    Active {
        stream: MemoryStream,
        embedder: Arc<dyn Embedder>,
    },
    Degraded,
}

/// Facts plus experiences.
pub struct KnowledgeStore {
    facts: FactStore,
    memory: MemorySurface,
}

impl KnowledgeStore {
    /// Open both stores.  Never fails: memory-stream problems switch the store
    /// to degraded mode instead.
    pub async fn open(config: KnowledgeConfig, embedder: Arc<dyn Embedder>) -> Self {
        let facts = FactStore::new(config.facts_path);

        if let Err(e) = embedder.embed("ping").await {
            warn!(error = %e, "embedding model unavailable; running without the memory stream");
            return Self::degraded(facts);
        }

        let stream = match &config.memory_path {
            Some(path) => {
                if let Some(parent) = path.parent()
                    && let Err(e) = std::fs::create_dir_all(parent)
                {
                    warn!(path = %parent.display(), error = %e, "cannot create memory directory");
                }
                MemoryStream::open(path)
            }
            None => MemoryStream::open_in_memory(),
        };
        match stream {
            Ok(stream) => {
                info!(entries = stream.count().unwrap_or(0), "memory stream ready");
                Self::with_parts(facts, stream, embedder)
            }
            Err(e) => {
                warn!(error = %e, "memory stream unavailable; running without it");
                Self::degraded(facts)
            }
        }
    }

    /// Assemble from already-open parts, skipping the start-up probe.
    pub fn with_parts(facts: FactStore, stream: MemoryStream, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            facts,
            memory: MemorySurface::Active { stream, embedder },
        }
    }

    /// Facts only; the memory stream is disabled.
    pub fn degraded(facts: FactStore) -> Self {
        Self {
            facts,
            memory: MemorySurface::Degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.memory, MemorySurface::Degraded)
    }

    // ── Facts ────────────────────────────────────────────────────────────────

    pub fn get_facts(&self) -> FactDocument {
        self.facts.load()
    }

    /// Merge `partial` into the user's details; returns the normalised pairs
    /// written.
    pub fn update_facts(
        &self,
        partial: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, FactStoreError> {
        self.facts.update_facts(partial)
    }

    /// Merge `details` into one contact's entry; returns the normalised pairs
    /// written.
    pub fn update_contact(
        &self,
        name: &str,
        details: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, FactStoreError> {
        self.facts.update_contact(name, details)
    }

    // ── Experiences ──────────────────────────────────────────────────────────

    /// Append `text` to the memory stream, tagged with `source`.  Failures are
    /// logged and swallowed.
    pub async fn add_memory(&self, source: &str, text: &str) {
        let MemorySurface::Active { stream, embedder } = &self.memory else {
            return;
        };
        let embedding = match embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to embed memory; entry dropped");
                return;
            }
        };
        match stream.append(text, &embedding, json!({ "source": source })) {
            Ok(id) => debug!(id, source, "memory appended"),
            Err(e) => warn!(error = %e, "failed to append memory"),
        }
    }

    /// Texts of the `k` stored experiences most relevant to `query`, best
    /// first.  Empty in degraded mode or on any failure.
    pub async fn recall_memories(&self, query: &str, k: usize) -> Vec<String> {
        let MemorySurface::Active { stream, embedder } = &self.memory else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }
        let embedding = match embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to embed recall query");
                return Vec::new();
            }
        };
        match stream.recall_similar(&embedding, k) {
            Ok(hits) => hits.into_iter().map(|(record, _)| record.text).collect(),
            Err(e) => {
                warn!(error = %e, "memory recall failed");
                Vec::new()
            }
        }
    }

    /// Number of stored experiences (0 in degraded mode).
    pub fn memory_count(&self) -> u64 {
        match &self.memory {
            MemorySurface::Active { stream, .. } => stream.count().unwrap_or(0),
            MemorySurface::Degraded => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, HashingEmbedder};
    use async_trait::async_trait;

    struct DeadEmbedder;

    #[async_trait]
    impl Embedder for DeadEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Empty("dead".into()))
        }
    }

    async fn open_in(dir: &std::path::Path) -> KnowledgeStore {
        KnowledgeStore::open(
            KnowledgeConfig::in_dir(dir),
            Arc::new(HashingEmbedder::default()),
        )
        .await
    }

    #[tokio::test]
    async fn memories_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_in(dir.path()).await;
            assert!(!store.is_degraded());
            store
                .add_memory("remember", "User shared facts: project deadline is Friday")
                .await;
            store
                .add_memory("automation", "I successfully performed an action in notepad.")
                .await;
        }
        let store = open_in(dir.path()).await;
        assert_eq!(store.memory_count(), 2);
        let hits = store.recall_memories("project deadline", 1).await;
        assert_eq!(hits, vec!["User shared facts: project deadline is Friday".to_string()]);
    }

    #[tokio::test]
    async fn recall_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(dir.path()).await;
        for text in ["alpha beta", "beta gamma", "gamma delta"] {
            store.add_memory("test", text).await;
        }
        let first = store.recall_memories("beta", 2).await;
        let second = store.recall_memories("beta", 2).await;
        assert_eq!(first, second);
        assert_eq!(store.memory_count(), 3);
    }

    #[tokio::test]
    async fn recall_returns_at_most_k() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(dir.path()).await;
        assert!(store.recall_memories("anything", 2).await.is_empty());
        store.add_memory("test", "one").await;
        assert_eq!(store.recall_memories("anything", 2).await.len(), 1);
        store.add_memory("test", "two").await;
        store.add_memory("test", "three").await;
        assert_eq!(store.recall_memories("anything", 2).await.len(), 2);
        assert!(store.recall_memories("anything", 0).await.is_empty());
    }

    #[tokio::test]
    async fn dead_embedder_degrades_memory_but_keeps_facts() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            KnowledgeStore::open(KnowledgeConfig::in_dir(dir.path()), Arc::new(DeadEmbedder)).await;
        assert!(store.is_degraded());

        store.add_memory("test", "lost").await;
        assert_eq!(store.memory_count(), 0);
        assert!(store.recall_memories("lost", 2).await.is_empty());

        let mut partial = BTreeMap::new();
        partial.insert("deadline".to_string(), "Friday".to_string());
        store.update_facts(&partial).unwrap();
        assert_eq!(store.get_facts().user_details["deadline"], "Friday");
    }

    #[tokio::test]
    async fn in_memory_stream_is_supported() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(
            KnowledgeConfig {
                facts_path: dir.path().join("kb.json"),
                memory_path: None,
            },
            Arc::new(HashingEmbedder::default()),
        )
        .await;
        store.add_memory("test", "hello").await;
        assert_eq!(store.memory_count(), 1);
    }
}
