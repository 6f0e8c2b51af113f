//! `sara-memory` – what the assistant knows and what it has experienced.
//!
//! # Modules
//!
//! - [`facts`] – [`FactStore`][facts::FactStore]: JSON document of
//!   user-supplied facts and contacts, read-modify-write under a lock.
//! - [`stream`] – [`MemoryStream`][stream::MemoryStream]: append-only SQLite
//!   log of experiences with cosine-similarity recall.
//! - [`embedding`] – [`Embedder`][embedding::Embedder] trait with an Ollama
//!   client and an offline hashing embedder.
//! - [`knowledge`] – [`KnowledgeStore`][knowledge::KnowledgeStore]: the facade
//!   the orchestrator uses, with degraded mode when embeddings are
//!   unavailable.

pub mod embedding;
pub mod facts;
pub mod knowledge;
pub mod stream;

pub use embedding::{Embedder, EmbeddingError, HashingEmbedder, OllamaEmbedder};
pub use facts::{FactStore, FactStoreError};
pub use knowledge::{KnowledgeConfig, KnowledgeStore};
pub use stream::{MemoryRecord, MemoryStream, MemoryStreamError};
