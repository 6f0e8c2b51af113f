//! Fact Store – durable key/value record of what the user asked SARA to
//! remember.
//!
//! # Storage layout
//!
//! A single pretty-printed JSON document:
//!
//! ```json
//! {
//!   "user_details": { "deadline": "Friday" },
//!   "contacts": { "Alice": { "email": "alice@example.com" } }
//! }
//! ```
//!
//! A missing or unparseable file reads as the empty document.  Writes are
//! read-modify-write under a store-level lock and land through a temp file +
//! rename, so concurrent writers never lose each other's keys and a crash
//! mid-write leaves the previous document intact.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sara_types::FactDocument;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can arise while persisting facts.
#[derive(Error, Debug)]
pub enum FactStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Normalise a free-form key to snake_case (`"Favourite Colour"` →
/// `"favourite_colour"`).  Returns an empty string if nothing usable is left.
pub fn snake_case_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

fn normalise(partial: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    partial
        .iter()
        .filter_map(|(key, value)| {
            let key = snake_case_key(key);
            (!key.is_empty()).then(|| (key, value.clone()))
        })
        .collect()
}

/// JSON-file backed fact store.
#[derive(Debug)]
pub struct FactStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FactStore {
    /// Use the document at `path`.  Nothing is read or created until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot.  Never fails: a missing or corrupt file yields the
    /// empty document.
    pub fn load(&self) -> FactDocument {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return FactDocument::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read fact store; using empty document");
                return FactDocument::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "fact store is corrupt; using empty document");
                FactDocument::default()
            }
        }
    }

    /// Merge `partial` into `user_details` (last write wins per key) and
    /// persist before returning.  Keys are normalised to snake_case; keys that
    /// normalise to nothing are dropped.
    ///
    /// Returns the normalised pairs that were written.  When nothing survives
    /// normalisation the file is left untouched.
    pub fn update_facts(
        &self,
        partial: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, FactStoreError> {
        let written = normalise(partial);
        if written.is_empty() {
            return Ok(written);
        }
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.load();
        doc.user_details.extend(written.clone());
        self.save(&doc)?;
        info!(keys = ?written.keys().collect::<Vec<_>>(), "fact store updated");
        Ok(written)
    }

    /// Merge `details` into the contact called `name`, same rules as
    /// [`update_facts`][Self::update_facts].  Existing details the update does
    /// not mention are kept.
    pub fn update_contact(
        &self,
        name: &str,
        details: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, FactStoreError> {
        let name = name.trim();
        let written = normalise(details);
        if name.is_empty() || written.is_empty() {
            return Ok(BTreeMap::new());
        }
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.load();
        doc.contacts
            .entry(name.to_string())
            .or_default()
            .extend(written.clone());
        self.save(&doc)?;
        info!(contact = name, keys = ?written.keys().collect::<Vec<_>>(), "fact store updated for contact");
        Ok(written)
    }

    fn save(&self, doc: &FactDocument) -> Result<(), FactStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn facts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn snake_case_normalises_keys() {
        assert_eq!(snake_case_key("Favourite Colour"), "favourite_colour");
        assert_eq!(snake_case_key("  project-deadline "), "project_deadline");
        assert_eq!(snake_case_key("already_snake"), "already_snake");
        assert_eq!(snake_case_key("!!!"), "");
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FactStore::new(dir.path().join("knowledge_base.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge_base.json");
        fs::write(&path, "{ not json").unwrap();
        let store = FactStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn update_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge_base.json");
        FactStore::new(&path)
            .update_facts(&facts(&[("k", "v")]))
            .unwrap();

        // A fresh store instance simulates a process restart.
        let reopened = FactStore::new(&path);
        assert_eq!(reopened.load().user_details["k"], "v");
    }

    #[test]
    fn update_merges_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FactStore::new(dir.path().join("kb.json"));
        store
            .update_facts(&facts(&[("name", "Ada"), ("city", "London")]))
            .unwrap();
        let written = store.update_facts(&facts(&[("City", "Paris")])).unwrap();
        assert_eq!(written, facts(&[("city", "Paris")]));

        let doc = store.load();
        assert_eq!(doc.user_details["name"], "Ada");
        assert_eq!(doc.user_details["city"], "Paris");
    }

    #[test]
    fn update_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FactStore::new(dir.path().join("nested").join("kb.json"));
        store.update_facts(&facts(&[("k", "v")])).unwrap();
        assert_eq!(store.load().user_details["k"], "v");
    }

    #[test]
    fn contacts_are_kept_separately() {
        let dir = tempfile::tempdir().unwrap();
        let store = FactStore::new(dir.path().join("kb.json"));
        store
            .update_contact("Alice", &facts(&[("email", "alice@example.com")]))
            .unwrap();
        store.update_facts(&facts(&[("name", "Ada")])).unwrap();

        let doc = store.load();
        assert_eq!(doc.contacts["Alice"]["email"], "alice@example.com");
        assert_eq!(doc.user_details.len(), 1);
    }

    #[test]
    fn contact_updates_merge_details() {
        let dir = tempfile::tempdir().unwrap();
        let store = FactStore::new(dir.path().join("kb.json"));
        store
            .update_contact(" Alice ", &facts(&[("email", "a@b.c")]))
            .unwrap();
        let written = store
            .update_contact("Alice", &facts(&[("Phone Number", "555")]))
            .unwrap();
        assert_eq!(written, facts(&[("phone_number", "555")]));

        let alice = &store.load().contacts["Alice"];
        assert_eq!(alice["email"], "a@b.c");
        assert_eq!(alice["phone_number"], "555");
    }

    #[test]
    fn unusable_keys_leave_the_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let store = FactStore::new(&path);
        assert!(store.update_facts(&facts(&[("!!!", "v")])).unwrap().is_empty());
        assert!(store.update_contact("  ", &facts(&[("email", "x")])).unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn concurrent_updates_do_not_lose_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FactStore::new(dir.path().join("kb.json")));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .update_facts(&facts(&[(&format!("key_{i}"), "v")]))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.load().user_details.len(), 8);
    }
}
