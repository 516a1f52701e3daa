//! Persisted postreqs and rule fingerprints.
//!
//! A postreq is a prerequisite discovered while a rule runs, such as a
//! header reported by the compiler's dependency output. The set recorded for
//! a rule is replaced wholesale each time that rule runs, together with the
//! fingerprint the rule carried at the time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::util::fs::write_string;

/// Postreqs and fingerprints by rule key (the rule's first target).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PostreqDb {
    rules: BTreeMap<String, Vec<PathBuf>>,
    #[serde(default)]
    fingerprints: BTreeMap<String, String>,
}

impl PostreqDb {
    /// Load the database, starting empty if it is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return PostreqDb::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from));

        match parsed {
            Ok(db) => db,
            Err(e) => {
                tracing::warn!(
                    "discarding unreadable postreq database {}: {}",
                    path.display(),
                    e
                );
                PostreqDb::default()
            }
        }
    }

    /// Save the database.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_string(path, &content)
    }

    /// Postreqs recorded for a rule.
    pub fn get(&self, key: &str) -> &[PathBuf] {
        self.rules.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the postreqs recorded for a rule.
    pub fn set(&mut self, key: String, postreqs: Vec<PathBuf>) {
        if postreqs.is_empty() {
            self.rules.remove(&key);
        } else {
            self.rules.insert(key, postreqs);
        }
    }

    /// Fingerprint recorded the last time a rule succeeded.
    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.fingerprints.get(key).map(String::as_str)
    }

    pub fn set_fingerprint(&mut self, key: String, fingerprint: Option<String>) {
        match fingerprint {
            Some(f) => {
                self.fingerprints.insert(key, f);
            }
            None => {
                self.fingerprints.remove(&key);
            }
        }
    }
}
