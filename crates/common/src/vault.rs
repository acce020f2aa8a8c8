//! Durable key/value storage for tokens and small settings.
//!
//! The vault is the console's stand-in for browser local storage: a single
//! JSON file of prefix-scoped keys holding JSON-serialized values. Writes
//! may optionally pass through a reversible obfuscation transform. The
//! transform is base64 behind a marker prefix and is explicitly NOT
//! cryptography; it only keeps tokens from being shoulder-surfable in the
//! raw file.
//!
//! Every operation is synchronous and infallible from the caller's point of
//! view: a full disk, an unwritable directory, or a corrupt file degrades to
//! "value absent" (`None` / `false`) with a log line instead of taking the
//! session down.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Prefix applied to every stored key so `clear` only touches our entries.
const KEY_PREFIX: &str = "fluxgate_";

/// Marker prepended to obfuscated values so reads can detect and reverse
/// the transform transparently.
const OBFUSCATION_MARKER: &str = "__obf__";

/// File name inside the vault directory.
const VAULT_FILE: &str = "vault.json";

/// Prefix-scoped JSON key/value store with optional value obfuscation.
pub struct Vault {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl Vault {
    /// Open (or create) a vault backed by `dir/vault.json`.
    ///
    /// A missing or unreadable file yields an empty vault; it will be
    /// recreated on the next successful `set`.
    #[must_use]
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(VAULT_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "vault file corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self { path, entries: Mutex::new(entries) }
    }

    /// Read and deserialize a value, reversing obfuscation if present.
    ///
    /// Returns `None` for missing keys and for any decode failure.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let stored = { self.entries.lock().get(&storage_key(key)).cloned() }?;

        let serialized = if let Some(encoded) = stored.strip_prefix(OBFUSCATION_MARKER) {
            let bytes = match BASE64.decode(encoded) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(key, error = %err, "failed to reverse obfuscation");
                    return None;
                }
            };
            match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => {
                    warn!(key, error = %err, "obfuscated value is not valid utf-8");
                    return None;
                }
            }
        } else {
            stored
        };

        match serde_json::from_str(&serialized) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "failed to deserialize vault value");
                None
            }
        }
    }

    /// Serialize and store a value, optionally obfuscated.
    ///
    /// Returns `false` when serialization or the file write fails.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, obfuscate: bool) -> bool {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(key, error = %err, "failed to serialize vault value");
                return false;
            }
        };

        let stored = if obfuscate {
            format!("{OBFUSCATION_MARKER}{}", BASE64.encode(serialized.as_bytes()))
        } else {
            serialized
        };

        let mut entries = self.entries.lock();
        entries.insert(storage_key(key), stored);
        self.persist(&entries)
    }

    /// Remove a single key. Removing an absent key still succeeds.
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        entries.remove(&storage_key(key));
        self.persist(&entries)
    }

    /// Remove every prefix-scoped entry.
    pub fn clear(&self) -> bool {
        let mut entries = self.entries.lock();
        entries.retain(|key, _| !key.starts_with(KEY_PREFIX));
        self.persist(&entries)
    }

    /// Whether a value exists under the key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(&storage_key(key))
    }

    fn persist(&self, entries: &HashMap<String, String>) -> bool {
        let serialized = match serde_json::to_string_pretty(entries) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(error = %err, "failed to serialize vault file");
                return false;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(path = %self.path.display(), error = %err, "failed to create vault dir");
                return false;
            }
        }

        match fs::write(&self.path, serialized) {
            Ok(()) => {
                debug!(path = %self.path.display(), "vault persisted");
                true
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to write vault file");
                false
            }
        }
    }
}

fn storage_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}
