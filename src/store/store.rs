use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::KeyLifecycleResult;

/// Persisted record key for the version -> metadata map
pub const KEY_ROTATION_METADATA: &str = "key-rotation-metadata";

/// Persisted record key for the bounded audit event array
pub const KEY_ROTATION_AUDIT: &str = "key-rotation-audit";

/// Persisted record key for the current migration progress document
pub const MIGRATION_PROGRESS_KEY: &str = "_migration_progress_v1";

/// Prefix for per-session backup records
pub const BACKUP_KEY_PREFIX: &str = "_backup_";

/// Record key for the backup document of one migration session
pub fn backup_key(session_id: &str) -> String {
    format!("{}{}", BACKUP_KEY_PREFIX, session_id)
}

/// The secret key-value storage primitive consumed by this subsystem
///
/// Implementations wrap the platform's protected storage (keychain, TPM-backed
/// store, encrypted database) or, during migration, the legacy unprotected
/// store. All methods are synchronous and must be safe to call from multiple
/// threads.
///
/// Contract:
/// * `get` of an absent key returns `Ok(None)`, never an error
/// * `delete` is idempotent; deleting an absent key succeeds
/// * `put` overwrites an existing value
pub trait SecretStore: Send + Sync {
    /// Store a value under the given key, overwriting any existing value
    fn put(&self, key: &str, value: &[u8]) -> KeyLifecycleResult<()>;

    /// Retrieve the value stored under the given key, if any
    fn get(&self, key: &str) -> KeyLifecycleResult<Option<Vec<u8>>>;

    /// Remove the value stored under the given key
    fn delete(&self, key: &str) -> KeyLifecycleResult<()>;

    /// Check whether a value exists under the given key
    fn exists(&self, key: &str) -> KeyLifecycleResult<bool>;
}

/// In-memory reference implementation of [`SecretStore`]
///
/// Used by tests and by embedders that have no platform store wired yet.
/// Reads take a shared lock so concurrent readers never block each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored
    pub fn len(&self) -> usize {
        self.entries.read().expect("store lock poisoned").len()
    }

    /// Check whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys currently present, in unspecified order
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl SecretStore for MemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> KeyLifecycleResult<()> {
        self.entries
            .write()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> KeyLifecycleResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> KeyLifecycleResult<()> {
        self.entries
            .write()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> KeyLifecycleResult<bool> {
        Ok(self
            .entries
            .read()
            .expect("store lock poisoned")
            .contains_key(key))
    }
}
