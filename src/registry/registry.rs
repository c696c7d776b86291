use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditEvent;
use crate::error::{KeyLifecycleError, KeyLifecycleResult};
use crate::utils;

/// Lifecycle status of one key version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyStatus {
    /// The current encryption key; at most one version is active at a time
    Active,
    /// Superseded by a newer version, retained for decryption
    Retired,
    /// Marked unusable after a suspected compromise
    Compromised,
    /// Created but not yet activated
    Pending,
}

/// Symmetric cipher a key version is intended for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyAlgorithm {
    Aes256Gcm,
    ChaCha20Poly1305,
}

/// Derivation function used to produce a version's key material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivationAlgorithm {
    HkdfSha256,
}

/// Parameters that make a version's derivation reproducible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationInfo {
    /// 32 random bytes generated fresh per version at creation time
    #[serde(with = "utils::hex_serde")]
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub algorithm: DerivationAlgorithm,
}

/// Compliance posture recorded on each key version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceInfo {
    pub pci_dss_compliant: bool,
    pub soc2_compliant: bool,
    pub last_audit_date: Option<DateTime<Utc>>,
    /// Embedded subset of audit events relevant to this version
    #[serde(default)]
    pub audit_events: Vec<AuditEvent>,
}

impl Default for ComplianceInfo {
    fn default() -> Self {
        Self {
            pci_dss_compliant: true,
            soc2_compliant: true,
            last_audit_date: None,
            audit_events: Vec::new(),
        }
    }
}

/// Metadata for one generation of a symmetric key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    /// Monotonically increasing positive integer, unique per version
    pub version: u32,
    /// Stable identifier derived from the version
    pub key_id: String,
    pub creation_date: DateTime<Utc>,
    /// Set when the version is retired by a rotation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_date: Option<DateTime<Utc>>,
    pub expiration_date: DateTime<Utc>,
    pub status: KeyStatus,
    pub algorithm: KeyAlgorithm,
    pub derivation_info: DerivationInfo,
    pub compliance_info: ComplianceInfo,
}

impl KeyMetadata {
    /// Create active metadata for a new version with a fresh random salt
    pub fn new_active(version: u32, max_key_age: Duration) -> KeyLifecycleResult<Self> {
        let now = Utc::now();
        Ok(Self {
            version,
            key_id: Self::key_id_for_version(version),
            creation_date: now,
            rotation_date: None,
            expiration_date: now + max_key_age,
            status: KeyStatus::Active,
            algorithm: KeyAlgorithm::Aes256Gcm,
            derivation_info: DerivationInfo {
                salt: utils::random_salt()?,
                iterations: 1,
                algorithm: DerivationAlgorithm::HkdfSha256,
            },
            compliance_info: ComplianceInfo::default(),
        })
    }

    /// The stable identifier for a version
    pub fn key_id_for_version(version: u32) -> String {
        format!("key-v{}", version)
    }

    /// Age of this key version relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.creation_date
    }
}

/// Thread-safe map of key version to metadata
///
/// Reader-writer discipline: lookups and listings take a shared lock so that
/// report generation never blocks the hot decrypt path; upserts and status
/// transitions take the exclusive lock briefly.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    versions: RwLock<HashMap<u32, KeyMetadata>>,
}

impl KeyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up metadata for a version
    pub fn get(&self, version: u32) -> Option<KeyMetadata> {
        self.versions
            .read()
            .expect("registry lock poisoned")
            .get(&version)
            .cloned()
    }

    /// Insert or replace metadata for its version
    pub fn put(&self, metadata: KeyMetadata) {
        self.versions
            .write()
            .expect("registry lock poisoned")
            .insert(metadata.version, metadata);
    }

    /// Versions with status active, sorted descending
    ///
    /// In steady state at most one version is active; during a rotation's
    /// transitional window the API tolerates more.
    pub fn active_versions(&self) -> Vec<u32> {
        let mut versions: Vec<u32> = self
            .versions
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|m| m.status == KeyStatus::Active)
            .map(|m| m.version)
            .collect();
        versions.sort_unstable_by(|a, b| b.cmp(a));
        versions
    }

    /// The current version number
    ///
    /// The highest active version; when no version is active (all
    /// compromised, or the registry is empty) the highest known version, so
    /// rotation still allocates the next number correctly. Zero for an empty
    /// registry.
    pub fn current_version(&self) -> u32 {
        let versions = self.versions.read().expect("registry lock poisoned");
        versions
            .values()
            .filter(|m| m.status == KeyStatus::Active)
            .map(|m| m.version)
            .max()
            .or_else(|| versions.keys().copied().max())
            .unwrap_or(0)
    }

    /// Metadata of the current active version, if one exists
    pub fn current_metadata(&self) -> Option<KeyMetadata> {
        let versions = self.versions.read().expect("registry lock poisoned");
        versions
            .values()
            .filter(|m| m.status == KeyStatus::Active)
            .max_by_key(|m| m.version)
            .cloned()
    }

    /// Transition a version to retired, stamping its rotation date
    ///
    /// All other metadata is preserved so old ciphertext stays decryptable.
    pub fn retire(&self, version: u32, rotation_date: DateTime<Utc>) -> KeyLifecycleResult<()> {
        let mut versions = self.versions.write().expect("registry lock poisoned");
        let metadata = versions
            .get_mut(&version)
            .ok_or_else(|| KeyLifecycleError::key_version_not_found(version))?;
        metadata.status = KeyStatus::Retired;
        metadata.rotation_date = Some(rotation_date);
        Ok(())
    }

    /// Transition a version to compromised
    pub fn mark_compromised(&self, version: u32) -> KeyLifecycleResult<()> {
        let mut versions = self.versions.write().expect("registry lock poisoned");
        let metadata = versions
            .get_mut(&version)
            .ok_or_else(|| KeyLifecycleError::key_version_not_found(version))?;
        metadata.status = KeyStatus::Compromised;
        Ok(())
    }

    /// Number of known versions
    pub fn len(&self) -> usize {
        self.versions.read().expect("registry lock poisoned").len()
    }

    /// Check whether the registry holds no versions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all metadata, keyed by version
    pub fn snapshot(&self) -> HashMap<u32, KeyMetadata> {
        self.versions
            .read()
            .expect("registry lock poisoned")
            .clone()
    }

    /// The persisted representation: a map keyed by version string
    pub fn to_persistable(&self) -> HashMap<String, KeyMetadata> {
        self.versions
            .read()
            .expect("registry lock poisoned")
            .iter()
            .map(|(version, metadata)| (version.to_string(), metadata.clone()))
            .collect()
    }

    /// Replace the registry contents with previously persisted metadata
    pub fn restore(&self, persisted: HashMap<String, KeyMetadata>) -> KeyLifecycleResult<()> {
        let mut versions = HashMap::with_capacity(persisted.len());
        for (key, metadata) in persisted {
            let version: u32 = key.parse().map_err(|_| {
                KeyLifecycleError::invalid_parameter("version", "positive integer", &key)
            })?;
            versions.insert(version, metadata);
        }

        *self.versions.write().expect("registry lock poisoned") = versions;
        Ok(())
    }
}
