use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditEventKind, AuditLog};
use crate::derivation::KeyDerivationService;
use crate::error::{error_codes, KeyLifecycleError, KeyLifecycleResult};
use crate::hardware::HardwareKeySource;
use crate::policy::{RotationPolicy, RotationPolicyEngine};
use crate::registry::{KeyMetadata, KeyRegistry, KeyStatus};
use crate::rotation::{ComplianceReport, ComplianceReporter};
use crate::secure_memory::SymmetricKey;
use crate::store::{SecretStore, KEY_ROTATION_AUDIT, KEY_ROTATION_METADATA};

/// Orchestrates versioned key rotation under compliance policy
///
/// Construct one coordinator at startup with its collaborators and thread
/// that instance through the application; the rotation guard is per-instance.
pub struct KeyRotationCoordinator<H: HardwareKeySource> {
    registry: Arc<KeyRegistry>,
    audit: Arc<AuditLog>,
    derivation: Arc<KeyDerivationService<H>>,
    store: Arc<dyn SecretStore>,
    policy: RwLock<RotationPolicy>,
    rotation_in_progress: AtomicBool,
}

/// Staged construction for [`KeyRotationCoordinator`]
///
/// A collaborator that was never wired surfaces as a typed
/// `NotInitialized` error from `build`, not a runtime abort later.
pub struct KeyRotationCoordinatorBuilder<H: HardwareKeySource> {
    registry: Option<Arc<KeyRegistry>>,
    audit: Option<Arc<AuditLog>>,
    derivation: Option<Arc<KeyDerivationService<H>>>,
    store: Option<Arc<dyn SecretStore>>,
    policy: RotationPolicy,
}

impl<H: HardwareKeySource> KeyRotationCoordinatorBuilder<H> {
    pub fn new() -> Self {
        Self {
            registry: None,
            audit: None,
            derivation: None,
            store: None,
            policy: RotationPolicy::default(),
        }
    }

    pub fn registry(mut self, registry: Arc<KeyRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn derivation(mut self, derivation: Arc<KeyDerivationService<H>>) -> Self {
        self.derivation = Some(derivation);
        self
    }

    pub fn store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> KeyLifecycleResult<KeyRotationCoordinator<H>> {
        RotationPolicyEngine::validate(&self.policy)?;

        Ok(KeyRotationCoordinator {
            registry: self
                .registry
                .ok_or_else(|| KeyLifecycleError::not_initialized("registry"))?,
            audit: self
                .audit
                .ok_or_else(|| KeyLifecycleError::not_initialized("audit"))?,
            derivation: self
                .derivation
                .ok_or_else(|| KeyLifecycleError::not_initialized("derivation"))?,
            store: self
                .store
                .ok_or_else(|| KeyLifecycleError::not_initialized("store"))?,
            policy: RwLock::new(self.policy),
            rotation_in_progress: AtomicBool::new(false),
        })
    }
}

impl<H: HardwareKeySource> Default for KeyRotationCoordinatorBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HardwareKeySource> KeyRotationCoordinator<H> {
    pub fn builder() -> KeyRotationCoordinatorBuilder<H> {
        KeyRotationCoordinatorBuilder::new()
    }

    /// The symmetric key for the current active version
    pub fn current_encryption_key(&self) -> KeyLifecycleResult<SymmetricKey> {
        self.key_for_version(self.registry.current_version())
    }

    /// The symmetric key for a specific version, for encryption use
    ///
    /// Restricted to the active version: retired and compromised versions
    /// fail with `InvalidKeyVersion`. Decrypt paths use
    /// [`key_for_decryption`](Self::key_for_decryption) instead. A
    /// `keyAccessed` audit event is recorded on every call.
    pub fn key_for_version(&self, version: u32) -> KeyLifecycleResult<SymmetricKey> {
        let result = self.lookup_key(version, false);
        self.record_access(version, "encrypt", &result);
        result
    }

    /// The symmetric key for a specific version, for decryption use
    ///
    /// Accepts retired versions so that old ciphertext stays readable;
    /// compromised and pending versions are still rejected.
    pub fn key_for_decryption(&self, version: u32) -> KeyLifecycleResult<SymmetricKey> {
        let result = self.lookup_key(version, true);
        self.record_access(version, "decrypt", &result);
        result
    }

    fn lookup_key(&self, version: u32, allow_retired: bool) -> KeyLifecycleResult<SymmetricKey> {
        let metadata = self
            .registry
            .get(version)
            .ok_or_else(|| KeyLifecycleError::key_version_not_found(version))?;

        match metadata.status {
            KeyStatus::Active => {}
            KeyStatus::Retired if allow_retired => {}
            KeyStatus::Retired => {
                return Err(KeyLifecycleError::invalid_key_version(
                    version,
                    "version is retired; retired keys decrypt only",
                    error_codes::KEY_VERSION_NOT_ACTIVE,
                ));
            }
            KeyStatus::Compromised => {
                return Err(KeyLifecycleError::invalid_key_version(
                    version,
                    "version is marked compromised",
                    error_codes::KEY_VERSION_COMPROMISED,
                ));
            }
            KeyStatus::Pending => {
                return Err(KeyLifecycleError::invalid_key_version(
                    version,
                    "version is pending activation",
                    error_codes::KEY_VERSION_PENDING,
                ));
            }
        }

        self.derivation.derive_for_version(version, &metadata)
    }

    fn record_access(&self, version: u32, purpose: &str, result: &KeyLifecycleResult<SymmetricKey>) {
        let mut event = AuditEvent::new(AuditEventKind::KeyAccessed, version)
            .with_detail("purpose", purpose);
        if let Err(e) = result {
            event = event
                .with_detail("outcome", "denied")
                .with_detail("error", e.error_type());
        }
        self.audit.record(event);
    }

    /// Rotate to a new key version
    ///
    /// Mutually exclusive per instance: a second concurrent call fails
    /// immediately with `RotationInProgress` instead of blocking. The
    /// sequence is gate on policy, allocate the next version with a fresh
    /// salt, activate it, retire the predecessor, record the audit event,
    /// persist registry and audit state. A failed attempt records a failure
    /// event carrying the error detail before propagating.
    pub fn rotate_key(&self, reason: &str) -> KeyLifecycleResult<u32> {
        let result = if self
            .rotation_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("rotation requested while another rotation is in progress");
            Err(KeyLifecycleError::rotation_in_progress())
        } else {
            let outcome = self.rotate_key_locked(reason);
            self.rotation_in_progress.store(false, Ordering::Release);
            outcome
        };

        if let Err(e) = &result {
            error!("key rotation failed: {}", e);
            self.audit.record(
                AuditEvent::new(AuditEventKind::KeyRotated, self.registry.current_version())
                    .with_detail("outcome", "failed")
                    .with_detail("reason", reason)
                    .with_detail("error", e.to_string()),
            );
        }

        result
    }

    fn rotate_key_locked(&self, reason: &str) -> KeyLifecycleResult<u32> {
        let policy = self.rotation_policy();
        let now = Utc::now();
        let previous = self.registry.current_metadata();

        RotationPolicyEngine::is_allowed_now(previous.as_ref(), &policy, now)?;

        let new_version = self.registry.current_version() + 1;
        debug!("rotating to key version {} ({})", new_version, reason);

        let mut metadata = KeyMetadata::new_active(new_version, policy.max_key_age)?;
        metadata.derivation_info = self.derivation.fresh_derivation_info()?;
        self.registry.put(metadata);

        match &previous {
            Some(prev) => {
                self.registry.retire(prev.version, now)?;
                self.audit.record(
                    AuditEvent::new(AuditEventKind::KeyRetired, prev.version)
                        .with_detail("superseded_by", new_version.to_string()),
                );
                self.audit.record(
                    AuditEvent::new(AuditEventKind::KeyRotated, new_version)
                        .with_detail("reason", reason)
                        .with_detail("previous_version", prev.version.to_string()),
                );
            }
            None => {
                self.audit.record(
                    AuditEvent::new(AuditEventKind::KeyGenerated, new_version)
                        .with_detail("reason", reason),
                );
            }
        }

        self.persist_state()?;
        info!("key rotated to version {}", new_version);

        Ok(new_version)
    }

    /// Mark a version compromised and persist the transition
    ///
    /// The version becomes unusable for both encryption and decryption;
    /// callers should rotate immediately afterwards if the compromised
    /// version was active.
    pub fn mark_key_compromised(&self, version: u32, reason: &str) -> KeyLifecycleResult<()> {
        self.registry.mark_compromised(version)?;
        self.audit.record(
            AuditEvent::new(AuditEventKind::KeyCompromised, version)
                .with_detail("reason", reason),
        );
        self.persist_state()?;
        warn!("key version {} marked compromised: {}", version, reason);
        Ok(())
    }

    /// Record the start of a background re-encryption pass
    ///
    /// Bulk re-encryption of application data is not performed inside the
    /// rotation call; it is an explicitly invoked background operation whose
    /// execution belongs to the embedding application. This entry point
    /// records the forensically relevant event with the configured batch
    /// size.
    pub fn reencrypt_application_data(&self, reason: &str) -> KeyLifecycleResult<()> {
        let batch_size = self.rotation_policy().reencryption_batch_size;
        self.audit.record(
            AuditEvent::new(AuditEventKind::DataReencrypted, self.registry.current_version())
                .with_detail("reason", reason)
                .with_detail("batch_size", batch_size.to_string()),
        );
        self.persist_state()
    }

    /// Whether rotation is due under the configured interval
    pub fn is_rotation_needed(&self) -> bool {
        let policy = self.rotation_policy();
        RotationPolicyEngine::is_rotation_needed(
            self.registry.current_metadata().as_ref(),
            &policy,
            Utc::now(),
        )
    }

    /// Whether the current key has exceeded the hard compliance ceiling
    pub fn is_rotation_overdue(&self) -> bool {
        let policy = self.rotation_policy();
        RotationPolicyEngine::is_rotation_overdue(
            self.registry.current_metadata().as_ref(),
            &policy,
            Utc::now(),
        )
    }

    /// Rotate immediately when overdue
    ///
    /// Returns the new version when a rotation ran, `None` when the current
    /// key is within its allowed age. Goes through the same guarded
    /// `rotate_key` entry point, so a manual and an automatic rotation can
    /// never interleave.
    pub fn force_rotation_if_overdue(&self) -> KeyLifecycleResult<Option<u32>> {
        if !self.is_rotation_overdue() {
            return Ok(None);
        }
        self.rotate_key("max key age exceeded").map(Some)
    }

    /// One tick of background auto-rotation
    ///
    /// Invoked by the embedding application's own scheduler or task runner;
    /// no timer lives inside the library. Does nothing unless the policy has
    /// auto-rotation enabled and a rotation is due, and goes through the
    /// guarded `rotate_key` entry point, so a tick can never interleave with
    /// a manual rotation. A tick that loses the guard race or lands inside
    /// quiet hours reports the typed error and the scheduler simply tries
    /// again later.
    pub fn auto_rotation_tick(&self) -> KeyLifecycleResult<Option<u32>> {
        if !self.rotation_policy().auto_rotation_enabled {
            return Ok(None);
        }
        if !self.is_rotation_needed() {
            return Ok(None);
        }
        self.rotate_key("automatic rotation").map(Some)
    }

    /// Validate and install a new rotation policy
    pub fn update_rotation_policy(&self, policy: RotationPolicy) -> KeyLifecycleResult<()> {
        RotationPolicyEngine::validate(&policy)?;

        *self.policy.write().expect("policy lock poisoned") = policy;
        self.audit.record(
            AuditEvent::new(
                AuditEventKind::RotationPolicyUpdated,
                self.registry.current_version(),
            ),
        );
        self.persist_state()?;
        info!("rotation policy updated");
        Ok(())
    }

    /// Snapshot of the currently installed policy
    pub fn rotation_policy(&self) -> RotationPolicy {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    /// Assemble a point-in-time compliance report over the trailing `period`
    pub fn generate_compliance_report(&self, period: Duration) -> ComplianceReport {
        let policy = self.rotation_policy();
        let report =
            ComplianceReporter::generate(&self.registry, &self.audit, &policy, period, Utc::now());
        self.audit.record(
            AuditEvent::new(AuditEventKind::ComplianceCheck, self.registry.current_version())
                .with_detail("overall", format!("{:?}", report.status.overall)),
        );
        report
    }

    /// Audit events with timestamps inside the inclusive range, newest first
    pub fn audit_trail(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<AuditEvent> {
        self.audit.events_in_range(from, to)
    }

    /// Versions currently active, sorted descending
    pub fn active_versions(&self) -> Vec<u32> {
        self.registry.active_versions()
    }

    /// The current key version number
    pub fn current_version(&self) -> u32 {
        self.registry.current_version()
    }

    /// Write the registry and audit documents to the protected store
    ///
    /// Both documents are whole-state snapshots, so a retried write after a
    /// failure cannot leave a partially updated record.
    pub fn persist_state(&self) -> KeyLifecycleResult<()> {
        let metadata_json = serde_json::to_vec(&self.registry.to_persistable())?;
        self.store
            .put(KEY_ROTATION_METADATA, &metadata_json)
            .map_err(|e| {
                KeyLifecycleError::storage_failure(
                    "persist_metadata",
                    KEY_ROTATION_METADATA,
                    &e.to_string(),
                    error_codes::STORE_PUT_FAILED,
                )
            })?;

        let audit_json = serde_json::to_vec(&self.audit.snapshot())?;
        self.store.put(KEY_ROTATION_AUDIT, &audit_json).map_err(|e| {
            KeyLifecycleError::storage_failure(
                "persist_audit",
                KEY_ROTATION_AUDIT,
                &e.to_string(),
                error_codes::STORE_PUT_FAILED,
            )
        })
    }

    /// Reload registry and audit state from the protected store
    ///
    /// Missing documents are not an error: a fresh install simply starts
    /// empty.
    pub fn load_state(&self) -> KeyLifecycleResult<()> {
        if let Some(bytes) = self.store.get(KEY_ROTATION_METADATA)? {
            let persisted = serde_json::from_slice(&bytes)?;
            self.registry.restore(persisted)?;
        }

        if let Some(bytes) = self.store.get(KEY_ROTATION_AUDIT)? {
            let events = serde_json::from_slice(&bytes)?;
            self.audit.restore(events);
        }

        Ok(())
    }
}
