use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditEventKind, AuditLog};
use crate::error::{error_codes, KeyLifecycleError, KeyLifecycleResult};
use crate::migration::{DataChecksum, MigrationProgress, MigrationReport, MigrationStatus};
use crate::store::{backup_key, SecretStore, MIGRATION_PROGRESS_KEY};
use crate::utils;

/// Moves named secrets from the legacy store into the protected store
///
/// Each migration session runs a four-phase state machine (backup, migrate
/// with checksums, verify, complete) whose progress is persisted after every
/// phase transition. Sessions are independent by id and may run concurrently;
/// phases within one session must be applied serially, so callers advancing
/// the same session must serialize externally.
pub struct MigrationIntegrityEngine {
    legacy: Arc<dyn SecretStore>,
    protected: Arc<dyn SecretStore>,
    audit: Arc<AuditLog>,
}

impl MigrationIntegrityEngine {
    pub fn new(
        legacy: Arc<dyn SecretStore>,
        protected: Arc<dyn SecretStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            legacy,
            protected,
            audit,
        }
    }

    /// Migrate the named items from the legacy store to the protected store
    ///
    /// Under `dry_run` neither store is mutated: the backup phase is skipped,
    /// checksums are computed from the legacy values, and no progress record
    /// is written. A wet run that fails after its backup was taken rolls
    /// itself back automatically; both the migration error and any rollback
    /// error are surfaced.
    pub fn perform_secure_migration(
        &self,
        item_keys: &[String],
        dry_run: bool,
        session_id: Option<String>,
    ) -> KeyLifecycleResult<MigrationReport> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(
            "starting {} migration session '{}' over {} items",
            if dry_run { "dry-run" } else { "secure" },
            session_id,
            item_keys.len()
        );

        let mut progress = MigrationProgress::new(&session_id, item_keys.len());
        self.run_session(&mut progress, item_keys, dry_run)
    }

    /// Alias for a migration that mutates nothing
    pub fn perform_dry_run(&self, item_keys: &[String]) -> KeyLifecycleResult<MigrationReport> {
        self.perform_secure_migration(item_keys, true, None)
    }

    /// Resume a crashed or partially complete session
    ///
    /// Only valid from `PartiallyComplete` or `Failed`. The remaining item
    /// set is recomputed as all known items minus the ones already carrying a
    /// checksum, so work done before the crash is not repeated.
    pub fn resume_migration(&self, session_id: &str) -> KeyLifecycleResult<MigrationReport> {
        let mut progress = self
            .load_progress(session_id)?
            .ok_or_else(|| KeyLifecycleError::migration_session_not_found(session_id))?;

        if !progress.status.is_resumable() {
            return Err(KeyLifecycleError::MigrationError {
                operation: "resume_migration".to_string(),
                cause: format!("session is in state {:?}", progress.status),
                error_code: error_codes::MIGRATION_NOT_RESUMABLE,
                context: HashMap::new(),
            });
        }

        // Failed items are retried on resume; the error list stays as history
        progress.failed_items = 0;

        let known = self.known_items(&progress)?;
        info!(
            "resuming migration session '{}' with {} of {} items remaining",
            session_id,
            known.len() - progress.checksums.len(),
            known.len()
        );

        self.run_session(&mut progress, &known, false)
    }

    /// Restore a session's items to the legacy store
    ///
    /// Restores from the session's backup record when it still exists;
    /// otherwise reverses the move using the progress record's checksum map,
    /// verifying each value against its recorded hash on the way back. The
    /// backup record is deleted and the session ends `RolledBack`.
    pub fn rollback_migration(&self, session_id: &str) -> KeyLifecycleResult<()> {
        let mut progress = self
            .load_progress(session_id)?
            .ok_or_else(|| KeyLifecycleError::migration_session_not_found(session_id))?;

        self.rollback_locked(&mut progress)
    }

    /// The persisted progress of a session, if any
    pub fn migration_status(&self, session_id: &str) -> KeyLifecycleResult<Option<MigrationProgress>> {
        self.load_progress(session_id)
    }

    /// Ad hoc integrity probe outside any session
    ///
    /// For each key, hashes the value in both stores. An item verifies when a
    /// protected copy exists and, if a legacy copy also exists, both are
    /// byte-identical.
    pub fn verify_data_integrity(&self, item_keys: &[String]) -> KeyLifecycleResult<Vec<DataChecksum>> {
        let mut checksums = Vec::with_capacity(item_keys.len());
        for key in item_keys {
            let original = utils::checksum_of(self.legacy.get(key)?.as_deref());
            let migrated = utils::checksum_of(self.protected.get(key)?.as_deref());
            let verified = migrated != utils::EMPTY_CHECKSUM
                && (original == utils::EMPTY_CHECKSUM
                    || utils::checksums_match(&original, &migrated));
            checksums.push(DataChecksum {
                key: key.clone(),
                original_hash: original,
                migrated_hash: migrated,
                timestamp: Utc::now(),
                verified,
            });
        }
        Ok(checksums)
    }

    fn run_session(
        &self,
        progress: &mut MigrationProgress,
        item_keys: &[String],
        dry_run: bool,
    ) -> KeyLifecycleResult<MigrationReport> {
        match self.run_phases(progress, item_keys, dry_run) {
            Ok(()) => {
                self.record_outcome(progress, dry_run, None);
                Ok(MigrationReport::from_progress(progress, dry_run))
            }
            Err(e) => {
                error!(
                    "migration session '{}' failed: {}",
                    progress.session_id, e
                );
                progress.transition(MigrationStatus::Failed);
                progress.errors.push(e.to_string());
                if !dry_run {
                    // Best effort: the original failure must not be masked
                    // by a progress-write error
                    if let Err(persist_err) = self.persist_progress(progress) {
                        warn!(
                            "could not persist failed progress for session '{}': {}",
                            progress.session_id, persist_err
                        );
                    }
                }

                let final_error = if !dry_run && self.backup_exists(&progress.session_id)? {
                    match self.rollback_locked(progress) {
                        Ok(()) => e,
                        Err(rollback_err) => KeyLifecycleError::MigrationError {
                            operation: "perform_secure_migration".to_string(),
                            cause: format!(
                                "migration failed ({}); rollback also failed ({})",
                                e, rollback_err
                            ),
                            error_code: error_codes::MIGRATION_ROLLBACK_FAILED,
                            context: HashMap::new(),
                        },
                    }
                } else {
                    e
                };

                self.record_outcome(progress, dry_run, Some(&final_error));
                Err(final_error)
            }
        }
    }

    fn run_phases(
        &self,
        progress: &mut MigrationProgress,
        item_keys: &[String],
        dry_run: bool,
    ) -> KeyLifecycleResult<()> {
        // Phase 1: backup. Skipped entirely under dry run; a failure here
        // leaves the session failed with no further phases attempted.
        if !dry_run && !self.backup_exists(&progress.session_id)? {
            progress.transition(MigrationStatus::BackupInProgress);
            self.persist_progress(progress)?;

            let record = self.take_backup(item_keys)?;
            let location = backup_key(&progress.session_id);
            let serialized = serde_json::to_vec(&record)
                .map_err(|e| KeyLifecycleError::backup_failed(&e.to_string()))?;
            self.protected
                .put(&location, &serialized)
                .map_err(|e| KeyLifecycleError::backup_failed(&e.to_string()))?;

            progress.backup_location = Some(location);
            progress.transition(MigrationStatus::BackupCompleted);
            self.persist_progress(progress)?;
            debug!(
                "backup for session '{}' holds {} items",
                progress.session_id,
                record.len()
            );
        }

        // Phase 2: migrate with checksums. Items already carrying a checksum
        // were migrated by an earlier attempt and are skipped.
        progress.transition(MigrationStatus::MigrationInProgress);
        if !dry_run {
            self.persist_progress(progress)?;
        }

        for key in item_keys {
            if progress.checksums.contains_key(key) {
                continue;
            }

            match self.migrate_item(key, dry_run) {
                Ok(Some(checksum)) => {
                    progress.checksums.insert(key.clone(), checksum);
                    progress.completed_items += 1;
                }
                Ok(None) => {
                    debug!("item '{}' has no legacy value; skipped", key);
                }
                Err(e) => {
                    warn!("item '{}' failed to migrate: {}", key, e);
                    progress.failed_items += 1;
                    progress.errors.push(format!("{}: {}", key, e));
                    if !dry_run {
                        // Drop any partially written protected copy so a
                        // corrupt value can never be served
                        self.protected.delete(key)?;
                    }
                }
            }
        }
        progress.last_updated = Utc::now();
        if !dry_run {
            self.persist_progress(progress)?;
        }

        // Phase 3: verify every checksummed item against the protected store.
        // A dry run wrote nothing, so there is nothing to re-read.
        progress.transition(MigrationStatus::VerificationInProgress);
        if !dry_run {
            self.persist_progress(progress)?;
            for (key, expected) in &progress.checksums {
                let actual = utils::checksum_of(self.protected.get(key)?.as_deref());
                if !utils::checksums_match(expected, &actual) {
                    return Err(KeyLifecycleError::verification_failed(&format!(
                        "item '{}' hash diverged after migration: expected {}, got {}",
                        key, expected, actual
                    )));
                }
            }
        }

        // Phase 4: complete. Sessions with per-item failures stay resumable.
        if progress.failed_items > 0 {
            progress.transition(MigrationStatus::PartiallyComplete);
        } else {
            progress.transition(MigrationStatus::Completed);
            if !dry_run {
                self.protected.delete(&backup_key(&progress.session_id))?;
                progress.backup_location = None;
            }
        }
        if !dry_run {
            self.persist_progress(progress)?;
        }

        info!(
            "migration session '{}' finished: {} completed, {} failed",
            progress.session_id, progress.completed_items, progress.failed_items
        );
        Ok(())
    }

    /// Move one item, returning its content checksum
    ///
    /// `Ok(None)` means the item has no legacy value and was skipped. Wet
    /// runs write the protected copy, re-read it to confirm a bitwise match
    /// and only then remove the legacy copy.
    fn migrate_item(&self, key: &str, dry_run: bool) -> KeyLifecycleResult<Option<String>> {
        let value = match self.legacy.get(key)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let original_hash = utils::sha256_hex(&value);

        if !dry_run {
            self.protected.put(key, &value)?;
            let reread = self.protected.get(key)?;
            let migrated_hash = utils::checksum_of(reread.as_deref());
            if !utils::checksums_match(&original_hash, &migrated_hash) {
                return Err(KeyLifecycleError::checksum_mismatch(
                    key,
                    &original_hash,
                    &migrated_hash,
                ));
            }
            self.legacy.delete(key)?;
        }

        Ok(Some(original_hash))
    }

    fn take_backup(&self, item_keys: &[String]) -> KeyLifecycleResult<HashMap<String, String>> {
        let mut record = HashMap::new();
        for key in item_keys {
            let value = self
                .legacy
                .get(key)
                .map_err(|e| KeyLifecycleError::backup_failed(&e.to_string()))?;
            if let Some(value) = value {
                record.insert(key.clone(), base64::encode(&value));
            }
        }
        Ok(record)
    }

    fn rollback_locked(&self, progress: &mut MigrationProgress) -> KeyLifecycleResult<()> {
        let session_id = progress.session_id.clone();
        let location = backup_key(&session_id);

        match self.protected.get(&location)? {
            Some(serialized) => {
                let record: HashMap<String, String> = serde_json::from_slice(&serialized)?;
                info!(
                    "rolling back session '{}' from backup of {} items",
                    session_id,
                    record.len()
                );
                for (key, encoded) in record {
                    let value = base64::decode(&encoded).map_err(|e| {
                        KeyLifecycleError::MigrationError {
                            operation: "rollback_migration".to_string(),
                            cause: format!("backup value for '{}' is corrupt: {}", key, e),
                            error_code: error_codes::MIGRATION_ROLLBACK_FAILED,
                            context: HashMap::new(),
                        }
                    })?;
                    self.legacy.put(&key, &value)?;
                    self.protected.delete(&key)?;
                }
            }
            None => {
                // The backup was already removed (completed sessions delete
                // it); reverse the move from the protected copies instead,
                // verifying each value against its recorded checksum
                info!(
                    "rolling back session '{}' from protected copies",
                    session_id
                );
                for (key, expected) in &progress.checksums {
                    let value = self.protected.get(key)?.ok_or_else(|| {
                        KeyLifecycleError::MigrationError {
                            operation: "rollback_migration".to_string(),
                            cause: format!("no backup and no protected copy for '{}'", key),
                            error_code: error_codes::MIGRATION_ROLLBACK_FAILED,
                            context: HashMap::new(),
                        }
                    })?;
                    let actual = utils::sha256_hex(&value);
                    if !utils::checksums_match(expected, &actual) {
                        return Err(KeyLifecycleError::checksum_mismatch(
                            key, expected, &actual,
                        ));
                    }
                    self.legacy.put(key, &value)?;
                    self.protected.delete(key)?;
                }
            }
        }

        self.protected.delete(&location)?;
        progress.backup_location = None;
        progress.transition(MigrationStatus::RolledBack);
        self.persist_progress(progress)?;

        self.audit.record(
            AuditEvent::new(AuditEventKind::DataReencrypted, 0)
                .with_detail("operation", "rollback_migration")
                .with_detail("session_id", session_id),
        );
        Ok(())
    }

    /// All items a session knows about: the backed-up set plus everything
    /// already checksummed
    ///
    /// The migrate phase skips items that already carry a checksum, so
    /// passing the full known set back through `run_session` repeats only the
    /// remaining work.
    fn known_items(&self, progress: &MigrationProgress) -> KeyLifecycleResult<Vec<String>> {
        let mut known: BTreeSet<String> = progress.checksums.keys().cloned().collect();
        if let Some(serialized) = self.protected.get(&backup_key(&progress.session_id))? {
            let record: HashMap<String, String> = serde_json::from_slice(&serialized)?;
            known.extend(record.into_keys());
        }
        Ok(known.into_iter().collect())
    }

    fn backup_exists(&self, session_id: &str) -> KeyLifecycleResult<bool> {
        self.protected.exists(&backup_key(session_id))
    }

    fn persist_progress(&self, progress: &MigrationProgress) -> KeyLifecycleResult<()> {
        let serialized = serde_json::to_vec(progress)?;
        self.protected
            .put(MIGRATION_PROGRESS_KEY, &serialized)
            .map_err(|e| {
                KeyLifecycleError::storage_failure(
                    "persist_progress",
                    MIGRATION_PROGRESS_KEY,
                    &e.to_string(),
                    error_codes::STORE_PUT_FAILED,
                )
            })
    }

    fn load_progress(&self, session_id: &str) -> KeyLifecycleResult<Option<MigrationProgress>> {
        let Some(serialized) = self.protected.get(MIGRATION_PROGRESS_KEY)? else {
            return Ok(None);
        };
        let progress: MigrationProgress = serde_json::from_slice(&serialized)?;
        if progress.session_id == session_id {
            Ok(Some(progress))
        } else {
            Ok(None)
        }
    }

    fn record_outcome(
        &self,
        progress: &MigrationProgress,
        dry_run: bool,
        error: Option<&KeyLifecycleError>,
    ) {
        let mut event = AuditEvent::new(AuditEventKind::DataReencrypted, 0)
            .with_detail("operation", "secure_migration")
            .with_detail("session_id", progress.session_id.clone())
            .with_detail("status", format!("{:?}", progress.status))
            .with_detail("completed", progress.completed_items.to_string())
            .with_detail("failed", progress.failed_items.to_string())
            .with_detail("dry_run", dry_run.to_string());
        if let Some(e) = error {
            event = event.with_detail("error", e.error_type());
        }
        self.audit.record(event);
    }
}
