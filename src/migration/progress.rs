use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of one migration session
///
/// The happy path runs `NotStarted -> BackupInProgress -> BackupCompleted ->
/// MigrationInProgress -> VerificationInProgress -> Completed`. `Failed` and
/// `RolledBack` are terminal; `PartiallyComplete` marks a session that
/// finished with per-item failures and may be resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationStatus {
    NotStarted,
    BackupInProgress,
    BackupCompleted,
    MigrationInProgress,
    VerificationInProgress,
    Completed,
    Failed,
    RolledBack,
    PartiallyComplete,
}

impl MigrationStatus {
    /// Whether a session in this status may be resumed
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            MigrationStatus::PartiallyComplete | MigrationStatus::Failed
        )
    }
}

/// Mutable progress record for one migration session
///
/// Owned exclusively by the integrity engine for the session's duration and
/// persisted after every phase transition so a crashed session can be
/// reloaded by `session_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    pub session_id: String,
    pub status: MigrationStatus,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Ordered per-item failure messages
    pub errors: Vec<String>,
    /// Item key -> content hash, only for successfully migrated items
    pub checksums: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_location: Option<String>,
}

impl MigrationProgress {
    pub fn new(session_id: impl Into<String>, total_items: usize) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            status: MigrationStatus::NotStarted,
            total_items,
            completed_items: 0,
            failed_items: 0,
            start_time: now,
            last_updated: now,
            errors: Vec::new(),
            checksums: HashMap::new(),
            backup_location: None,
        }
    }

    /// Move to a new phase, stamping the update time
    pub fn transition(&mut self, status: MigrationStatus) {
        self.status = status;
        self.last_updated = Utc::now();
    }

    /// Completed over processed items; zero when nothing was processed
    pub fn success_rate(&self) -> f64 {
        let processed = self.completed_items + self.failed_items;
        if processed == 0 {
            0.0
        } else {
            self.completed_items as f64 / processed as f64
        }
    }

    /// Processed over total items as a percentage; zero for an empty set
    pub fn progress_percentage(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            (self.completed_items + self.failed_items) as f64 / self.total_items as f64 * 100.0
        }
    }
}

/// Result of comparing one item's content between stores
///
/// Derived on demand; not independently persisted beyond the progress
/// record's checksum map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChecksum {
    pub key: String,
    pub original_hash: String,
    pub migrated_hash: String,
    pub timestamp: DateTime<Utc>,
    pub verified: bool,
}

/// Read-only view of a finished (or stopped) migration session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub session_id: String,
    pub status: MigrationStatus,
    pub dry_run: bool,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    pub errors: Vec<String>,
    pub checksums: HashMap<String, String>,
    pub start_time: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success_rate: f64,
    pub progress_percentage: f64,
}

impl MigrationReport {
    pub fn from_progress(progress: &MigrationProgress, dry_run: bool) -> Self {
        Self {
            session_id: progress.session_id.clone(),
            status: progress.status,
            dry_run,
            total_items: progress.total_items,
            completed_items: progress.completed_items,
            failed_items: progress.failed_items,
            errors: progress.errors.clone(),
            checksums: progress.checksums.clone(),
            start_time: progress.start_time,
            finished_at: Utc::now(),
            success_rate: progress.success_rate(),
            progress_percentage: progress.progress_percentage(),
        }
    }
}
