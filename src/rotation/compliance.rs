use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditEventKind, AuditLog};
use crate::policy::{RotationPolicy, RotationPolicyEngine};
use crate::registry::{KeyRegistry, KeyStatus};

/// Overall compliance verdict for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplianceLevel {
    Compliant,
    ActionRequired,
    Critical,
}

/// Severity of one compliance issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One finding raised by the compliance assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceIssue {
    pub severity: IssueSeverity,
    pub description: String,
}

/// Per-version summary inside a compliance report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVersionSummary {
    pub version: u32,
    pub key_id: String,
    pub status: KeyStatus,
    pub age_days: i64,
    pub access_count: usize,
    pub creation_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_date: Option<DateTime<Utc>>,
}

/// Compliance-status assessment for the reporting period
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStatus {
    pub overall: ComplianceLevel,
    pub issues: Vec<ComplianceIssue>,
    pub pci_dss_compliant: bool,
    pub soc2_compliant: bool,
}

/// Point-in-time compliance report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub generated_at: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub key_summaries: Vec<KeyVersionSummary>,
    /// Rotation events inside the period, newest first
    pub rotation_events: Vec<AuditEvent>,
    pub status: ComplianceStatus,
    pub total_key_accesses: usize,
    pub rotation_attempts: usize,
    /// Successful rotations over attempts; zero when no attempts were made
    pub rotation_success_rate: f64,
}

/// Stateless aggregation over registry and audit snapshots
///
/// No independent storage: every report is computed from the snapshots taken
/// at call time. An empty registry yields an empty report, not an error.
pub struct ComplianceReporter;

impl ComplianceReporter {
    pub fn generate(
        registry: &KeyRegistry,
        audit: &AuditLog,
        policy: &RotationPolicy,
        period: Duration,
        now: DateTime<Utc>,
    ) -> ComplianceReport {
        let period_start = now - period;
        let events = audit.snapshot();

        let mut key_summaries: Vec<KeyVersionSummary> = registry
            .snapshot()
            .into_values()
            .map(|metadata| {
                let access_count = events
                    .iter()
                    .filter(|e| {
                        e.event == AuditEventKind::KeyAccessed
                            && e.key_version == metadata.version
                    })
                    .count();
                KeyVersionSummary {
                    version: metadata.version,
                    key_id: metadata.key_id.clone(),
                    status: metadata.status,
                    age_days: metadata.age(now).num_days(),
                    access_count,
                    creation_date: metadata.creation_date,
                    rotation_date: metadata.rotation_date,
                }
            })
            .collect();
        key_summaries.sort_unstable_by(|a, b| b.version.cmp(&a.version));

        let mut rotation_events: Vec<AuditEvent> = events
            .iter()
            .filter(|e| {
                matches!(
                    e.event,
                    AuditEventKind::KeyRotated | AuditEventKind::KeyGenerated
                ) && e.timestamp >= period_start
                    && e.timestamp <= now
            })
            .cloned()
            .collect();
        rotation_events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let rotation_attempts = rotation_events.len();
        let successful_rotations = rotation_events
            .iter()
            .filter(|e| e.details.get("outcome").map(String::as_str) != Some("failed"))
            .count();
        let rotation_success_rate = if rotation_attempts == 0 {
            0.0
        } else {
            successful_rotations as f64 / rotation_attempts as f64
        };

        let total_key_accesses = events
            .iter()
            .filter(|e| e.event == AuditEventKind::KeyAccessed)
            .count();

        let status = Self::assess(registry, policy, now);

        ComplianceReport {
            generated_at: now,
            period_start,
            period_end: now,
            key_summaries,
            rotation_events,
            status,
            total_key_accesses,
            rotation_attempts,
            rotation_success_rate,
        }
    }

    fn assess(registry: &KeyRegistry, policy: &RotationPolicy, now: DateTime<Utc>) -> ComplianceStatus {
        let current = registry.current_metadata();

        // Nothing provisioned yet: nothing to assess
        if registry.is_empty() {
            return ComplianceStatus {
                overall: ComplianceLevel::Compliant,
                issues: Vec::new(),
                pci_dss_compliant: true,
                soc2_compliant: true,
            };
        }

        let mut issues = Vec::new();
        let overdue = RotationPolicyEngine::is_rotation_overdue(current.as_ref(), policy, now);
        let needed = RotationPolicyEngine::is_rotation_needed(current.as_ref(), policy, now);

        if overdue {
            issues.push(ComplianceIssue {
                severity: IssueSeverity::Critical,
                description: "current key exceeds the maximum allowed age".to_string(),
            });
        } else if needed {
            issues.push(ComplianceIssue {
                severity: IssueSeverity::High,
                description: "key rotation is due under the configured interval".to_string(),
            });
        }

        for metadata in registry.snapshot().into_values() {
            if metadata.status == KeyStatus::Compromised {
                issues.push(ComplianceIssue {
                    severity: IssueSeverity::High,
                    description: format!("key version {} is marked compromised", metadata.version),
                });
            }
        }

        let overall = if overdue {
            ComplianceLevel::Critical
        } else if issues.is_empty() {
            ComplianceLevel::Compliant
        } else {
            ComplianceLevel::ActionRequired
        };

        ComplianceStatus {
            overall,
            issues,
            pci_dss_compliant: !overdue,
            soc2_compliant: !overdue,
        }
    }
}
