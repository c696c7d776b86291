use chrono::{DateTime, Duration, Timelike, Utc};

use crate::error::{error_codes, KeyLifecycleError, KeyLifecycleResult};
use crate::registry::KeyMetadata;

/// Compliance regime governing how strictly the policy is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceMode {
    Strict,
    Standard,
    Basic,
}

/// A daily wall-clock window during which rotation is disallowed
///
/// Hours are 0-23. `start_hour > end_hour` means the window spans midnight:
/// `{ start_hour: 22, end_hour: 6 }` covers 22:00-05:59. The start hour is
/// inside the window, the end hour is outside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
    /// IANA timezone label; informational, comparisons use the caller's `now`
    pub timezone: String,
}

impl QuietHours {
    /// Whether the given hour-of-day falls inside the window
    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // Window spans midnight
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Configured rotation cadence and constraints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Target rotation cadence
    pub interval: Duration,
    /// Hard compliance ceiling on key age
    pub max_key_age: Duration,
    /// Floor preventing rotation thrash
    pub min_key_age: Duration,
    pub auto_rotation_enabled: bool,
    pub compliance_mode: ComplianceMode,
    /// Items per batch for background re-encryption
    pub reencryption_batch_size: usize,
    pub quiet_hours: Option<QuietHours>,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::days(30),
            max_key_age: Duration::days(90),
            min_key_age: Duration::days(1),
            auto_rotation_enabled: true,
            compliance_mode: ComplianceMode::Standard,
            reencryption_batch_size: 100,
            quiet_hours: None,
        }
    }
}

/// Pure decision logic over a key metadata snapshot and a policy
pub struct RotationPolicyEngine;

impl RotationPolicyEngine {
    /// Whether a rotation is due
    ///
    /// True when no current key exists, or when the current key has reached
    /// the policy interval.
    pub fn is_rotation_needed(
        current: Option<&KeyMetadata>,
        policy: &RotationPolicy,
        now: DateTime<Utc>,
    ) -> bool {
        match current {
            None => true,
            Some(metadata) => metadata.age(now) >= policy.interval,
        }
    }

    /// Whether the current key has exceeded the hard compliance ceiling
    pub fn is_rotation_overdue(
        current: Option<&KeyMetadata>,
        policy: &RotationPolicy,
        now: DateTime<Utc>,
    ) -> bool {
        match current {
            None => true,
            Some(metadata) => metadata.age(now) >= policy.max_key_age,
        }
    }

    /// Whether a rotation may run at `now`
    ///
    /// Fails with a policy violation when `now` falls inside quiet hours or
    /// when the current key is younger than the minimum key age. A missing
    /// current key only has the quiet-hours constraint.
    pub fn is_allowed_now(
        current: Option<&KeyMetadata>,
        policy: &RotationPolicy,
        now: DateTime<Utc>,
    ) -> KeyLifecycleResult<()> {
        if let Some(quiet) = &policy.quiet_hours {
            if quiet.contains_hour(now.hour()) {
                return Err(KeyLifecycleError::policy_violation(
                    "quiet_hours",
                    &format!(
                        "rotation attempted at hour {} inside window {}-{}",
                        now.hour(),
                        quiet.start_hour,
                        quiet.end_hour
                    ),
                    error_codes::QUIET_HOURS_ACTIVE,
                ));
            }
        }

        if let Some(metadata) = current {
            let age = metadata.age(now);
            if age < policy.min_key_age {
                return Err(KeyLifecycleError::policy_violation(
                    "min_key_age",
                    &format!(
                        "current key is {} minutes old, minimum is {} minutes",
                        age.num_minutes(),
                        policy.min_key_age.num_minutes()
                    ),
                    error_codes::MIN_KEY_AGE_NOT_REACHED,
                ));
            }
        }

        Ok(())
    }

    /// Validate a policy's internal consistency
    pub fn validate(policy: &RotationPolicy) -> KeyLifecycleResult<()> {
        if policy.interval <= Duration::zero() {
            return Err(KeyLifecycleError::invalid_policy(
                "interval",
                "rotation interval must be positive",
                error_codes::INVALID_ROTATION_INTERVAL,
            ));
        }

        if policy.max_key_age <= policy.interval {
            return Err(KeyLifecycleError::invalid_policy(
                "max_key_age",
                "maximum key age must exceed the rotation interval",
                error_codes::INVALID_MAX_KEY_AGE,
            ));
        }

        if policy.min_key_age >= policy.interval {
            return Err(KeyLifecycleError::invalid_policy(
                "min_key_age",
                "minimum key age must be below the rotation interval",
                error_codes::INVALID_MIN_KEY_AGE,
            ));
        }

        if let Some(quiet) = &policy.quiet_hours {
            if quiet.start_hour > 23 || quiet.end_hour > 23 {
                return Err(KeyLifecycleError::invalid_policy(
                    "quiet_hours",
                    "hours must be in 0-23",
                    error_codes::INVALID_QUIET_HOURS,
                ));
            }
            if quiet.start_hour == quiet.end_hour {
                return Err(KeyLifecycleError::invalid_policy(
                    "quiet_hours",
                    "window must not be empty",
                    error_codes::INVALID_QUIET_HOURS,
                ));
            }
        }

        Ok(())
    }
}
