use super::*;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::KeyLifecycleError;
use crate::registry::KeyMetadata;

fn key_created_at(creation_date: DateTime<Utc>) -> KeyMetadata {
    let mut metadata = KeyMetadata::new_active(1, Duration::days(90)).unwrap();
    metadata.creation_date = creation_date;
    metadata.expiration_date = creation_date + Duration::days(90);
    metadata
}

fn at_hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, hour, 30, 0).unwrap()
}

#[test]
fn test_rotation_needed_without_current_key() {
    let policy = RotationPolicy::default();
    assert!(RotationPolicyEngine::is_rotation_needed(
        None,
        &policy,
        Utc::now()
    ));
    assert!(RotationPolicyEngine::is_rotation_overdue(
        None,
        &policy,
        Utc::now()
    ));
}

#[test]
fn test_rotation_needed_at_interval_boundary() {
    let policy = RotationPolicy::default();
    let now = Utc::now();

    let fresh = key_created_at(now - Duration::days(29));
    assert!(!RotationPolicyEngine::is_rotation_needed(
        Some(&fresh),
        &policy,
        now
    ));

    let due = key_created_at(now - Duration::days(31));
    assert!(RotationPolicyEngine::is_rotation_needed(
        Some(&due),
        &policy,
        now
    ));
    // Due is not yet overdue
    assert!(!RotationPolicyEngine::is_rotation_overdue(
        Some(&due),
        &policy,
        now
    ));
}

#[test]
fn test_rotation_overdue_at_max_age() {
    let policy = RotationPolicy::default();
    let now = Utc::now();

    let old = key_created_at(now - Duration::days(91));
    assert!(RotationPolicyEngine::is_rotation_overdue(
        Some(&old),
        &policy,
        now
    ));
}

#[test]
fn test_min_key_age_blocks_immediate_rerotation() {
    let policy = RotationPolicy::default();
    let now = Utc::now();

    let newborn = key_created_at(now - Duration::hours(1));
    let result = RotationPolicyEngine::is_allowed_now(Some(&newborn), &policy, now);
    assert!(matches!(
        result,
        Err(KeyLifecycleError::PolicyViolation { .. })
    ));

    let aged = key_created_at(now - Duration::days(2));
    assert!(RotationPolicyEngine::is_allowed_now(Some(&aged), &policy, now).is_ok());
}

#[test]
fn test_no_current_key_skips_min_age() {
    let policy = RotationPolicy::default();
    assert!(RotationPolicyEngine::is_allowed_now(None, &policy, Utc::now()).is_ok());
}

#[test]
fn test_quiet_hours_simple_window() {
    let quiet = QuietHours {
        start_hour: 9,
        end_hour: 17,
        timezone: "UTC".to_string(),
    };
    assert!(quiet.contains_hour(9));
    assert!(quiet.contains_hour(12));
    assert!(!quiet.contains_hour(17));
    assert!(!quiet.contains_hour(8));
    assert!(!quiet.contains_hour(23));
}

#[test]
fn test_quiet_hours_wrap_midnight() {
    let quiet = QuietHours {
        start_hour: 22,
        end_hour: 6,
        timezone: "UTC".to_string(),
    };
    assert!(quiet.contains_hour(22));
    assert!(quiet.contains_hour(23));
    assert!(quiet.contains_hour(0));
    assert!(quiet.contains_hour(5));
    assert!(!quiet.contains_hour(6));
    assert!(!quiet.contains_hour(12));
}

#[test]
fn test_quiet_hours_block_rotation() {
    let mut policy = RotationPolicy::default();
    policy.quiet_hours = Some(QuietHours {
        start_hour: 22,
        end_hour: 6,
        timezone: "UTC".to_string(),
    });

    let old_key = key_created_at(at_hour(2) - Duration::days(10));

    let blocked = RotationPolicyEngine::is_allowed_now(Some(&old_key), &policy, at_hour(2));
    assert!(matches!(
        blocked,
        Err(KeyLifecycleError::PolicyViolation { .. })
    ));

    let allowed = RotationPolicyEngine::is_allowed_now(Some(&old_key), &policy, at_hour(12));
    assert!(allowed.is_ok());
}

#[test]
fn test_validate_accepts_default() {
    assert!(RotationPolicyEngine::validate(&RotationPolicy::default()).is_ok());
}

#[test]
fn test_validate_rejects_non_positive_interval() {
    let mut policy = RotationPolicy::default();
    policy.interval = Duration::zero();
    assert!(matches!(
        RotationPolicyEngine::validate(&policy),
        Err(KeyLifecycleError::InvalidPolicy { .. })
    ));
}

#[test]
fn test_validate_rejects_max_age_below_interval() {
    let mut policy = RotationPolicy::default();
    policy.max_key_age = Duration::days(20);
    assert!(RotationPolicyEngine::validate(&policy).is_err());

    // Equality is also invalid: the ceiling must exceed the interval
    policy.max_key_age = policy.interval;
    assert!(RotationPolicyEngine::validate(&policy).is_err());
}

#[test]
fn test_validate_rejects_min_age_at_or_above_interval() {
    let mut policy = RotationPolicy::default();
    policy.min_key_age = Duration::days(30);
    assert!(RotationPolicyEngine::validate(&policy).is_err());
}

#[test]
fn test_validate_rejects_bad_quiet_hours() {
    let mut policy = RotationPolicy::default();
    policy.quiet_hours = Some(QuietHours {
        start_hour: 24,
        end_hour: 3,
        timezone: "UTC".to_string(),
    });
    assert!(RotationPolicyEngine::validate(&policy).is_err());

    policy.quiet_hours = Some(QuietHours {
        start_hour: 3,
        end_hour: 3,
        timezone: "UTC".to_string(),
    });
    assert!(RotationPolicyEngine::validate(&policy).is_err());
}
