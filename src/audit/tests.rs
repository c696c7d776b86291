use super::*;
use chrono::{Duration, Utc};
use proptest::prelude::*;

#[test]
fn test_record_and_snapshot_preserve_insertion_order() {
    let log = AuditLog::default();
    log.record(AuditEvent::new(AuditEventKind::KeyGenerated, 1));
    log.record(AuditEvent::new(AuditEventKind::KeyRotated, 2));
    log.record(AuditEvent::new(AuditEventKind::KeyRetired, 1));

    let events = log.snapshot();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].event, AuditEventKind::KeyGenerated);
    assert_eq!(events[2].event, AuditEventKind::KeyRetired);
}

#[test]
fn test_cap_evicts_oldest_first() {
    let log = AuditLog::new(3);
    for version in 1..=5u32 {
        log.record(AuditEvent::new(AuditEventKind::KeyAccessed, version));
    }

    let events = log.snapshot();
    assert_eq!(events.len(), 3);
    // Versions 1 and 2 were evicted
    assert_eq!(events[0].key_version, 3);
    assert_eq!(events[2].key_version, 5);
}

#[test]
fn test_events_in_range_is_inclusive_and_newest_first() {
    let log = AuditLog::default();

    let mut early = AuditEvent::new(AuditEventKind::KeyRotated, 1);
    early.timestamp = Utc::now() - Duration::hours(2);
    let mut mid = AuditEvent::new(AuditEventKind::KeyRotated, 2);
    mid.timestamp = Utc::now() - Duration::hours(1);
    let late = AuditEvent::new(AuditEventKind::KeyRotated, 3);

    let from = early.timestamp;
    let to = mid.timestamp;

    log.record(early);
    log.record(mid);
    log.record(late);

    let ranged = log.events_in_range(from, to);
    assert_eq!(ranged.len(), 2);
    // Newest first
    assert_eq!(ranged[0].key_version, 2);
    assert_eq!(ranged[1].key_version, 1);
}

#[test]
fn test_events_of_kind_filters() {
    let log = AuditLog::default();
    log.record(AuditEvent::new(AuditEventKind::KeyAccessed, 1));
    log.record(AuditEvent::new(AuditEventKind::KeyRotated, 2));
    log.record(AuditEvent::new(AuditEventKind::KeyAccessed, 2));

    let accessed = log.events_of_kind(AuditEventKind::KeyAccessed);
    assert_eq!(accessed.len(), 2);
}

#[test]
fn test_recent_returns_newest_first() {
    let log = AuditLog::default();
    for version in 1..=4u32 {
        log.record(AuditEvent::new(AuditEventKind::KeyAccessed, version));
    }

    let recent = log.recent(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].key_version, 4);
    assert_eq!(recent[1].key_version, 3);
}

#[test]
fn test_event_builder_details() {
    let event = AuditEvent::new(AuditEventKind::KeyRotated, 3)
        .with_user("operator-7")
        .with_detail("reason", "scheduled");

    assert_eq!(event.user_id.as_deref(), Some("operator-7"));
    assert_eq!(event.details.get("reason").map(String::as_str), Some("scheduled"));
}

#[test]
fn test_serde_round_trip() {
    let log = AuditLog::default();
    log.record(
        AuditEvent::new(AuditEventKind::KeyRotated, 2).with_detail("reason", "scheduled"),
    );

    let json = serde_json::to_string(&log.snapshot()).unwrap();
    let events: Vec<AuditEvent> = serde_json::from_str(&json).unwrap();

    let restored = AuditLog::default();
    restored.restore(events);
    assert_eq!(restored.len(), 1);
    assert_eq!(restored.snapshot()[0].event, AuditEventKind::KeyRotated);
}

#[test]
fn test_restore_applies_cap() {
    let events: Vec<AuditEvent> = (1..=10u32)
        .map(|v| AuditEvent::new(AuditEventKind::KeyAccessed, v))
        .collect();

    let log = AuditLog::new(4);
    log.restore(events);

    let kept = log.snapshot();
    assert_eq!(kept.len(), 4);
    assert_eq!(kept[0].key_version, 7);
    assert_eq!(kept[3].key_version, 10);
}

proptest! {
    // Retention property: after inserting any number of events, the survivors
    // are exactly the most recent `cap` by insertion order.
    #[test]
    fn prop_retention_keeps_newest(total in 1usize..400, cap in 1usize..50) {
        let log = AuditLog::new(cap);
        for version in 0..total {
            log.record(AuditEvent::new(AuditEventKind::KeyAccessed, version as u32));
        }

        let events = log.snapshot();
        let expected_len = total.min(cap);
        prop_assert_eq!(events.len(), expected_len);

        let first_surviving = (total - expected_len) as u32;
        for (offset, event) in events.iter().enumerate() {
            prop_assert_eq!(event.key_version, first_surviving + offset as u32);
        }
    }
}
