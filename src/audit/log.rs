use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of events retained by the audit log
pub const MAX_AUDIT_EVENTS: usize = 10_000;

/// Security-relevant event categories
///
/// Closed enum: new categories are a format change for the persisted audit
/// array and must bump the record layout deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditEventKind {
    KeyGenerated,
    KeyRotated,
    KeyAccessed,
    KeyRetired,
    KeyCompromised,
    DataReencrypted,
    ComplianceCheck,
    RotationPolicyUpdated,
}

/// One immutable audit record
///
/// Events are never modified after being appended; the `details` map carries
/// free-form context such as failure causes and rotation reasons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEventKind,
    pub key_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub details: HashMap<String, String>,
}

impl AuditEvent {
    /// Create a new event stamped with the current time
    pub fn new(event: AuditEventKind, key_version: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
            key_version,
            user_id: None,
            details: HashMap::new(),
        }
    }

    /// Attach a user identity to the event
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach one key-value detail to the event
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Append-only, size-bounded audit log
///
/// Readers take a shared lock so `key_accessed` recording on the hot decrypt
/// path never serializes against report generation. Insertion order is
/// preserved internally; range queries return newest-first.
#[derive(Debug)]
pub struct AuditLog {
    events: RwLock<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(MAX_AUDIT_EVENTS)
    }
}

impl AuditLog {
    /// Create an empty log bounded at `max_events` entries
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events,
        }
    }

    /// Append an event, evicting the oldest entries beyond the cap
    pub fn record(&self, event: AuditEvent) {
        let mut events = self.events.write().expect("audit lock poisoned");
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.read().expect("audit lock poisoned").len()
    }

    /// Check whether the log holds no events
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All retained events in insertion order
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .expect("audit lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Events with `from <= timestamp <= to`, newest first
    pub fn events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<AuditEvent> {
        let mut matched: Vec<AuditEvent> = self
            .events
            .read()
            .expect("audit lock poisoned")
            .iter()
            .filter(|e| e.timestamp >= from && e.timestamp <= to)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched
    }

    /// Events of one kind in insertion order
    pub fn events_of_kind(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        self.events
            .read()
            .expect("audit lock poisoned")
            .iter()
            .filter(|e| e.event == kind)
            .cloned()
            .collect()
    }

    /// The most recent `count` events, newest first
    pub fn recent(&self, count: usize) -> Vec<AuditEvent> {
        self.events
            .read()
            .expect("audit lock poisoned")
            .iter()
            .rev()
            .take(count)
            .cloned()
            .collect()
    }

    /// Replace the log contents with previously persisted events
    ///
    /// Applies the cap to the incoming set: only the newest `max_events`
    /// entries by position survive.
    pub fn restore(&self, events: Vec<AuditEvent>) {
        let mut guard = self.events.write().expect("audit lock poisoned");
        let skip = events.len().saturating_sub(self.max_events);
        *guard = events.into_iter().skip(skip).collect();
    }
}
