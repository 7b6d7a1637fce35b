//! Mutation journal for the record collection.
//!
//! Every successful create/update/delete is recorded with its actor
//! and timestamp, kept in a bounded in-memory log and pushed on a feed
//! for live consumers.

use crate::feed::Feed;
use crate::model::StudentRecord;
use crate::types::{BusinessId, RecordId, Uid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Entries retained in memory before the oldest is dropped.
pub const AUDIT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub record_id: RecordId,
    pub business_id: BusinessId,
    pub action: ChangeAction,
    pub actor: Uid,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(record: &StudentRecord, action: ChangeAction, actor: &str) -> Self {
        Self {
            record_id: record.id.clone(),
            business_id: record.business_id.clone(),
            action,
            actor: actor.to_string(),
            at: Utc::now(),
        }
    }
}

pub struct AuditLog {
    feed: Feed<ChangeEvent>,
    entries: Mutex<VecDeque<ChangeEvent>>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            feed: Feed::new(),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, event: ChangeEvent) {
        log::info!(
            "{:?} record {} (student {}) by {}",
            event.action,
            event.record_id,
            event.business_id,
            event.actor
        );
        {
            let mut entries = self.entries.lock().unwrap();
            if entries.len() == AUDIT_CAPACITY {
                entries.pop_front();
            }
            entries.push_back(event.clone());
        }
        self.feed.publish(event);
    }

    /// Retained entries, oldest first.
    pub fn recent(&self) -> Vec<ChangeEvent> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn feed(&self) -> &Feed<ChangeEvent> {
        &self.feed
    }
}
