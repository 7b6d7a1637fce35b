//! In-memory record store.
//!
//! Holds an ordered collection behind one lock. Every mutation applies
//! the change and re-emits the filtered view to every subscriber whose
//! scope is touched, all under that lock — no subscriber ever observes
//! a half-applied mutation, and the writer's own view reflects the
//! write on the very next emission.
//!
//! The instance is owned by the composition root and passed around by
//! handle; there is no ambient singleton.

use crate::error::{CoreError, CoreResult};
use crate::model::StudentRecord;
use crate::scope::{ScopeDescriptor, Visibility};
use crate::store::{RecordStore, SnapshotEvent, SnapshotSink, StoreSubscription};
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

struct SubscriberEntry {
    id: u64,
    scope: ScopeDescriptor,
    sink: SnapshotSink,
}

struct MemoryState {
    records: Vec<StudentRecord>,
    subscribers: Vec<SubscriberEntry>,
    next_subscriber: u64,
}

pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                records: Vec::new(),
                subscribers: Vec::new(),
                next_subscriber: 0,
            })),
        }
    }

    /// Re-emit the filtered view to every subscriber whose scope admits
    /// the touched record(s). Runs with the state lock held so the
    /// mutation and its emissions form one atomic step.
    fn emit_touched(state: &mut MemoryState, touched: impl Fn(&ScopeDescriptor) -> bool) {
        let views: Vec<(usize, Vec<StudentRecord>)> = state
            .subscribers
            .iter()
            .enumerate()
            .filter(|(_, sub)| touched(&sub.scope))
            .map(|(index, sub)| {
                let view: Vec<StudentRecord> = state
                    .records
                    .iter()
                    .filter(|record| sub.scope.matches(record))
                    .cloned()
                    .collect();
                (index, view)
            })
            .collect();
        for (index, view) in views {
            let generation = state.subscribers[index].scope.generation;
            (state.subscribers[index].sink)(SnapshotEvent {
                generation,
                outcome: Ok(view),
            });
        }
    }

    // ── Test helpers ─────────────────────────────────────────────────

    /// Live subscriber count. Used by tests asserting that cancellation
    /// unregisters synchronously.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().subscribers.len()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }
}

impl RecordStore for MemoryStore {
    fn subscribe(
        &self,
        scope: &ScopeDescriptor,
        mut sink: SnapshotSink,
    ) -> CoreResult<StoreSubscription> {
        if scope.visibility == Visibility::None {
            // One empty snapshot; nothing is registered, nothing to release.
            sink(SnapshotEvent {
                generation: scope.generation,
                outcome: Ok(Vec::new()),
            });
            return Ok(StoreSubscription::inert());
        }

        let mut state = self.state.lock().unwrap();
        let id = state.next_subscriber;
        state.next_subscriber += 1;

        let view: Vec<StudentRecord> = state
            .records
            .iter()
            .filter(|record| scope.matches(record))
            .cloned()
            .collect();
        sink(SnapshotEvent {
            generation: scope.generation,
            outcome: Ok(view),
        });

        state.subscribers.push(SubscriberEntry {
            id,
            scope: scope.clone(),
            sink,
        });
        drop(state);

        let weak: Weak<Mutex<MemoryState>> = Arc::downgrade(&self.state);
        Ok(StoreSubscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().unwrap().subscribers.retain(|sub| sub.id != id);
            }
        }))
    }

    fn create(&self, mut record: StudentRecord) -> CoreResult<StudentRecord> {
        record.id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().unwrap();
        state.records.push(record.clone());
        Self::emit_touched(&mut state, |scope| scope.matches(&record));
        Ok(record)
    }

    fn update(&self, id: &str, mut record: StudentRecord) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .records
            .iter()
            .position(|existing| existing.id == id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        let previous = state.records[index].clone();
        record.id = previous.id.clone();
        record.owner_id = previous.owner_id.clone();
        state.records[index] = record.clone();

        Self::emit_touched(&mut state, |scope| {
            scope.matches(&previous) || scope.matches(&record)
        });
        Ok(())
    }

    fn delete(&self, id: &str) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .records
            .iter()
            .position(|existing| existing.id == id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        let removed = state.records.remove(index);
        Self::emit_touched(&mut state, |scope| scope.matches(&removed));
        Ok(())
    }

    fn get(&self, id: &str) -> CoreResult<Option<StudentRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state.records.iter().find(|record| record.id == id).cloned())
    }

    fn find_by_business_id(&self, business_id: &str) -> CoreResult<Option<StudentRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .find(|record| record.business_id == business_id)
            .cloned())
    }
}
