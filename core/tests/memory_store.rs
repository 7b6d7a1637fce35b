use simpade_core::error::CoreError;
use simpade_core::model::{EconomicStatus, StudentRecord};
use simpade_core::risk::classify;
use simpade_core::scope::{ScopeDescriptor, Visibility};
use simpade_core::store::memory::MemoryStore;
use simpade_core::store::{RecordStore, SnapshotEvent, SnapshotSink};
use std::sync::{Arc, Mutex};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn record(business_id: &str, grade: i32, average: f64, absences: u32, owner: &str) -> StudentRecord {
    StudentRecord {
        id: String::new(),
        business_id: business_id.into(),
        name: format!("Student {business_id}"),
        grade,
        academic_average: average,
        absences_last_month: absences,
        economic_status: EconomicStatus::Stable,
        risk_tier: classify(average, absences),
        owner_id: owner.into(),
    }
}

fn teacher_scope(owner: &str, grade: i32, generation: u64) -> ScopeDescriptor {
    ScopeDescriptor {
        visibility: Visibility::OwnedAndGraded,
        owner_filter: Some(owner.into()),
        grade_filter: Some(grade),
        generation,
    }
}

fn leader_scope(generation: u64) -> ScopeDescriptor {
    ScopeDescriptor {
        visibility: Visibility::All,
        owner_filter: None,
        grade_filter: None,
        generation,
    }
}

fn hidden_scope(generation: u64) -> ScopeDescriptor {
    ScopeDescriptor {
        visibility: Visibility::None,
        owner_filter: None,
        grade_filter: None,
        generation,
    }
}

/// A sink that appends every emission to a shared log.
fn collector() -> (Arc<Mutex<Vec<SnapshotEvent>>>, SnapshotSink) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&events);
    let sink: SnapshotSink = Box::new(move |event| log.lock().unwrap().push(event));
    (events, sink)
}

fn last_view(events: &Arc<Mutex<Vec<SnapshotEvent>>>) -> Vec<StudentRecord> {
    events
        .lock()
        .unwrap()
        .last()
        .expect("no emission observed")
        .outcome
        .clone()
        .expect("emission carried a failure")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn create_assigns_the_id() {
    let store = MemoryStore::new();
    let stored = store.create(record("1001", 10, 3.2, 1, "t1")).unwrap();
    assert!(!stored.id.is_empty());
    assert_eq!(store.get(&stored.id).unwrap(), Some(stored));
}

#[test]
fn subscription_emits_the_current_view_synchronously() {
    let store = MemoryStore::new();
    store.create(record("1001", 10, 3.2, 1, "t1")).unwrap();

    let (events, sink) = collector();
    let _sub = store.subscribe(&teacher_scope("t1", 10, 1), sink).unwrap();
    assert_eq!(events.lock().unwrap().len(), 1);
    assert_eq!(last_view(&events).len(), 1);
}

#[test]
fn writer_observes_its_own_write_on_the_next_emission() {
    let store = MemoryStore::new();
    let (events, sink) = collector();
    let _sub = store.subscribe(&teacher_scope("t1", 10, 1), sink).unwrap();

    let stored = store.create(record("1001", 10, 2.0, 6, "t1")).unwrap();
    let view = last_view(&events);
    assert_eq!(view, vec![stored]);
}

#[test]
fn foreign_owner_records_never_reach_a_scoped_subscriber() {
    let store = MemoryStore::new();
    let (events, sink) = collector();
    let _sub = store.subscribe(&teacher_scope("t1", 10, 1), sink).unwrap();
    let baseline = events.lock().unwrap().len();

    store.create(record("2001", 10, 3.0, 0, "t2")).unwrap();
    // Scope untouched: no re-emission at all for this subscriber.
    assert_eq!(events.lock().unwrap().len(), baseline);

    store.create(record("1001", 10, 3.0, 0, "t1")).unwrap();
    let view = last_view(&events);
    assert!(view.iter().all(|r| r.owner_id == "t1"));
}

#[test]
fn update_moving_a_record_out_of_scope_removes_it_from_the_view() {
    let store = MemoryStore::new();
    let stored = store.create(record("1001", 10, 3.0, 0, "t1")).unwrap();

    let (events, sink) = collector();
    let _sub = store.subscribe(&teacher_scope("t1", 10, 1), sink).unwrap();
    assert_eq!(last_view(&events).len(), 1);

    let mut moved = stored.clone();
    moved.grade = 9;
    store.update(&stored.id, moved).unwrap();
    assert!(last_view(&events).is_empty());
}

#[test]
fn delete_disappears_within_one_emission_on_every_matching_stream() {
    let store = MemoryStore::new();
    let first = store.create(record("1001", 10, 3.0, 0, "t1")).unwrap();
    store.create(record("1002", 10, 4.2, 0, "t1")).unwrap();

    let (leader_events, leader_sink) = collector();
    let (teacher_events, teacher_sink) = collector();
    let _leader = store.subscribe(&leader_scope(1), leader_sink).unwrap();
    let _teacher = store.subscribe(&teacher_scope("t1", 10, 2), teacher_sink).unwrap();

    store.delete(&first.id).unwrap();
    assert_eq!(last_view(&leader_events).len(), 1);
    assert_eq!(last_view(&teacher_events).len(), 1);
    assert!(last_view(&leader_events).iter().all(|r| r.id != first.id));
}

#[test]
fn mutation_and_emission_are_one_atomic_step() {
    // The emission observed during the mutating call already reflects
    // the full mutation; no sink ever sees a partial collection.
    let store = MemoryStore::new();
    let (events, sink) = collector();
    let _sub = store.subscribe(&leader_scope(1), sink).unwrap();

    for i in 0..5 {
        store
            .create(record(&format!("10{i:02}"), 10, 3.0, 0, "t1"))
            .unwrap();
        assert_eq!(last_view(&events).len(), i + 1);
    }
}

#[test]
fn hidden_scope_emits_one_empty_snapshot_and_registers_nothing() {
    let store = MemoryStore::new();
    let (events, sink) = collector();
    let _sub = store.subscribe(&hidden_scope(1), sink).unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
    assert!(last_view(&events).is_empty());
    assert_eq!(store.subscriber_count(), 0);

    store.create(record("1001", 10, 3.0, 0, "t1")).unwrap();
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn cancellation_is_synchronous_and_free_afterwards() {
    let store = MemoryStore::new();
    let (events, sink) = collector();
    let sub = store.subscribe(&leader_scope(1), sink).unwrap();
    assert_eq!(store.subscriber_count(), 1);

    drop(sub);
    assert_eq!(store.subscriber_count(), 0);

    store.create(record("1001", 10, 3.0, 0, "t1")).unwrap();
    assert_eq!(events.lock().unwrap().len(), 1); // just the initial snapshot
}

#[test]
fn emissions_carry_the_scope_generation() {
    let store = MemoryStore::new();
    let (events, sink) = collector();
    let _sub = store.subscribe(&teacher_scope("t1", 10, 7), sink).unwrap();
    store.create(record("1001", 10, 3.0, 0, "t1")).unwrap();

    assert!(events.lock().unwrap().iter().all(|e| e.generation == 7));
}

#[test]
fn stored_owner_survives_an_update_that_tries_to_change_it() {
    let store = MemoryStore::new();
    let stored = store.create(record("1001", 10, 3.0, 0, "t1")).unwrap();

    let mut hijacked = stored.clone();
    hijacked.owner_id = "t2".into();
    store.update(&stored.id, hijacked).unwrap();

    assert_eq!(store.get(&stored.id).unwrap().unwrap().owner_id, "t1");
}

#[test]
fn lookup_by_business_id_and_absent_lookups() {
    let store = MemoryStore::new();
    let stored = store.create(record("1001", 10, 3.0, 0, "t1")).unwrap();

    assert_eq!(
        store.find_by_business_id("1001").unwrap().map(|r| r.id),
        Some(stored.id)
    );
    assert_eq!(store.find_by_business_id("9999").unwrap(), None);
    assert_eq!(store.get("missing").unwrap(), None);
}

#[test]
fn update_and_delete_of_missing_records_are_not_found() {
    let store = MemoryStore::new();
    let err = store
        .update("missing", record("1001", 10, 3.0, 0, "t1"))
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    let err = store.delete("missing").unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}
