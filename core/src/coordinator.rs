//! Reactive query coordination.
//!
//! Composes the identity feed, the scope resolver, the record store and
//! the aggregation engine into the streams consumed by the outside
//! world, and owns the subscription lifecycle:
//!
//!   Uninitialized → ScopeResolved → Subscribed(gen)
//!                 → Subscribed(gen+1)* → Disposed
//!
//! An identity or grade change re-resolves the scope, synchronously
//! cancels the current store subscription, and subscribes again under
//! the next generation. Every store emission carries the generation of
//! the scope that produced it; emissions that do not match the active
//! generation are dropped, so a stale subscription's delayed snapshot
//! can never overwrite a newer scope's data.
//!
//! RULE: never call into the store while holding the pipeline lock.

use crate::aggregation::{RateMemo, BASE_DESERTION_RATE};
use crate::audit::{AuditLog, ChangeAction, ChangeEvent};
use crate::config::MonitorConfig;
use crate::error::{CoreError, CoreResult, StoreFailure};
use crate::feed::{Feed, SinkHandle, Subscription};
use crate::identity::{Identity, IdentityHub, Role};
use crate::model::{NewStudentForm, SchoolContext, StudentRecord};
use crate::risk;
use crate::scope::{ScopeDescriptor, ScopeResolver};
use crate::simulation::{self, SimulationResult};
use crate::store::{RecordStore, SnapshotEvent, SnapshotSink, StoreSubscription};
use crate::types::{Generation, GradeLevel};
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    ScopeResolved,
    Subscribed,
    Disposed,
}

struct Pipeline {
    phase: Phase,
    resolver: ScopeResolver,
    scope: Option<ScopeDescriptor>,
    active_generation: Generation,
    identity: Option<Identity>,
    ready: bool,
    grade_override: Option<GradeLevel>,
    context: SchoolContext,
    visible: Vec<StudentRecord>,
    memo: RateMemo,
    current_rate: f64,
}

pub struct QueryCoordinator {
    store: Arc<dyn RecordStore>,
    weak_self: Weak<QueryCoordinator>,
    state: Mutex<Pipeline>,
    records_out: Feed<Vec<StudentRecord>>,
    rate_out: Feed<f64>,
    failures_out: Feed<StoreFailure>,
    audit: AuditLog,
    store_sub: Mutex<Option<StoreSubscription>>,
    identity_sink: Mutex<Option<SinkHandle<Option<Identity>>>>,
    ready_sink: Mutex<Option<SinkHandle<bool>>>,
}

impl QueryCoordinator {
    /// Build a coordinator wired to the identity hub. The hub's latest
    /// identity and readiness are replayed during construction, so the
    /// pipeline leaves `Uninitialized` before this returns.
    pub fn build(
        store: Arc<dyn RecordStore>,
        hub: &IdentityHub,
        config: &MonitorConfig,
    ) -> Arc<Self> {
        let coordinator = Arc::new_cyclic(|weak| Self {
            store,
            weak_self: weak.clone(),
            state: Mutex::new(Pipeline {
                phase: Phase::Uninitialized,
                resolver: ScopeResolver::new(),
                scope: None,
                active_generation: 0,
                identity: None,
                ready: false,
                grade_override: None,
                context: config.school_context,
                visible: Vec::new(),
                memo: RateMemo::new(),
                current_rate: BASE_DESERTION_RATE,
            }),
            records_out: Feed::new(),
            rate_out: Feed::new(),
            failures_out: Feed::new(),
            audit: AuditLog::new(),
            store_sub: Mutex::new(None),
            identity_sink: Mutex::new(None),
            ready_sink: Mutex::new(None),
        });

        let weak = Arc::downgrade(&coordinator);
        let identity_sink = hub.identity().attach(move |identity| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_identity_change(identity.clone());
            }
        });
        let weak = Arc::downgrade(&coordinator);
        let ready_sink = hub.ready().attach(move |ready| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_ready_change(*ready);
            }
        });
        *coordinator.identity_sink.lock().unwrap() = Some(identity_sink);
        *coordinator.ready_sink.lock().unwrap() = Some(ready_sink);
        coordinator
    }

    // ── Streams ──────────────────────────────────────────────────────

    /// Continuously updated scoped record set. Replays the latest
    /// snapshot to new subscribers.
    pub fn record_stream(&self) -> Subscription<Vec<StudentRecord>> {
        self.records_out.subscribe()
    }

    /// Continuously updated desertion-rate estimate.
    pub fn desertion_rate_stream(&self) -> Subscription<f64> {
        self.rate_out.subscribe()
    }

    /// Store failures surfaced by the live subscription. Each failure
    /// is reported once; the record stream keeps its last-known-good
    /// data. Resubscribing is the caller's decision.
    pub fn store_failure_stream(&self) -> Subscription<StoreFailure> {
        self.failures_out.subscribe()
    }

    pub fn audit_stream(&self) -> Subscription<ChangeEvent> {
        self.audit.feed().subscribe()
    }

    pub fn recent_changes(&self) -> Vec<ChangeEvent> {
        self.audit.recent()
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current scoped view (the latest emitted snapshot).
    pub fn visible_records(&self) -> Vec<StudentRecord> {
        self.state.lock().unwrap().visible.clone()
    }

    /// One-shot lookup. Teacher and leader scopes resolve by store id;
    /// a student session resolves by its business id through the
    /// separate self-view path. Absence is `Ok(None)`, and so is any
    /// lookup before readiness.
    pub fn lookup_by_id(&self, id: &str) -> CoreResult<Option<StudentRecord>> {
        let identity = {
            let state = self.state.lock().unwrap();
            if !state.ready {
                return Ok(None);
            }
            match &state.identity {
                Some(identity) => identity.clone(),
                None => return Ok(None),
            }
        };
        match identity.role {
            Role::Leader => self.store.get(id),
            // A teacher resolves ids inside its own collection only.
            Role::Teacher => Ok(self
                .store
                .get(id)?
                .filter(|record| record.owner_id == identity.uid)),
            Role::Student => self.store.find_by_business_id(id),
            Role::Pending => Ok(None),
        }
    }

    /// The estimate for the current visible set and context, recomputed
    /// (memoized) at call time.
    pub fn current_desertion_rate(&self) -> f64 {
        let mut state = self.state.lock().unwrap();
        let Pipeline { memo, visible, context, .. } = &mut *state;
        memo.rate(visible, *context)
    }

    pub fn school_context(&self) -> SchoolContext {
        self.state.lock().unwrap().context
    }

    /// Generation of the scope currently driving the record stream.
    pub fn generation(&self) -> Generation {
        self.state.lock().unwrap().active_generation
    }

    /// The resolved scope currently in force.
    pub fn active_scope(&self) -> Option<ScopeDescriptor> {
        self.state.lock().unwrap().scope.clone()
    }

    /// Project an intervention plan against the rate current at call
    /// time — never a stale cache.
    pub fn run_simulation(
        &self,
        tutoring_slots: u32,
        workshop_count: u32,
        psych_hours: u32,
    ) -> SimulationResult {
        let rate = self.current_desertion_rate();
        simulation::run_simulation(tutoring_slots, workshop_count, psych_hours, rate)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Register a student under the signed-in teacher. The risk tier is
    /// classified here; whatever the form implies is irrelevant.
    pub fn save_new_student(&self, form: NewStudentForm) -> CoreResult<StudentRecord> {
        self.require_ready()?;
        let identity = self.require_identity()?;
        match identity.role {
            Role::Teacher => {}
            Role::Leader | Role::Student | Role::Pending => {
                return Err(CoreError::PermissionDenied(
                    "only a teacher session can register students".into(),
                ))
            }
        }

        let record = StudentRecord {
            id: String::new(), // store-assigned
            business_id: form.business_id,
            name: form.name,
            grade: form.grade,
            academic_average: form.academic_average,
            absences_last_month: form.absences_last_month,
            economic_status: form.economic_status.unwrap_or_default(),
            risk_tier: risk::classify(form.academic_average, form.absences_last_month),
            owner_id: identity.uid.clone(),
        };
        let record = self.store.create(record)?;
        self.audit
            .record(ChangeEvent::new(&record, ChangeAction::Created, &identity.uid));
        Ok(record)
    }

    /// Replace a record. Permitted to its owner and to leaders; the
    /// stored owner and a freshly classified tier always win over the
    /// caller's copy. Rejected atomically otherwise — nothing is
    /// applied.
    pub fn update_student(&self, record: StudentRecord) -> CoreResult<()> {
        self.require_ready()?;
        let identity = self.require_identity()?;
        let existing = self
            .store
            .get(&record.id)?
            .ok_or_else(|| CoreError::NotFound(record.id.clone()))?;
        self.check_mutation_allowed(&identity, &existing)?;

        let mut updated = record;
        updated.owner_id = existing.owner_id;
        updated.risk_tier =
            risk::classify(updated.academic_average, updated.absences_last_month);
        let id = updated.id.clone();
        self.store.update(&id, updated.clone())?;
        self.audit
            .record(ChangeEvent::new(&updated, ChangeAction::Updated, &identity.uid));
        Ok(())
    }

    pub fn delete_student(&self, id: &str) -> CoreResult<()> {
        self.require_ready()?;
        let identity = self.require_identity()?;
        let existing = self
            .store
            .get(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        self.check_mutation_allowed(&identity, &existing)?;

        self.store.delete(id)?;
        self.audit
            .record(ChangeEvent::new(&existing, ChangeAction::Deleted, &identity.uid));
        Ok(())
    }

    /// Tune the process-wide school context. Leader-level action.
    pub fn set_school_context(&self, context: SchoolContext) -> CoreResult<()> {
        let identity = self.require_identity()?;
        match identity.role {
            Role::Leader => {}
            Role::Teacher | Role::Student | Role::Pending => {
                return Err(CoreError::PermissionDenied(
                    "school context is a leader-level setting".into(),
                ))
            }
        }
        let (rate, changed) = {
            let mut state = self.state.lock().unwrap();
            state.context = context;
            let Pipeline { memo, visible, context, current_rate, .. } = &mut *state;
            let rate = memo.rate(visible, *context);
            let changed = *current_rate != rate;
            *current_rate = rate;
            (rate, changed)
        };
        if changed {
            self.rate_out.publish(rate);
        }
        Ok(())
    }

    /// Select the grade a teacher session is monitoring. Replaces the
    /// scope: the old subscription is torn down and a new generation
    /// subscribed — no record from the prior grade survives.
    pub fn set_teacher_grade(&self, grade: GradeLevel) -> CoreResult<()> {
        self.set_grade_override(Some(grade))
    }

    pub fn clear_teacher_grade(&self) -> CoreResult<()> {
        self.set_grade_override(None)
    }

    fn set_grade_override(&self, grade: Option<GradeLevel>) -> CoreResult<()> {
        let identity = self.require_identity()?;
        match identity.role {
            Role::Teacher => {}
            Role::Leader | Role::Student | Role::Pending => {
                return Err(CoreError::PermissionDenied(
                    "grade selection applies to teacher sessions".into(),
                ))
            }
        }
        {
            let mut state = self.state.lock().unwrap();
            state.grade_override = grade;
        }
        self.refresh_scope();
        Ok(())
    }

    /// Tear the pipeline down. The store subscription is released
    /// synchronously; later mutations cost nothing for this
    /// coordinator.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.phase == Phase::Disposed {
                return;
            }
            state.phase = Phase::Disposed;
        }
        let identity_sink = self.identity_sink.lock().unwrap().take();
        drop(identity_sink);
        let ready_sink = self.ready_sink.lock().unwrap().take();
        drop(ready_sink);
        let subscription = self.store_sub.lock().unwrap().take();
        drop(subscription);
        log::debug!("coordinator disposed");
    }

    /// Diagnostics/replay hook: push a snapshot event through the same
    /// path the store subscription uses. Tooling and tests only.
    #[doc(hidden)]
    pub fn inject_snapshot(&self, event: SnapshotEvent) {
        self.on_store_event(event);
    }

    // ── Pipeline internals ───────────────────────────────────────────

    fn on_identity_change(&self, identity: Option<Identity>) {
        {
            let mut state = self.state.lock().unwrap();
            if state.phase == Phase::Disposed {
                return;
            }
            let uid_changed = match (&state.identity, &identity) {
                (Some(previous), Some(next)) => previous.uid != next.uid,
                (None, None) => false,
                _ => true,
            };
            if uid_changed {
                // The taught-grade selection belongs to the session.
                state.grade_override = None;
            }
            state.identity = identity;
        }
        self.refresh_scope();
    }

    fn on_ready_change(&self, ready: bool) {
        let changed = {
            let mut state = self.state.lock().unwrap();
            if state.phase == Phase::Disposed {
                return;
            }
            let changed = state.ready != ready;
            state.ready = ready;
            changed
        };
        if changed {
            self.refresh_scope();
        }
    }

    /// Re-resolve the scope and replace the store subscription under
    /// the next generation.
    fn refresh_scope(&self) {
        let (scope, ready) = {
            let mut state = self.state.lock().unwrap();
            if state.phase == Phase::Disposed {
                return;
            }
            let identity = state.identity.clone();
            let grade_override = state.grade_override;
            let scope = state.resolver.resolve(identity.as_ref(), grade_override);
            state.active_generation = scope.generation;
            state.scope = Some(scope.clone());
            state.phase = Phase::ScopeResolved;
            (scope, state.ready)
        };
        log::debug!(
            "scope resolved: generation {} visibility {:?}",
            scope.generation,
            scope.visibility
        );

        // Synchronously release the previous subscription before the
        // replacement opens; its emissions would be dropped by the
        // generation check anyway, but they must also stop costing the
        // store anything.
        let previous = self.store_sub.lock().unwrap().take();
        drop(previous);

        if !ready {
            // Read paths before readiness yield an empty stream, not a
            // failure.
            self.apply_snapshot(Vec::new());
            return;
        }

        let weak = self.weak_self.clone();
        let sink: SnapshotSink = Box::new(move |event| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_store_event(event);
            }
        });
        match self.store.subscribe(&scope, sink) {
            Ok(subscription) => {
                *self.store_sub.lock().unwrap() = Some(subscription);
                let mut state = self.state.lock().unwrap();
                if state.phase != Phase::Disposed {
                    state.phase = Phase::Subscribed;
                }
            }
            Err(err) => {
                log::warn!("store subscription failed: {err}");
                self.failures_out
                    .publish(StoreFailure::Unavailable(err.to_string()));
                self.apply_snapshot(Vec::new());
            }
        }
    }

    fn on_store_event(&self, event: SnapshotEvent) {
        {
            let state = self.state.lock().unwrap();
            if state.phase == Phase::Disposed {
                return;
            }
            if event.generation != state.active_generation {
                log::debug!(
                    "dropping stale emission: generation {} (active {})",
                    event.generation,
                    state.active_generation
                );
                return;
            }
        }
        match event.outcome {
            Ok(records) => self.apply_snapshot(records),
            Err(failure) => {
                // Reported once; the record stream keeps last-known-good.
                log::warn!("store failure on live subscription: {failure}");
                self.failures_out.publish(failure);
            }
        }
    }

    fn apply_snapshot(&self, records: Vec<StudentRecord>) {
        let (view, rate, rate_changed) = {
            let mut state = self.state.lock().unwrap();
            state.visible = records;
            let Pipeline { memo, visible, context, .. } = &mut *state;
            let rate = memo.rate(visible, *context);
            let rate_changed = state.current_rate != rate;
            state.current_rate = rate;
            (state.visible.clone(), rate, rate_changed)
        };
        self.records_out.publish(view);
        if rate_changed || self.rate_out.latest().is_none() {
            self.rate_out.publish(rate);
        }
    }

    fn require_ready(&self) -> CoreResult<()> {
        if self.state.lock().unwrap().ready {
            Ok(())
        } else {
            Err(CoreError::NotInitialized("session not ready"))
        }
    }

    fn require_identity(&self) -> CoreResult<Identity> {
        self.state
            .lock()
            .unwrap()
            .identity
            .clone()
            .ok_or_else(|| CoreError::PermissionDenied("no signed-in identity".into()))
    }

    fn check_mutation_allowed(
        &self,
        identity: &Identity,
        existing: &StudentRecord,
    ) -> CoreResult<()> {
        let allowed = match identity.role {
            Role::Leader => true,
            Role::Teacher => existing.owner_id == identity.uid,
            Role::Student | Role::Pending => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied(format!(
                "record {} is outside this session's scope",
                existing.id
            )))
        }
    }
}

impl Drop for QueryCoordinator {
    fn drop(&mut self) {
        self.dispose();
    }
}
