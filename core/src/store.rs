//! Record store contract shared by both backend variants.
//!
//! RULE: consumers depend only on the `RecordStore` trait. Which
//! variant backs it is decided once, at startup, in the composition
//! root — it is invisible everywhere else.
//!
//! RULE: snapshot sinks run on the mutating call stack, under the
//! store's own lock where the variant needs one. A sink must never call
//! back into the store.

pub mod document;
pub mod memory;
pub mod sqlite;

use crate::config::{BackendConfig, MonitorConfig};
use crate::error::{CoreResult, StoreFailure};
use crate::model::StudentRecord;
use crate::scope::ScopeDescriptor;
use crate::types::Generation;
use std::sync::Arc;

/// One pushed snapshot of a scoped view. Every emission carries the
/// generation of the scope that produced it so stale subscriptions can
/// be told apart from the live one. A failed outcome is the store
/// reporting a backend failure once — the subscription itself stays
/// registered.
#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    pub generation: Generation,
    pub outcome: Result<Vec<StudentRecord>, StoreFailure>,
}

/// Callback receiving pushed snapshots for one subscription.
pub type SnapshotSink = Box<dyn FnMut(SnapshotEvent) + Send>;

/// The contract both variants fulfill.
///
/// Guarantees common to both:
///   - `subscribe` emits the current filtered view synchronously before
///     returning; a `Visibility::None` scope emits one empty snapshot
///     and registers nothing.
///   - read-your-write: the next emission observed after a mutating
///     call reflects that mutation.
///   - concurrent updates to the same record are last-write-wins; there
///     is no version check.
pub trait RecordStore: Send + Sync {
    fn subscribe(&self, scope: &ScopeDescriptor, sink: SnapshotSink)
        -> CoreResult<StoreSubscription>;

    /// Persist a new record. The store assigns the id; whatever id the
    /// caller supplied is replaced. Returns the stored record.
    fn create(&self, record: StudentRecord) -> CoreResult<StudentRecord>;

    /// Replace the record with the given id. The stored `owner_id` is
    /// kept — ownership is immutable after creation.
    fn update(&self, id: &str, record: StudentRecord) -> CoreResult<()>;

    fn delete(&self, id: &str) -> CoreResult<()>;

    /// One-shot lookup by store id. Absence is `Ok(None)`, not an error.
    fn get(&self, id: &str) -> CoreResult<Option<StudentRecord>>;

    /// One-shot lookup by the external student identifier.
    fn find_by_business_id(&self, business_id: &str)
        -> CoreResult<Option<StudentRecord>>;
}

/// Cancellation token for one subscription. Cancellation is
/// synchronous: after `cancel` (or drop) returns, later mutations cost
/// nothing for this subscriber.
pub struct StoreSubscription {
    canceller: Option<Box<dyn FnOnce() + Send>>,
}

impl StoreSubscription {
    pub fn new(canceller: impl FnOnce() + Send + 'static) -> Self {
        Self { canceller: Some(Box::new(canceller)) }
    }

    /// A subscription with nothing to release (empty-scope case).
    pub fn inert() -> Self {
        Self { canceller: None }
    }

    pub fn cancel(&mut self) {
        if let Some(canceller) = self.canceller.take() {
            canceller();
        }
    }
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Build the configured store variant. Called once from the composition
/// root.
pub fn open_store(config: &MonitorConfig) -> CoreResult<Arc<dyn RecordStore>> {
    match &config.backend {
        BackendConfig::Memory => {
            log::info!("record store: in-memory variant");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
        BackendConfig::Document { db_path } => {
            log::info!("record store: document variant at {db_path}");
            let backend = if db_path == ":memory:" {
                sqlite::SqliteBackend::in_memory()?
            } else {
                sqlite::SqliteBackend::open(db_path)?
            };
            Ok(Arc::new(document::DocumentStore::new(Arc::new(backend))))
        }
    }
}
