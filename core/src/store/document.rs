//! Document-store-backed record variant.
//!
//! The backend is opaque: a collection-addressed CRUD service with
//! equality-predicate queries and live push subscriptions over JSON
//! documents. This module translates scope descriptors into server-side
//! predicates, forwards pushed snapshots, and maps the backend's native
//! document id onto `StudentRecord.id`. Nothing above this layer knows
//! a document store is involved.

use crate::error::{CoreResult, StoreFailure};
use crate::model::StudentRecord;
use crate::scope::{ScopeDescriptor, Visibility};
use crate::store::{RecordStore, SnapshotEvent, SnapshotSink, StoreSubscription};
use crate::types::GradeLevel;
use serde_json::Value;
use std::sync::Arc;

/// Collection path for student records.
pub const STUDENT_COLLECTION: &str = "students";

/// Server-side equality predicate. Fields left `None` are
/// unconstrained; an all-`None` predicate selects the whole collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPredicate {
    pub owner_eq: Option<String>,
    pub grade_eq: Option<GradeLevel>,
    pub business_id_eq: Option<String>,
}

/// A raw backend document: native id plus JSON payload.
#[derive(Debug, Clone)]
pub struct Document {
    pub doc_id: String,
    pub payload: Value,
}

/// Callback receiving pushed result sets for one live query.
pub type WatchSink = Box<dyn FnMut(Result<Vec<Document>, StoreFailure>) + Send>;

/// Cancellation token for a live query; same synchronous-release
/// semantics as a store subscription.
pub type WatchHandle = StoreSubscription;

/// The opaque document service. `watch` must push the current result
/// set synchronously on registration and after every mutation that
/// commits in the collection.
pub trait DocumentBackend: Send + Sync {
    fn insert(&self, collection: &str, payload: Value) -> CoreResult<String>;
    fn update(&self, collection: &str, doc_id: &str, payload: Value) -> CoreResult<()>;
    fn delete(&self, collection: &str, doc_id: &str) -> CoreResult<()>;
    fn get(&self, collection: &str, doc_id: &str) -> CoreResult<Option<Document>>;
    fn query(&self, collection: &str, predicate: &QueryPredicate)
        -> CoreResult<Vec<Document>>;
    fn watch(&self, collection: &str, predicate: QueryPredicate, sink: WatchSink)
        -> CoreResult<WatchHandle>;
}

pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    collection: String,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            collection: STUDENT_COLLECTION.to_string(),
        }
    }

    fn predicate_for(scope: &ScopeDescriptor) -> Option<QueryPredicate> {
        match scope.visibility {
            Visibility::None => None,
            Visibility::All => Some(QueryPredicate::default()),
            Visibility::OwnedAndGraded => Some(QueryPredicate {
                owner_eq: scope.owner_filter.clone(),
                grade_eq: scope.grade_filter,
                business_id_eq: None,
            }),
        }
    }

    /// Serialize a record for storage. The id lives in the document
    /// key, not the payload.
    fn encode(record: &StudentRecord) -> CoreResult<Value> {
        let mut value = serde_json::to_value(record)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("id");
        }
        Ok(value)
    }

    /// Rebuild a record from a document, grafting the native id onto
    /// the `id` field.
    fn decode(document: Document) -> CoreResult<StudentRecord> {
        let mut value = document.payload;
        if let Some(map) = value.as_object_mut() {
            map.insert("id".to_string(), Value::String(document.doc_id));
        }
        Ok(serde_json::from_value(value)?)
    }

    fn decode_all(documents: Vec<Document>) -> Vec<StudentRecord> {
        documents
            .into_iter()
            .filter_map(|document| match Self::decode(document) {
                Ok(record) => Some(record),
                Err(err) => {
                    log::warn!("skipping undecodable document: {err}");
                    None
                }
            })
            .collect()
    }
}

impl RecordStore for DocumentStore {
    fn subscribe(
        &self,
        scope: &ScopeDescriptor,
        mut sink: SnapshotSink,
    ) -> CoreResult<StoreSubscription> {
        let Some(predicate) = Self::predicate_for(scope) else {
            sink(SnapshotEvent {
                generation: scope.generation,
                outcome: Ok(Vec::new()),
            });
            return Ok(StoreSubscription::inert());
        };

        let generation = scope.generation;
        let watch_sink: WatchSink = Box::new(move |result| {
            let outcome = result.map(DocumentStore::decode_all);
            sink(SnapshotEvent { generation, outcome });
        });
        self.backend.watch(&self.collection, predicate, watch_sink)
    }

    fn create(&self, mut record: StudentRecord) -> CoreResult<StudentRecord> {
        let payload = Self::encode(&record)?;
        record.id = self.backend.insert(&self.collection, payload)?;
        Ok(record)
    }

    fn update(&self, id: &str, mut record: StudentRecord) -> CoreResult<()> {
        // Ownership is immutable after creation; keep the stored owner.
        if let Some(existing) = self.get(id)? {
            record.owner_id = existing.owner_id;
        }
        record.id = id.to_string();
        let payload = Self::encode(&record)?;
        self.backend.update(&self.collection, id, payload)
    }

    fn delete(&self, id: &str) -> CoreResult<()> {
        self.backend.delete(&self.collection, id)
    }

    fn get(&self, id: &str) -> CoreResult<Option<StudentRecord>> {
        match self.backend.get(&self.collection, id)? {
            Some(document) => Ok(Some(Self::decode(document)?)),
            None => Ok(None),
        }
    }

    fn find_by_business_id(&self, business_id: &str) -> CoreResult<Option<StudentRecord>> {
        let predicate = QueryPredicate {
            business_id_eq: Some(business_id.to_string()),
            ..QueryPredicate::default()
        };
        let documents = self.backend.query(&self.collection, &predicate)?;
        Ok(Self::decode_all(documents).into_iter().next())
    }
}
