//! SQLite-backed document backend.
//!
//! RULE: only this module talks to the database. Documents are stored
//! as JSON rows keyed by (collection, doc_id); predicates compile to
//! `json_extract` equality clauses so filtering happens server-side.
//!
//! Live queries are re-evaluated synchronously after every committed
//! mutation in their collection and the fresh result set is pushed to
//! the watch sink. A query failure is pushed once as a failed result;
//! the watch stays registered and recovers on the next mutation.

use crate::error::{CoreError, CoreResult, StoreFailure};
use crate::store::document::{
    Document, DocumentBackend, QueryPredicate, WatchHandle, WatchSink,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

struct WatchEntry {
    id: u64,
    collection: String,
    predicate: QueryPredicate,
    sink: WatchSink,
}

struct BackendState {
    conn: Connection,
    watches: Vec<WatchEntry>,
    next_watch: u64,
}

pub struct SqliteBackend {
    state: Arc<Mutex<BackendState>>,
}

impl SqliteBackend {
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only applies to real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Self::with_connection(conn)
    }

    /// Open an in-memory database (used in tests and demo runs).
    pub fn in_memory() -> CoreResult<Self> {
        Self::with_connection(Connection::open(":memory:")?)
    }

    fn with_connection(conn: Connection) -> CoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS document (
                collection TEXT NOT NULL,
                doc_id     TEXT NOT NULL,
                payload    TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, doc_id)
            );",
        )?;
        Ok(Self {
            state: Arc::new(Mutex::new(BackendState {
                conn,
                watches: Vec::new(),
                next_watch: 0,
            })),
        })
    }

    /// Run a predicate query. Predicate fields compile to fixed
    /// `json_extract` clauses; values are always bound parameters.
    fn query_rows(
        conn: &Connection,
        collection: &str,
        predicate: &QueryPredicate,
    ) -> Result<Vec<Document>, StoreFailure> {
        let mut sql = String::from(
            "SELECT doc_id, payload FROM document WHERE collection = ?1",
        );
        let mut values: Vec<rusqlite::types::Value> = vec![collection.to_string().into()];

        if let Some(owner) = &predicate.owner_eq {
            values.push(owner.clone().into());
            sql.push_str(&format!(
                " AND json_extract(payload, '$.owner_id') = ?{}",
                values.len()
            ));
        }
        if let Some(grade) = predicate.grade_eq {
            values.push(i64::from(grade).into());
            sql.push_str(&format!(
                " AND json_extract(payload, '$.grade') = ?{}",
                values.len()
            ));
        }
        if let Some(business_id) = &predicate.business_id_eq {
            values.push(business_id.clone().into());
            sql.push_str(&format!(
                " AND json_extract(payload, '$.business_id') = ?{}",
                values.len()
            ));
        }
        sql.push_str(" ORDER BY rowid ASC");

        let run = || -> rusqlite::Result<Vec<Document>> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
                let doc_id: String = row.get(0)?;
                let payload: String = row.get(1)?;
                Ok((doc_id, payload))
            })?;
            let mut documents = Vec::new();
            for row in rows {
                let (doc_id, payload) = row?;
                let payload = serde_json::from_str(&payload).map_err(|err| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(err),
                    )
                })?;
                documents.push(Document { doc_id, payload });
            }
            Ok(documents)
        };
        run().map_err(|err| StoreFailure::Unavailable(err.to_string()))
    }

    /// Push fresh result sets to every watch on the mutated collection.
    /// Runs with the state lock held, so the mutation and its pushes
    /// form one step. A failed re-query is reported once per watch.
    fn notify(state: &mut BackendState, collection: &str) {
        let results: Vec<(usize, Result<Vec<Document>, StoreFailure>)> = state
            .watches
            .iter()
            .enumerate()
            .filter(|(_, watch)| watch.collection == collection)
            .map(|(index, watch)| {
                (index, Self::query_rows(&state.conn, collection, &watch.predicate))
            })
            .collect();
        for (index, result) in results {
            if let Err(failure) = &result {
                log::warn!("live query re-evaluation failed: {failure}");
            }
            (state.watches[index].sink)(result);
        }
    }

    // ── Test helpers ─────────────────────────────────────────────────

    pub fn watch_count(&self) -> usize {
        self.state.lock().unwrap().watches.len()
    }
}

impl DocumentBackend for SqliteBackend {
    fn insert(&self, collection: &str, payload: serde_json::Value) -> CoreResult<String> {
        let doc_id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().unwrap();
        state.conn.execute(
            "INSERT INTO document (collection, doc_id, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                collection,
                doc_id,
                payload.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Self::notify(&mut state, collection);
        Ok(doc_id)
    }

    fn update(&self, collection: &str, doc_id: &str, payload: serde_json::Value) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let changed = state.conn.execute(
            "UPDATE document SET payload = ?1, updated_at = ?2
             WHERE collection = ?3 AND doc_id = ?4",
            params![
                payload.to_string(),
                Utc::now().to_rfc3339(),
                collection,
                doc_id
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(doc_id.to_string()));
        }
        Self::notify(&mut state, collection);
        Ok(())
    }

    fn delete(&self, collection: &str, doc_id: &str) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let changed = state.conn.execute(
            "DELETE FROM document WHERE collection = ?1 AND doc_id = ?2",
            params![collection, doc_id],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(doc_id.to_string()));
        }
        Self::notify(&mut state, collection);
        Ok(())
    }

    fn get(&self, collection: &str, doc_id: &str) -> CoreResult<Option<Document>> {
        let state = self.state.lock().unwrap();
        let row: Option<String> = state
            .conn
            .query_row(
                "SELECT payload FROM document WHERE collection = ?1 AND doc_id = ?2",
                params![collection, doc_id],
                |row| row.get(0),
            )
            .optional()?;
        match row {
            Some(payload) => Ok(Some(Document {
                doc_id: doc_id.to_string(),
                payload: serde_json::from_str(&payload)?,
            })),
            None => Ok(None),
        }
    }

    fn query(&self, collection: &str, predicate: &QueryPredicate) -> CoreResult<Vec<Document>> {
        let state = self.state.lock().unwrap();
        Ok(Self::query_rows(&state.conn, collection, predicate)?)
    }

    fn watch(
        &self,
        collection: &str,
        predicate: QueryPredicate,
        mut sink: WatchSink,
    ) -> CoreResult<WatchHandle> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_watch;
        state.next_watch += 1;

        // Initial push before registration so the watcher starts from
        // the current result set.
        let initial = Self::query_rows(&state.conn, collection, &predicate);
        sink(initial);

        state.watches.push(WatchEntry {
            id,
            collection: collection.to_string(),
            predicate,
            sink,
        });
        drop(state);

        let weak: Weak<Mutex<BackendState>> = Arc::downgrade(&self.state);
        Ok(WatchHandle::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().unwrap().watches.retain(|watch| watch.id != id);
            }
        }))
    }
}
