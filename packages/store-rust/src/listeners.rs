//! Live-query listener registry.
//!
//! [`ListenerRegistry`] keeps, for every open listener, its query and the last
//! result set it reported. It observes commits and, once per commit, diffs the
//! new result set of every affected query against the previous one, sending a
//! single [`ChangeBatch`] per listener.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fireeats_core::{
    ChangeBatch, DocumentChange, DocumentRef, DocumentSnapshot, Error, Query, Result,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::storage::{MutationObserver, StorageEngine, StoredDocument};

struct Listener {
    query: Query,
    results: Vec<DocumentSnapshot>,
    tx: mpsc::UnboundedSender<Result<ChangeBatch>>,
}

/// Registry of open live-query listeners.
pub struct ListenerRegistry {
    engine: Arc<dyn StorageEngine>,
    listeners: Mutex<HashMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current result set of `query` as stored in the engine.
    #[must_use]
    pub fn evaluate(&self, query: &Query) -> Vec<DocumentSnapshot> {
        query.apply(
            self.engine
                .collection_snapshot(&query.collection)
                .into_iter()
                .map(|(reference, document)| document.snapshot(&reference)),
        )
    }

    /// Opens a listener and queues its initial batch.
    ///
    /// The caller must hold the store's read guard so no commit lands between
    /// evaluating the initial result set and registering.
    pub fn register(
        &self,
        query: &Query,
    ) -> (u64, mpsc::UnboundedReceiver<Result<ChangeBatch>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let results = self.evaluate(query);

        let initial = ChangeBatch {
            changes: results
                .iter()
                .enumerate()
                .map(|(i, doc)| DocumentChange::added(doc.clone(), i))
                .collect(),
            initial: true,
        };
        // The receiver is still in hand, so this cannot fail.
        let _ = tx.send(Ok(initial));

        self.listeners.lock().insert(
            id,
            Listener {
                query: query.clone(),
                results,
                tx,
            },
        );
        tracing::debug!(listener = id, collection = %query.collection, "listener registered");
        (id, rx)
    }

    /// Closes a listener. Its channel is closed once the sender drops.
    pub fn unregister(&self, id: u64) {
        if self.listeners.lock().remove(&id).is_some() {
            tracing::debug!(listener = id, "listener removed");
        }
    }

    /// Number of open listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends every open listener with an error built by `make_error`.
    pub fn fail_all(&self, make_error: impl Fn() -> Error) {
        let drained: Vec<(u64, Listener)> = self.listeners.lock().drain().collect();
        for (id, listener) in drained {
            let error = make_error();
            tracing::warn!(listener = id, error = %error, "listener failed");
            let _ = listener.tx.send(Err(error));
        }
    }
}

impl MutationObserver for ListenerRegistry {
    fn on_put(&self, _: &DocumentRef, _: &StoredDocument) {}

    fn on_update(&self, _: &DocumentRef, _: &StoredDocument, _: &StoredDocument) {}

    fn on_remove(&self, _: &DocumentRef, _: &StoredDocument) {}

    fn on_commit(&self, changed: &[DocumentRef]) {
        let mut listeners = self.listeners.lock();
        let mut closed = Vec::new();

        for (id, listener) in listeners.iter_mut() {
            let affected = changed
                .iter()
                .any(|reference| reference.parent() == &listener.query.collection);
            if !affected {
                continue;
            }

            let results = self.evaluate(&listener.query);
            let changes = diff_results(&listener.results, &results);
            listener.results = results;
            if changes.is_empty() {
                continue;
            }

            let batch = ChangeBatch {
                changes,
                initial: false,
            };
            if listener.tx.send(Ok(batch)).is_err() {
                closed.push(*id);
            }
        }

        for id in closed {
            listeners.remove(&id);
        }
    }
}

/// Changes turning result set `old` into `new`.
///
/// Removals come first in descending old index, then additions and
/// modifications in ascending new index. A document that stays in the result
/// set is reported as modified only when its version changed.
#[must_use]
pub fn diff_results(old: &[DocumentSnapshot], new: &[DocumentSnapshot]) -> Vec<DocumentChange> {
    let old_index: HashMap<&DocumentRef, usize> = old
        .iter()
        .enumerate()
        .map(|(i, d)| (&d.reference, i))
        .collect();
    let new_index: HashMap<&DocumentRef, usize> = new
        .iter()
        .enumerate()
        .map(|(i, d)| (&d.reference, i))
        .collect();

    let mut changes: Vec<DocumentChange> = old
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, d)| !new_index.contains_key(&d.reference))
        .map(|(i, d)| DocumentChange::removed(d.clone(), i))
        .collect();

    for (i, doc) in new.iter().enumerate() {
        match old_index.get(&doc.reference) {
            None => changes.push(DocumentChange::added(doc.clone(), i)),
            Some(&j) if old[j].version != doc.version => {
                changes.push(DocumentChange::modified(doc.clone(), j, i));
            }
            Some(_) => {}
        }
    }

    changes
}
