//! Mirrored query collection.
//!
//! [`LocalCollection`] subscribes to a live query, keeps an ordered and
//! de-duplicated snapshot of the matching documents decoded into typed
//! records, and reports every batch of changes to a handler.
//!
//! Batches from one subscription are applied by a single driver task, so
//! batch N+1 is never touched before batch N's snapshot update and handler
//! call have completed. Every `listen()` starts a new subscription
//! generation; batches of an older generation are discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use fireeats_core::{
    ChangeBatch, ChangeKind, DocumentChange, DocumentRef, DocumentSerializable, DocumentSnapshot,
    DocumentStore, Error, ListenerRegistration, Query, Result, Subscription,
};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use tokio::sync::mpsc;

/// Decoded records and the documents they were decoded from, index for index.
///
/// Positions in a [`ChangeBatch`] count every document of the remote result
/// set, including those that failed to decode. The snapshot therefore also
/// tracks the remote order of all references and derives its own order from it.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    records: Vec<T>,
    documents: Vec<DocumentSnapshot>,
    remote: Vec<DocumentRef>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            documents: Vec::new(),
            remote: Vec::new(),
        }
    }
}

impl<T> Snapshot<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] unless `index < len()`.
    pub fn get(&self, index: usize) -> Result<&T> {
        self.records.get(index).ok_or(Error::OutOfRange {
            index,
            count: self.len(),
        })
    }

    #[must_use]
    pub fn document(&self, index: usize) -> Option<&DocumentSnapshot> {
        self.documents.get(index)
    }

    /// Position of the document with this reference. Linear in the snapshot size.
    #[must_use]
    pub fn index_of(&self, reference: &DocumentRef) -> Option<usize> {
        self.documents.iter().position(|d| &d.reference == reference)
    }

    #[must_use]
    pub fn records(&self) -> &[T] {
        &self.records
    }

    #[must_use]
    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    fn forget(&mut self, reference: &DocumentRef) {
        if let Some(position) = self.remote.iter().position(|r| r == reference) {
            self.remote.remove(position);
        }
    }
}

impl<T: DocumentSerializable> Snapshot<T> {
    /// Applies one batch of changes.
    ///
    /// Removals go first, then every modified or added document is taken out
    /// of the remote order and re-inserted at its new index in ascending
    /// order. An added document that is already present replaces the old
    /// entry. Documents that fail to decode keep their remote position but
    /// get no record.
    fn apply(&mut self, batch: &ChangeBatch) {
        if batch.initial {
            self.remote.clear();
            self.records.clear();
            self.documents.clear();
        }

        let mut decoded: HashMap<DocumentRef, (T, DocumentSnapshot)> = self
            .records
            .drain(..)
            .zip(self.documents.drain(..))
            .map(|(record, document)| (document.reference.clone(), (record, document)))
            .collect();

        for change in batch.of_kind(ChangeKind::Removed) {
            self.forget(&change.document.reference);
            decoded.remove(&change.document.reference);
        }

        let mut placed: Vec<(usize, &DocumentRef)> = Vec::new();
        let upserts = batch
            .of_kind(ChangeKind::Modified)
            .chain(batch.of_kind(ChangeKind::Added));
        for change in upserts {
            let reference = &change.document.reference;
            self.forget(reference);
            decoded.remove(reference);
            match T::from_fields(&change.document.fields) {
                Some(record) => {
                    decoded.insert(reference.clone(), (record, change.document.clone()));
                }
                None => tracing::debug!(
                    path = %reference,
                    kind = ?change.kind,
                    "skipping document that failed to decode"
                ),
            }
            placed.push((change.new_index.unwrap_or(usize::MAX), reference));
        }

        placed.sort_by_key(|(index, _)| *index);
        for (index, reference) in placed {
            let at = index.min(self.remote.len());
            self.remote.insert(at, reference.clone());
        }

        for reference in &self.remote {
            if let Some((record, document)) = decoded.remove(reference) {
                self.records.push(record);
                self.documents.push(document);
            }
        }
    }
}

/// What the handler is told about.
#[derive(Debug)]
pub enum CollectionUpdate<'a, T> {
    /// A batch was applied. `snapshot` is the post-update state.
    Changed {
        changes: &'a [DocumentChange],
        snapshot: &'a Snapshot<T>,
    },
    /// The subscription failed and has ended. The snapshot is retained.
    Failed(&'a Error),
}

/// Boxed change handler of a [`LocalCollection`].
pub type ChangeHandler<T> = Box<dyn FnMut(CollectionUpdate<'_, T>, &ListenControl) + Send>;

/// Subscription bookkeeping shared with the driver task and handler controls.
#[derive(Default)]
struct Lifecycle {
    generation: AtomicU64,
    registration: Mutex<Option<ListenerRegistration>>,
}

impl Lifecycle {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Ends the active subscription, if any. Never waits on the driver task.
    fn stop(&self) -> bool {
        let Some(registration) = self.registration.lock().take() else {
            return false;
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        registration.remove();
        true
    }

    /// Ends `generation` after its channel failed, unless it was already replaced.
    fn finish(&self, generation: u64) {
        let registration = {
            let mut slot = self.registration.lock();
            if !self.is_current(generation) {
                return;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            slot.take()
        };
        drop(registration);
    }
}

/// Lets a handler stop the collection that is calling it.
#[derive(Clone)]
pub struct ListenControl {
    lifecycle: Weak<Lifecycle>,
}

impl ListenControl {
    /// Same as [`LocalCollection::stop_listening`]. No further batch of the
    /// current subscription is applied or reported once this returns.
    pub fn stop_listening(&self) {
        if let Some(lifecycle) = self.lifecycle.upgrade() {
            lifecycle.stop();
        }
    }
}

impl std::fmt::Debug for ListenControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenControl").finish_non_exhaustive()
    }
}

struct Shared<T> {
    snapshot: RwLock<Snapshot<T>>,
    handler: Mutex<ChangeHandler<T>>,
    lifecycle: Arc<Lifecycle>,
}

impl<T: DocumentSerializable> Shared<T> {
    fn control(&self) -> ListenControl {
        ListenControl {
            lifecycle: Arc::downgrade(&self.lifecycle),
        }
    }

    fn deliver(&self, batch: &ChangeBatch, generation: u64) {
        let mut handler = self.handler.lock();

        let mut snapshot = self.snapshot.write();
        if !self.lifecycle.is_current(generation) {
            return;
        }
        snapshot.apply(batch);
        let snapshot = RwLockWriteGuard::downgrade(snapshot);

        if !self.lifecycle.is_current(generation) {
            return;
        }
        (*handler)(
            CollectionUpdate::Changed {
                changes: &batch.changes,
                snapshot: &snapshot,
            },
            &self.control(),
        );
    }

    fn fail(&self, error: &Error, generation: u64) {
        let mut handler = self.handler.lock();
        if !self.lifecycle.is_current(generation) {
            return;
        }
        self.lifecycle.finish(generation);
        tracing::warn!(error = %error, "collection subscription failed");
        (*handler)(CollectionUpdate::Failed(error), &self.control());
    }
}

async fn drive<T>(
    shared: Arc<Shared<T>>,
    generation: u64,
    mut batches: mpsc::UnboundedReceiver<Result<ChangeBatch>>,
) where
    T: DocumentSerializable,
{
    while let Some(item) = batches.recv().await {
        if !shared.lifecycle.is_current(generation) {
            break;
        }
        match item {
            Ok(batch) => shared.deliver(&batch, generation),
            Err(error) => {
                shared.fail(&error, generation);
                break;
            }
        }
    }
    tracing::trace!(generation, "collection driver finished");
}

/// A typed, live mirror of one query's result set.
pub struct LocalCollection<T> {
    store: Arc<dyn DocumentStore>,
    query: Query,
    shared: Arc<Shared<T>>,
}

impl<T> LocalCollection<T>
where
    T: DocumentSerializable + Clone + Send + Sync + 'static,
{
    /// Binds a collection to `query`. Nothing is subscribed until [`listen`](Self::listen).
    pub fn new(
        store: Arc<dyn DocumentStore>,
        query: Query,
        handler: impl FnMut(CollectionUpdate<'_, T>, &ListenControl) + Send + 'static,
    ) -> Self {
        Self {
            store,
            query,
            shared: Arc::new(Shared {
                snapshot: RwLock::new(Snapshot::default()),
                handler: Mutex::new(Box::new(handler)),
                lifecycle: Arc::new(Lifecycle::default()),
            }),
        }
    }

    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Opens the subscription. Does nothing while one is already active.
    ///
    /// Must be called from within a tokio runtime: batches are applied by a
    /// task spawned on it. The first batch of the new subscription replaces
    /// whatever snapshot was retained from an earlier one.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the subscription cannot be opened.
    pub fn listen(&self) -> Result<()> {
        let lifecycle = &self.shared.lifecycle;
        let mut slot = lifecycle.registration.lock();
        if slot.is_some() {
            return Ok(());
        }

        let Subscription {
            registration,
            batches,
        } = self.store.listen(&self.query)?;
        let generation = lifecycle.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some(registration);
        drop(slot);

        tracing::debug!(collection = %self.query.collection, generation, "listening");
        tokio::spawn(drive(Arc::clone(&self.shared), generation, batches));
        Ok(())
    }

    /// Closes the subscription, keeping the snapshot. Does nothing when
    /// inactive and is safe to call from inside the handler.
    pub fn stop_listening(&self) {
        if self.shared.lifecycle.stop() {
            tracing::debug!(collection = %self.query.collection, "stopped listening");
        }
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.shared.lifecycle.registration.lock().is_some()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.shared.snapshot.read_recursive().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The record at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] unless `index < count()`.
    pub fn get(&self, index: usize) -> Result<T> {
        self.shared.snapshot.read_recursive().get(index).cloned()
    }

    /// The document the record at `index` was decoded from.
    #[must_use]
    pub fn document(&self, index: usize) -> Option<DocumentSnapshot> {
        self.shared.snapshot.read_recursive().document(index).cloned()
    }

    #[must_use]
    pub fn index_of(&self, reference: &DocumentRef) -> Option<usize> {
        self.shared.snapshot.read_recursive().index_of(reference)
    }

    /// Copy of every record, in query order.
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        self.shared.snapshot.read_recursive().records().to_vec()
    }
}

impl<T> Drop for LocalCollection<T> {
    fn drop(&mut self) {
        self.shared.lifecycle.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use fireeats_core::{
        CollectionPath, FieldMap, Restaurant, SortDirection, Transaction, TransactionFunction,
        Value, RESTAURANTS,
    };
    use std::collections::BTreeMap;

    use fireeats_store::{diff_results, MemoryStore, StoreConfig};
    use proptest::prelude::*;

    use super::*;

    type Names = Vec<String>;

    fn restaurants() -> CollectionPath {
        CollectionPath::root(RESTAURANTS)
    }

    fn restaurant(name: &str) -> FieldMap {
        Restaurant::new(name, "Pizza", "San Jose", 2).to_fields()
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(StoreConfig {
            max_transaction_attempts: 5,
            retry_backoff: Duration::ZERO,
        }))
    }

    fn by_name() -> Query {
        Query::collection(restaurants()).order_by("name", SortDirection::Asc)
    }

    /// A collection whose handler reports the record names after each batch.
    fn names_collection(
        store: &Arc<MemoryStore>,
        query: Query,
    ) -> (
        LocalCollection<Restaurant>,
        mpsc::UnboundedReceiver<std::result::Result<Names, String>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let collection = LocalCollection::new(
            Arc::clone(store) as Arc<dyn DocumentStore>,
            query,
            move |update: CollectionUpdate<'_, Restaurant>, _: &ListenControl| {
                let report = match update {
                    CollectionUpdate::Changed { snapshot, .. } => {
                        Ok(snapshot.records().iter().map(|r| r.name.clone()).collect())
                    }
                    CollectionUpdate::Failed(error) => Err(error.to_string()),
                };
                let _ = tx.send(report);
            },
        );
        (collection, rx)
    }

    async fn next_names(
        rx: &mut mpsc::UnboundedReceiver<std::result::Result<Names, String>>,
    ) -> Names {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("handler was not called")
            .expect("handler dropped")
            .expect("subscription failed")
    }

    async fn assert_quiet<M>(rx: &mut mpsc::UnboundedReceiver<M>) {
        let outcome = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(outcome.is_err(), "handler was called unexpectedly");
    }

    /// Writes several documents in one commit so they arrive as one batch.
    struct WriteAll(Vec<(DocumentRef, FieldMap)>);

    #[async_trait]
    impl TransactionFunction for WriteAll {
        async fn run(&self, txn: &mut dyn Transaction) -> Result<()> {
            for (reference, fields) in &self.0 {
                txn.set(reference, fields.clone());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn new_collection_is_empty_and_idle() {
        let store = store();
        let (collection, mut rx) = names_collection(&store, by_name());
        assert!(collection.is_empty());
        assert!(!collection.is_listening());
        assert_eq!(store.listener_count(), 0);
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn add_add_remove_scenario() {
        let store = store();
        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        assert!(next_names(&mut rx).await.is_empty());

        let a = restaurants().doc("docA");
        let b = restaurants().doc("docB");
        store
            .run_transaction(&WriteAll(vec![
                (a.clone(), restaurant("X")),
                (b.clone(), restaurant("Y")),
            ]))
            .await
            .unwrap();

        assert_eq!(next_names(&mut rx).await, vec!["X", "Y"]);
        assert_eq!(collection.count(), 2);
        assert_eq!(collection.get(0).unwrap().name, "X");
        assert_eq!(collection.get(1).unwrap().name, "Y");

        store.delete(&a).await.unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["Y"]);
        assert_eq!(collection.count(), 1);
        assert_eq!(collection.get(0).unwrap().name, "Y");
        assert_eq!(collection.index_of(&b), Some(0));
        assert_eq!(collection.index_of(&a), None);
    }

    #[tokio::test]
    async fn records_and_documents_stay_in_step() {
        let store = store();
        for (id, name) in [("c", "Gamma"), ("a", "Alpha"), ("b", "Beta")] {
            store.set(&restaurants().doc(id), restaurant(name)).await.unwrap();
        }
        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        next_names(&mut rx).await;

        // Renaming moves the document to the end of the ordering.
        store.set(&restaurants().doc("a"), restaurant("Zeta")).await.unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["Beta", "Gamma", "Zeta"]);

        for i in 0..collection.count() {
            let record = collection.get(i).unwrap();
            let document = collection.document(i).unwrap();
            assert_eq!(Restaurant::from_fields(&document.fields), Some(record));
        }
    }

    #[tokio::test]
    async fn malformed_documents_are_skipped() {
        let store = store();
        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        next_names(&mut rx).await;

        let malformed = FieldMap::from([("name".to_string(), Value::Int(7))]);
        store
            .run_transaction(&WriteAll(vec![
                (restaurants().doc("bad"), malformed),
                (restaurants().doc("one"), restaurant("One")),
                (restaurants().doc("two"), restaurant("Two")),
            ]))
            .await
            .unwrap();

        assert_eq!(next_names(&mut rx).await, vec!["One", "Two"]);
        assert_eq!(collection.count(), 2);
    }

    #[tokio::test]
    async fn skipped_documents_do_not_shift_later_inserts() {
        let store = store();
        let undecodable = FieldMap::from([("name".to_string(), Value::from("B"))]);
        store.set(&restaurants().doc("b"), undecodable).await.unwrap();
        store.set(&restaurants().doc("c"), restaurant("C")).await.unwrap();

        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["C"]);

        store.set(&restaurants().doc("a"), restaurant("A")).await.unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["A", "C"]);

        // Remote position 2 sits after the undecodable "B" but before "C".
        store.set(&restaurants().doc("bz"), restaurant("Bz")).await.unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["A", "Bz", "C"]);
        assert_eq!(collection.index_of(&restaurants().doc("c")), Some(2));
    }

    #[tokio::test]
    async fn document_modified_into_garbage_leaves_the_snapshot() {
        let store = store();
        let reference = restaurants().doc("a");
        store.set(&reference, restaurant("Alpha")).await.unwrap();
        store.set(&restaurants().doc("b"), restaurant("Beta")).await.unwrap();

        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["Alpha", "Beta"]);

        store
            .update(&reference, FieldMap::from([("price".to_string(), Value::from("cheap"))]))
            .await
            .unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["Beta"]);
        assert_eq!(collection.index_of(&reference), None);
    }

    #[tokio::test]
    async fn listen_and_stop_are_idempotent() {
        let store = store();
        let (collection, mut rx) = names_collection(&store, by_name());

        collection.listen().unwrap();
        collection.listen().unwrap();
        assert_eq!(store.listener_count(), 1);
        next_names(&mut rx).await;
        assert_quiet(&mut rx).await;

        collection.stop_listening();
        collection.stop_listening();
        assert!(!collection.is_listening());
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn stopped_collection_retains_snapshot_and_ignores_writes() {
        let store = store();
        store.set(&restaurants().doc("a"), restaurant("Alpha")).await.unwrap();
        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        next_names(&mut rx).await;

        collection.stop_listening();
        store.set(&restaurants().doc("b"), restaurant("Beta")).await.unwrap();

        assert_quiet(&mut rx).await;
        assert_eq!(collection.records().len(), 1);
    }

    #[tokio::test]
    async fn relisten_overwrites_retained_snapshot() {
        let store = store();
        store.set(&restaurants().doc("a"), restaurant("Alpha")).await.unwrap();
        store.set(&restaurants().doc("b"), restaurant("Beta")).await.unwrap();
        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["Alpha", "Beta"]);

        collection.stop_listening();
        store.delete(&restaurants().doc("a")).await.unwrap();
        store.set(&restaurants().doc("c"), restaurant("Gamma")).await.unwrap();
        assert_eq!(collection.count(), 2);

        collection.listen().unwrap();
        assert_eq!(next_names(&mut rx).await, vec!["Beta", "Gamma"]);
        assert_eq!(collection.count(), 2);
    }

    #[tokio::test]
    async fn handler_observes_post_update_state() {
        let store = store();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let collection = LocalCollection::new(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            by_name(),
            move |update: CollectionUpdate<'_, Restaurant>, _: &ListenControl| {
                if let CollectionUpdate::Changed { changes, snapshot } = update {
                    let _ = tx.send((changes.len(), snapshot.len(), snapshot.get(0).ok().cloned()));
                }
            },
        );
        collection.listen().unwrap();
        let _initial = rx.recv().await.unwrap();

        store.set(&restaurants().doc("a"), restaurant("Alpha")).await.unwrap();
        let (changes, count, first) = rx.recv().await.unwrap();
        assert_eq!(changes, 1);
        assert_eq!(count, 1);
        assert_eq!(first.map(|r| r.name), Some("Alpha".to_string()));
    }

    #[tokio::test]
    async fn handler_can_stop_listening() {
        let store = store();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let collection = LocalCollection::new(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            by_name(),
            move |update: CollectionUpdate<'_, Restaurant>, control: &ListenControl| {
                if let CollectionUpdate::Changed { snapshot, .. } = update {
                    if !snapshot.is_empty() {
                        control.stop_listening();
                    }
                    let _ = tx.send(snapshot.len());
                }
            },
        );
        collection.listen().unwrap();
        assert_eq!(rx.recv().await, Some(0));

        store.set(&restaurants().doc("a"), restaurant("Alpha")).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
        assert!(!collection.is_listening());
        assert_eq!(store.listener_count(), 0);

        store.set(&restaurants().doc("b"), restaurant("Beta")).await.unwrap();
        assert_quiet(&mut rx).await;
        assert_eq!(collection.count(), 1);
    }

    #[tokio::test]
    async fn subscription_errors_reach_the_handler() {
        let store = store();
        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        next_names(&mut rx).await;

        store.fail_listeners(|| Error::PermissionDenied("rules rejected listen".into()));
        let report = rx.recv().await.unwrap();
        assert_eq!(report, Err("permission denied: rules rejected listen".to_string()));
        assert!(!collection.is_listening());

        // The ended subscription can be replaced.
        collection.listen().unwrap();
        assert!(next_names(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn get_out_of_range_is_an_error() {
        let store = store();
        store.set(&restaurants().doc("a"), restaurant("Alpha")).await.unwrap();
        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        next_names(&mut rx).await;

        assert!(matches!(
            collection.get(1),
            Err(Error::OutOfRange { index: 1, count: 1 })
        ));
        assert!(collection.document(1).is_none());
    }

    #[tokio::test]
    async fn drop_releases_the_subscription() {
        let store = store();
        let (collection, mut rx) = names_collection(&store, by_name());
        collection.listen().unwrap();
        next_names(&mut rx).await;
        assert_eq!(store.listener_count(), 1);

        drop(collection);
        assert_eq!(store.listener_count(), 0);
    }

    fn snap(id: &str, name: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(restaurants().doc(id), restaurant(name), 1)
    }

    fn names(snapshot: &Snapshot<Restaurant>) -> Vec<&str> {
        snapshot.records().iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn duplicate_added_replaces_existing_entry() {
        let mut snapshot = Snapshot::<Restaurant>::default();
        snapshot.apply(&ChangeBatch {
            changes: vec![
                DocumentChange::added(snap("a", "Alpha"), 0),
                DocumentChange::added(snap("b", "Beta"), 1),
            ],
            initial: true,
        });
        snapshot.apply(&ChangeBatch {
            changes: vec![DocumentChange::added(snap("a", "Alpha Two"), 0)],
            initial: false,
        });
        assert_eq!(names(&snapshot), vec!["Alpha Two", "Beta"]);
    }

    #[test]
    fn positions_past_the_end_are_clamped() {
        let mut snapshot = Snapshot::<Restaurant>::default();
        snapshot.apply(&ChangeBatch {
            changes: vec![
                DocumentChange::added(snap("a", "Alpha"), 5),
                DocumentChange::added(snap("b", "Beta"), 9),
            ],
            initial: false,
        });
        assert_eq!(names(&snapshot), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn initial_batch_clears_the_snapshot() {
        let mut snapshot = Snapshot::<Restaurant>::default();
        snapshot.apply(&ChangeBatch {
            changes: vec![DocumentChange::added(snap("a", "Alpha"), 0)],
            initial: false,
        });
        snapshot.apply(&ChangeBatch {
            changes: vec![DocumentChange::added(snap("b", "Beta"), 0)],
            initial: true,
        });
        assert_eq!(names(&snapshot), vec!["Beta"]);
    }

    #[test]
    fn undecodable_document_keeps_its_remote_position() {
        let mut snapshot = Snapshot::<Restaurant>::default();
        let undecodable = DocumentSnapshot::new(
            restaurants().doc("b"),
            FieldMap::from([("name".to_string(), Value::from("B"))]),
            1,
        );
        snapshot.apply(&ChangeBatch {
            changes: vec![
                DocumentChange::added(undecodable.clone(), 0),
                DocumentChange::added(snap("c", "C"), 1),
            ],
            initial: true,
        });
        snapshot.apply(&ChangeBatch {
            changes: vec![DocumentChange::added(snap("bz", "Bz"), 1)],
            initial: false,
        });
        assert_eq!(names(&snapshot), vec!["Bz", "C"]);

        // Once it leaves the result set, later positions close up.
        snapshot.apply(&ChangeBatch {
            changes: vec![
                DocumentChange::removed(undecodable, 0),
                DocumentChange::added(snap("a", "A"), 0),
            ],
            initial: false,
        });
        assert_eq!(names(&snapshot), vec!["A", "Bz", "C"]);
    }

    /// Store documents keyed by id: a name tier and whether the document decodes.
    fn stored(state: &BTreeMap<u8, (u8, bool)>) -> Vec<DocumentSnapshot> {
        state
            .iter()
            .map(|(id, (tier, decodes))| {
                let name = format!("n{tier:02}");
                let fields = if *decodes {
                    restaurant(&name)
                } else {
                    FieldMap::from([("name".to_string(), Value::from(name.as_str()))])
                };
                let version = u64::from(*tier) * 2 + u64::from(*decodes) + 1;
                DocumentSnapshot::new(restaurants().doc(&format!("d{id:02}")), fields, version)
            })
            .collect()
    }

    proptest! {
        /// After every batch the snapshot is the query's result set minus the
        /// documents that do not decode, in query order.
        #[test]
        fn snapshot_follows_query_order(
            states in prop::collection::vec(
                prop::collection::btree_map(0u8..12, (0u8..6, any::<bool>()), 0..10),
                1..6,
            ),
        ) {
            let query = by_name().limit(6);
            let mut snapshot = Snapshot::<Restaurant>::default();
            let mut previous: Vec<DocumentSnapshot> = Vec::new();

            for (step, state) in states.iter().enumerate() {
                let results = query.apply(stored(state));
                snapshot.apply(&ChangeBatch {
                    changes: diff_results(&previous, &results),
                    initial: step == 0,
                });

                let expected: Vec<&DocumentRef> = results
                    .iter()
                    .filter(|d| Restaurant::from_fields(&d.fields).is_some())
                    .map(|d| &d.reference)
                    .collect();
                let actual: Vec<&DocumentRef> =
                    snapshot.documents().iter().map(|d| &d.reference).collect();
                prop_assert_eq!(actual, expected);
                prop_assert_eq!(snapshot.records().len(), snapshot.documents().len());
                previous = results;
            }
        }
    }
}
