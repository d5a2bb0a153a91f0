//! In-memory [`DocumentStore`] with live queries and optimistic transactions.
//!
//! [`MemoryStore`] wires the storage layers together:
//! - [`HashMapStorage`] holds documents
//! - [`ListenerRegistry`] turns commits into live-query change batches
//! - [`CompositeMutationObserver`] fans commits out to the registry and any
//!   extra observers
//!
//! Every write, transactional or not, goes through a single commit path that
//! validates everything before applying anything, so a commit is either fully
//! visible or not at all.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use fireeats_core::{
    ClockSource, CollectionPath, DocumentRef, DocumentSnapshot, DocumentStore, Error, FieldMap,
    ListenerRegistration, Query, Result, Subscription, SystemClock, TransactionFunction,
};
use parking_lot::RwLock;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::faults::FaultInjector;
use crate::listeners::ListenerRegistry;
use crate::storage::{
    CompositeMutationObserver, DocumentMetadata, HashMapStorage, MutationObserver, StorageEngine,
    StoredDocument, TracingObserver,
};
use crate::transaction::{MemoryTransaction, ReadSet, Write};

/// Length of generated document ids.
const AUTO_ID_LENGTH: usize = 20;

/// Result of a commit that passed validation of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitOutcome {
    Applied,
    /// A read version no longer matches; the attempt must be retried.
    Conflict,
}

/// Deterministic in-memory stand-in for the hosted document database.
pub struct MemoryStore {
    engine: Arc<dyn StorageEngine>,
    listeners: Arc<ListenerRegistry>,
    observer: CompositeMutationObserver,
    /// Commits take the write side; reads and listener registration the read side.
    commit_lock: RwLock<()>,
    last_version: AtomicU64,
    faults: FaultInjector,
    clock: Arc<dyn ClockSource>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Creates an empty store backed by [`HashMapStorage`].
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let engine: Arc<dyn StorageEngine> = Arc::new(HashMapStorage::new());
        let listeners = Arc::new(ListenerRegistry::new(Arc::clone(&engine)));
        let observer = CompositeMutationObserver::new(vec![
            Arc::clone(&listeners) as Arc<dyn MutationObserver>,
            Arc::new(TracingObserver),
        ]);
        Self {
            engine,
            listeners,
            observer,
            commit_lock: RwLock::new(()),
            last_version: AtomicU64::new(0),
            faults: FaultInjector::default(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the clock used for document timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers an extra mutation observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MutationObserver>) -> Self {
        self.observer.add(observer);
        self
    }

    /// Fault injection controls.
    #[must_use]
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Ends every open listener with an error, as a lost connection or a
    /// revoked permission would.
    pub fn fail_listeners(&self, make_error: impl Fn() -> Error) {
        let _guard = self.commit_lock.read();
        self.listeners.fail_all(make_error);
    }

    /// Number of open listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of stored documents across all collections.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.engine.len()
    }

    /// Metadata of a stored document.
    #[must_use]
    pub fn metadata(&self, reference: &DocumentRef) -> Option<DocumentMetadata> {
        self.read_stored(reference).map(|d| d.metadata)
    }

    pub(crate) fn read_stored(&self, reference: &DocumentRef) -> Option<StoredDocument> {
        let _guard = self.commit_lock.read();
        self.engine.get(reference)
    }

    /// Validates and applies one commit.
    ///
    /// Validation covers read versions, armed faults, and update targets.
    /// Nothing is written unless all of it passes. Forced conflicts only
    /// apply to commits that carry reads, i.e. transactions.
    fn commit(&self, reads: &ReadSet, writes: &[Write]) -> Result<CommitOutcome> {
        let _guard = self.commit_lock.write();

        if !reads.is_empty() && self.faults.take_conflict() {
            return Ok(CommitOutcome::Conflict);
        }
        for (reference, observed) in reads {
            let current = self.engine.get(reference).map(|d| d.metadata.version);
            if current != *observed {
                return Ok(CommitOutcome::Conflict);
            }
        }
        if let Some(reference) = self.faults.failing_write(writes.iter().map(Write::reference)) {
            return Err(Error::Unavailable(format!("write to {reference} rejected")));
        }

        // Stage the final state of every touched document, in first-touch order.
        let mut order: Vec<DocumentRef> = Vec::new();
        let mut staged: HashMap<DocumentRef, (Option<StoredDocument>, Option<FieldMap>)> =
            HashMap::new();
        for write in writes {
            let reference = write.reference();
            let entry = staged.entry(reference.clone()).or_insert_with(|| {
                order.push(reference.clone());
                let old = self.engine.get(reference);
                let fields = old.as_ref().map(|d| d.fields.clone());
                (old, fields)
            });
            entry.1 = write.apply(entry.1.take())?;
        }

        let now = self.clock.now_millis();
        let mut changed = Vec::with_capacity(order.len());
        for reference in order {
            let Some((old, new)) = staged.remove(&reference) else {
                continue;
            };
            match (old, new) {
                (None, None) => continue,
                (None, Some(fields)) => {
                    let document = StoredDocument {
                        fields,
                        metadata: DocumentMetadata::new(self.next_version(), now),
                    };
                    self.engine.put(&reference, document.clone());
                    self.observer.on_put(&reference, &document);
                }
                (Some(old), Some(fields)) => {
                    let mut metadata = old.metadata.clone();
                    metadata.on_update(self.next_version(), now);
                    let document = StoredDocument { fields, metadata };
                    self.engine.put(&reference, document.clone());
                    self.observer.on_update(&reference, &old, &document);
                }
                (Some(old), None) => {
                    self.engine.remove(&reference);
                    self.observer.on_remove(&reference, &old);
                }
            }
            changed.push(reference);
        }

        if !changed.is_empty() {
            self.observer.on_commit(&changed);
        }
        Ok(CommitOutcome::Applied)
    }

    fn next_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Applies a single non-transactional write.
    fn write(&self, write: Write) -> Result<()> {
        match self.commit(&ReadSet::new(), &[write])? {
            CommitOutcome::Applied => Ok(()),
            CommitOutcome::Conflict => Err(Error::Internal(anyhow::anyhow!(
                "blind write reported a conflict"
            ))),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

fn auto_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(AUTO_ID_LENGTH);
    id
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn new_document(&self, collection: &CollectionPath) -> DocumentRef {
        collection.doc(&auto_id())
    }

    async fn get(&self, reference: &DocumentRef) -> Result<Option<DocumentSnapshot>> {
        Ok(self.read_stored(reference).map(|d| d.snapshot(reference)))
    }

    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        let _guard = self.commit_lock.read();
        Ok(self.listeners.evaluate(query))
    }

    async fn set(&self, reference: &DocumentRef, fields: FieldMap) -> Result<()> {
        self.write(Write::Set {
            reference: reference.clone(),
            fields,
        })
    }

    async fn update(&self, reference: &DocumentRef, fields: FieldMap) -> Result<()> {
        self.write(Write::Update {
            reference: reference.clone(),
            fields,
        })
    }

    async fn delete(&self, reference: &DocumentRef) -> Result<()> {
        self.write(Write::Delete {
            reference: reference.clone(),
        })
    }

    fn listen(&self, query: &Query) -> Result<Subscription> {
        let _guard = self.commit_lock.read();
        let (id, batches) = self.listeners.register(query);
        let registry: Weak<ListenerRegistry> = Arc::downgrade(&self.listeners);
        let registration = ListenerRegistration::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.unregister(id);
            }
        });
        Ok(Subscription {
            registration,
            batches,
        })
    }

    async fn run_transaction(&self, function: &dyn TransactionFunction) -> Result<()> {
        let max_attempts = self.config.max_transaction_attempts.max(1);

        for attempt in 1..=max_attempts {
            let span = tracing::info_span!("transaction", attempt);
            let mut txn = MemoryTransaction::new(self);
            function.run(&mut txn).instrument(span.clone()).await?;

            let (reads, writes) = txn.into_parts();
            match self.commit(&reads, &writes)? {
                CommitOutcome::Applied => {
                    span.in_scope(|| tracing::debug!(writes = writes.len(), "transaction committed"));
                    return Ok(());
                }
                CommitOutcome::Conflict => {
                    span.in_scope(|| tracing::warn!("transaction conflicted, retrying"));
                    if !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        Err(Error::Aborted {
            attempts: max_attempts,
        })
    }
}
