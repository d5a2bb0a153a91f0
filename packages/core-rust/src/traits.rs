use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::document::{ChangeBatch, DocumentSnapshot};
use crate::error::Result;
use crate::path::{CollectionPath, DocumentRef};
use crate::query::Query;
use crate::types::FieldMap;

/// Hosted document database as seen by the client core.
///
/// Implementations: the in-memory `MemoryStore` (tests, demo). A network
/// client for a hosted service would implement the same contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Allocates a reference with a fresh, unique id. Does not write anything.
    fn new_document(&self, collection: &CollectionPath) -> DocumentRef;

    /// Reads a single document, or `None` if it does not exist.
    async fn get(&self, reference: &DocumentRef) -> Result<Option<DocumentSnapshot>>;

    /// Runs a query once and returns its ordered result set.
    async fn query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>>;

    /// Creates or replaces a document.
    async fn set(&self, reference: &DocumentRef, fields: FieldMap) -> Result<()>;

    /// Merges `fields` into an existing document. Fails with `NotFound` if absent.
    async fn update(&self, reference: &DocumentRef, fields: FieldMap) -> Result<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete(&self, reference: &DocumentRef) -> Result<()>;

    /// Creates a document with a generated id.
    async fn add(&self, collection: &CollectionPath, fields: FieldMap) -> Result<DocumentRef> {
        let reference = self.new_document(collection);
        self.set(&reference, fields).await?;
        Ok(reference)
    }

    /// Opens a live subscription to `query`.
    ///
    /// The first batch lists the current result set; later batches carry the
    /// incremental changes of each committed write. Subscription-level
    /// failures arrive as `Err` items and end the subscription.
    fn listen(&self, query: &Query) -> Result<Subscription>;

    /// Runs `function` atomically, retrying it on commit conflicts.
    ///
    /// Either every write buffered by a single attempt lands, consistent with
    /// the reads taken in that attempt, or none do.
    async fn run_transaction(&self, function: &dyn TransactionFunction) -> Result<()>;
}

/// One attempt of a read-modify-write transaction.
///
/// Reads go to the store; writes are buffered until commit.
#[async_trait]
pub trait Transaction: Send {
    /// Reads a document inside the transaction, observing this attempt's own
    /// buffered writes.
    async fn get(&mut self, reference: &DocumentRef) -> Result<Option<DocumentSnapshot>>;

    /// Buffers a create-or-replace.
    fn set(&mut self, reference: &DocumentRef, fields: FieldMap);

    /// Buffers a merge into an existing document.
    fn update(&mut self, reference: &DocumentRef, fields: FieldMap);

    /// Buffers a delete.
    fn delete(&mut self, reference: &DocumentRef);
}

/// Body of a transaction. May be invoked several times, once per attempt.
#[async_trait]
pub trait TransactionFunction: Send + Sync {
    async fn run(&self, txn: &mut dyn Transaction) -> Result<()>;
}

/// A live query: the registration that keeps it open and the channel its
/// batches arrive on.
#[derive(Debug)]
pub struct Subscription {
    pub registration: ListenerRegistration,
    pub batches: mpsc::UnboundedReceiver<Result<ChangeBatch>>,
}

/// Scoped handle to an open listener.
///
/// The listener is removed exactly once: by [`remove`](Self::remove) or, on
/// every other exit path, when the handle is dropped.
pub struct ListenerRegistration {
    remover: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new(remover: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remover: Some(Box::new(remover)),
        }
    }

    /// Closes the listener. No batch is sent on its channel afterwards.
    pub fn remove(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(remover) = self.remover.take() {
            remover();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.remover.is_some())
            .finish()
    }
}
