//! Commit observers.
//!
//! The store reports every applied write to a [`MutationObserver`]. The live
//! query registry is one; [`TracingObserver`] logs; tests count.

use std::sync::Arc;

use fireeats_core::DocumentRef;

use super::record::StoredDocument;

/// Observer for document mutations inside the store.
///
/// Per-document callbacks fire while a commit is being applied; `on_commit`
/// fires once afterwards with every document the commit touched, so
/// observers that need a consistent view (live queries) react only there.
///
/// Used as `Arc<dyn MutationObserver>`.
pub trait MutationObserver: Send + Sync {
    /// Called after a new document is created.
    fn on_put(&self, reference: &DocumentRef, document: &StoredDocument);

    /// Called after an existing document is replaced or merged.
    fn on_update(&self, reference: &DocumentRef, old: &StoredDocument, new: &StoredDocument);

    /// Called after a document is deleted.
    fn on_remove(&self, reference: &DocumentRef, old: &StoredDocument);

    /// Called once per commit, after all of its writes are applied.
    fn on_commit(&self, changed: &[DocumentRef]);
}

/// Composite observer that fans out to multiple observers.
#[derive(Default)]
pub struct CompositeMutationObserver {
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl CompositeMutationObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn MutationObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn MutationObserver>) {
        self.observers.push(observer);
    }
}

impl MutationObserver for CompositeMutationObserver {
    fn on_put(&self, reference: &DocumentRef, document: &StoredDocument) {
        for observer in &self.observers {
            observer.on_put(reference, document);
        }
    }

    fn on_update(&self, reference: &DocumentRef, old: &StoredDocument, new: &StoredDocument) {
        for observer in &self.observers {
            observer.on_update(reference, old, new);
        }
    }

    fn on_remove(&self, reference: &DocumentRef, old: &StoredDocument) {
        for observer in &self.observers {
            observer.on_remove(reference, old);
        }
    }

    fn on_commit(&self, changed: &[DocumentRef]) {
        for observer in &self.observers {
            observer.on_commit(changed);
        }
    }
}

/// Observer that logs every mutation at `trace` level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl MutationObserver for TracingObserver {
    fn on_put(&self, reference: &DocumentRef, document: &StoredDocument) {
        tracing::trace!(path = %reference, version = document.metadata.version, "document created");
    }

    fn on_update(&self, reference: &DocumentRef, _old: &StoredDocument, new: &StoredDocument) {
        tracing::trace!(path = %reference, version = new.metadata.version, "document updated");
    }

    fn on_remove(&self, reference: &DocumentRef, _old: &StoredDocument) {
        tracing::trace!(path = %reference, "document removed");
    }

    fn on_commit(&self, changed: &[DocumentRef]) {
        tracing::trace!(documents = changed.len(), "commit applied");
    }
}
