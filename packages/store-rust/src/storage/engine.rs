//! Low-level storage engine trait.
//!
//! Defines [`StorageEngine`], the innermost storage layer. Implementations
//! hold documents in memory keyed by their full reference.

use fireeats_core::{CollectionPath, DocumentRef};

use super::record::StoredDocument;

/// Low-level document storage.
///
/// All operations are synchronous. Atomicity across several documents is the
/// caller's concern; the engine only guarantees per-document consistency.
///
/// Wrapped in `Arc<dyn StorageEngine>` for sharing with observers.
pub trait StorageEngine: Send + Sync + 'static {
    /// Insert or replace a document. Returns the previous document if any.
    fn put(&self, reference: &DocumentRef, document: StoredDocument) -> Option<StoredDocument>;

    /// Retrieve a document, or `None` if not present.
    fn get(&self, reference: &DocumentRef) -> Option<StoredDocument>;

    /// Remove a document, returning the removed document.
    fn remove(&self, reference: &DocumentRef) -> Option<StoredDocument>;

    /// Return the number of stored documents across all collections.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Point-in-time copy of every document directly inside `collection`.
    ///
    /// Documents of nested sub-collections are not included.
    fn collection_snapshot(&self, collection: &CollectionPath) -> Vec<(DocumentRef, StoredDocument)>;
}
