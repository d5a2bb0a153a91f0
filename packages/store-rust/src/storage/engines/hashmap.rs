//! In-memory [`StorageEngine`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking.

use dashmap::DashMap;
use fireeats_core::{CollectionPath, DocumentRef};

use crate::storage::engine::StorageEngine;
use crate::storage::record::StoredDocument;

/// In-memory storage backed by [`DashMap`] for concurrent read access.
///
/// Readers never block each other; writers contend only on the shard
/// holding the written key.
pub struct HashMapStorage {
    documents: DashMap<DocumentRef, StoredDocument>,
}

impl HashMapStorage {
    /// Creates a new, empty `HashMapStorage`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }
}

impl Default for HashMapStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for HashMapStorage {
    fn put(&self, reference: &DocumentRef, document: StoredDocument) -> Option<StoredDocument> {
        self.documents.insert(reference.clone(), document)
    }

    fn get(&self, reference: &DocumentRef) -> Option<StoredDocument> {
        self.documents.get(reference).map(|d| d.clone())
    }

    fn remove(&self, reference: &DocumentRef) -> Option<StoredDocument> {
        self.documents.remove(reference).map(|(_, d)| d)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }

    fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn collection_snapshot(&self, collection: &CollectionPath) -> Vec<(DocumentRef, StoredDocument)> {
        self.documents
            .iter()
            .filter(|entry| entry.key().parent() == collection)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use fireeats_core::{FieldMap, Value};

    use super::*;
    use crate::storage::record::DocumentMetadata;

    fn make_document(version: u64) -> StoredDocument {
        StoredDocument {
            fields: FieldMap::from([("name".to_string(), Value::from("X"))]),
            metadata: DocumentMetadata::new(version, 0),
        }
    }

    fn restaurant(id: &str) -> DocumentRef {
        CollectionPath::root("restaurants").doc(id)
    }

    #[test]
    fn put_get_remove_round_trip() {
        let storage = HashMapStorage::new();

        assert!(storage.put(&restaurant("a"), make_document(1)).is_none());

        let fetched = storage.get(&restaurant("a"));
        assert_eq!(fetched.map(|d| d.metadata.version), Some(1));

        let previous = storage.put(&restaurant("a"), make_document(2));
        assert_eq!(previous.map(|d| d.metadata.version), Some(1));

        let removed = storage.remove(&restaurant("a"));
        assert_eq!(removed.map(|d| d.metadata.version), Some(2));
        assert!(storage.get(&restaurant("a")).is_none());
    }

    #[test]
    fn len_counts_every_collection() {
        let storage = HashMapStorage::new();
        assert!(storage.is_empty());

        storage.put(&restaurant("a"), make_document(1));
        storage.put(&restaurant("a").collection("ratings").doc("r1"), make_document(2));
        storage.put(&restaurant("a"), make_document(3));
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn collection_snapshot_excludes_subcollections() {
        let storage = HashMapStorage::new();
        let ratings = restaurant("a").collection("ratings");

        storage.put(&restaurant("a"), make_document(1));
        storage.put(&restaurant("b"), make_document(2));
        storage.put(&ratings.doc("r1"), make_document(3));

        let mut ids: Vec<String> = storage
            .collection_snapshot(&CollectionPath::root("restaurants"))
            .into_iter()
            .map(|(r, _)| r.id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);

        let reviews = storage.collection_snapshot(&ratings);
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].0.id(), "r1");
    }
}
