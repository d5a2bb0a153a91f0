//! Stored document types.
//!
//! Defines what [`StorageEngine`](super::StorageEngine) holds per document:
//! the field map and [`DocumentMetadata`].

use fireeats_core::{DocumentRef, DocumentSnapshot, FieldMap};

/// Metadata tracked for every stored document.
///
/// Store-internal: only `version` is exposed to clients, through
/// [`DocumentSnapshot::version`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Store-wide write sequence number of the last write to this document.
    pub version: u64,
    /// Wall-clock time (millis since epoch) when the document was created.
    pub create_time: i64,
    /// Wall-clock time of the last write.
    pub update_time: i64,
}

impl DocumentMetadata {
    /// Metadata for a freshly created document.
    #[must_use]
    pub fn new(version: u64, now: i64) -> Self {
        Self {
            version,
            create_time: now,
            update_time: now,
        }
    }

    /// Records a write: takes the new version and updates `update_time`.
    pub fn on_update(&mut self, version: u64, now: i64) {
        self.version = version;
        self.update_time = now;
    }
}

/// A document as held by the storage engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub fields: FieldMap,
    pub metadata: DocumentMetadata,
}

impl StoredDocument {
    /// Client-facing snapshot of this document.
    #[must_use]
    pub fn snapshot(&self, reference: &DocumentRef) -> DocumentSnapshot {
        DocumentSnapshot::new(reference.clone(), self.fields.clone(), self.metadata.version)
    }
}
