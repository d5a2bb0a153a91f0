//! Document snapshots and the change events delivered by live queries.

use serde::{Deserialize, Serialize};

use crate::path::DocumentRef;
use crate::types::{FieldMap, Value};

/// A document as read from the store at a particular version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Handle to the document this snapshot was read from.
    pub reference: DocumentRef,
    /// Field contents at `version`.
    pub fields: FieldMap,
    /// Store-assigned version, increasing with every write to any document.
    pub version: u64,
}

impl DocumentSnapshot {
    #[must_use]
    pub fn new(reference: DocumentRef, fields: FieldMap, version: u64) -> Self {
        Self {
            reference,
            fields,
            version,
        }
    }

    /// The document id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// A single field, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Kind of change a live query reports for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The document entered the result set.
    Added,
    /// The document stayed in the result set but its contents or position changed.
    Modified,
    /// The document left the result set.
    Removed,
}

/// One document-level change within a [`ChangeBatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    /// The document after the change (before it, for `Removed`).
    pub document: DocumentSnapshot,
    /// Position in the ordered result set before the change. `None` for `Added`.
    pub old_index: Option<usize>,
    /// Position in the ordered result set after the change. `None` for `Removed`.
    pub new_index: Option<usize>,
}

impl DocumentChange {
    #[must_use]
    pub fn added(document: DocumentSnapshot, new_index: usize) -> Self {
        Self {
            kind: ChangeKind::Added,
            document,
            old_index: None,
            new_index: Some(new_index),
        }
    }

    #[must_use]
    pub fn modified(document: DocumentSnapshot, old_index: usize, new_index: usize) -> Self {
        Self {
            kind: ChangeKind::Modified,
            document,
            old_index: Some(old_index),
            new_index: Some(new_index),
        }
    }

    #[must_use]
    pub fn removed(document: DocumentSnapshot, old_index: usize) -> Self {
        Self {
            kind: ChangeKind::Removed,
            document,
            old_index: Some(old_index),
            new_index: None,
        }
    }
}

/// A batch of changes delivered together by a live query.
///
/// The first batch of every subscription is `initial` and lists the whole
/// result set as `Added` changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub changes: Vec<DocumentChange>,
    pub initial: bool,
}

impl ChangeBatch {
    /// Changes of the given kind, in delivery order.
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &DocumentChange> {
        self.changes.iter().filter(move |c| c.kind == kind)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
