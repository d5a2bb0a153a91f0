//! Buffered writes and the per-attempt transaction handle.

use std::collections::HashMap;

use async_trait::async_trait;
use fireeats_core::{DocumentRef, DocumentSnapshot, Error, FieldMap, Result, Transaction};

use crate::memory::MemoryStore;

/// A single buffered write.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Write {
    Set {
        reference: DocumentRef,
        fields: FieldMap,
    },
    Update {
        reference: DocumentRef,
        fields: FieldMap,
    },
    Delete {
        reference: DocumentRef,
    },
}

impl Write {
    pub(crate) fn reference(&self) -> &DocumentRef {
        match self {
            Self::Set { reference, .. }
            | Self::Update { reference, .. }
            | Self::Delete { reference } => reference,
        }
    }

    /// Folds this write over a document's current fields (`None` = absent).
    ///
    /// Updating an absent document fails with `NotFound`.
    pub(crate) fn apply(&self, current: Option<FieldMap>) -> Result<Option<FieldMap>> {
        match self {
            Self::Set { fields, .. } => Ok(Some(fields.clone())),
            Self::Update { reference, fields } => {
                let mut merged = current.ok_or_else(|| Error::NotFound {
                    path: reference.path(),
                })?;
                merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Some(merged))
            }
            Self::Delete { .. } => Ok(None),
        }
    }
}

/// Versions observed by an attempt's reads. `None` records "did not exist".
pub(crate) type ReadSet = HashMap<DocumentRef, Option<u64>>;

/// One attempt of a transaction against a [`MemoryStore`].
pub(crate) struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    reads: ReadSet,
    writes: Vec<Write>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new(store: &'a MemoryStore) -> Self {
        Self {
            store,
            reads: ReadSet::new(),
            writes: Vec::new(),
        }
    }

    pub(crate) fn into_parts(self) -> (ReadSet, Vec<Write>) {
        (self.reads, self.writes)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction<'_> {
    async fn get(&mut self, reference: &DocumentRef) -> Result<Option<DocumentSnapshot>> {
        let stored = self.store.read_stored(reference);
        self.reads
            .entry(reference.clone())
            .or_insert_with(|| stored.as_ref().map(|d| d.metadata.version));

        let pending: Vec<&Write> = self
            .writes
            .iter()
            .filter(|w| w.reference() == reference)
            .collect();
        if pending.is_empty() {
            return Ok(stored.map(|d| d.snapshot(reference)));
        }

        let version = stored.as_ref().map_or(0, |d| d.metadata.version);
        let mut fields = stored.map(|d| d.fields);
        for write in pending {
            fields = write.apply(fields)?;
        }
        Ok(fields.map(|f| DocumentSnapshot::new(reference.clone(), f, version)))
    }

    fn set(&mut self, reference: &DocumentRef, fields: FieldMap) {
        self.writes.push(Write::Set {
            reference: reference.clone(),
            fields,
        });
    }

    fn update(&mut self, reference: &DocumentRef, fields: FieldMap) {
        self.writes.push(Write::Update {
            reference: reference.clone(),
            fields,
        });
    }

    fn delete(&mut self, reference: &DocumentRef) {
        self.writes.push(Write::Delete {
            reference: reference.clone(),
        });
    }
}
