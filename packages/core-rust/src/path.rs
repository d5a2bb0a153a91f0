//! Collection paths and document references.
//!
//! A [`DocumentRef`] is the stable handle to a remote document: its parent
//! [`CollectionPath`] plus a document id. Identity is path equality; the
//! reference itself carries no data.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Path to a collection, e.g. `restaurants` or `restaurants/abc/ratings`.
///
/// Always has an odd number of segments: collection ids alternate with
/// document ids, ending on a collection id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    /// A top-level collection.
    #[must_use]
    pub fn root(collection_id: &str) -> Self {
        Self {
            segments: vec![collection_id.to_string()],
        }
    }

    /// Parses a slash-separated path. Returns `None` for empty segments or an
    /// even segment count.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) || segments.len() % 2 == 0 {
            return None;
        }
        Some(Self { segments })
    }

    /// The last segment, naming the collection itself.
    #[must_use]
    pub fn collection_id(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Reference to the document `id` inside this collection.
    #[must_use]
    pub fn doc(&self, id: &str) -> DocumentRef {
        DocumentRef {
            parent: self.clone(),
            id: id.to_string(),
        }
    }

    /// The document owning this sub-collection, if any.
    #[must_use]
    pub fn parent_document(&self) -> Option<DocumentRef> {
        if self.segments.len() < 3 {
            return None;
        }
        let id = self.segments[self.segments.len() - 2].clone();
        let parent = Self {
            segments: self.segments[..self.segments.len() - 2].to_vec(),
        };
        Some(DocumentRef { parent, id })
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Stable handle to a single remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef {
    parent: CollectionPath,
    id: String,
}

impl DocumentRef {
    /// Parses a full document path such as `restaurants/abc`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let (parent, id) = path.rsplit_once('/')?;
        if id.is_empty() {
            return None;
        }
        Some(CollectionPath::parse(parent)?.doc(id))
    }

    /// The document id, unique within its collection.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The collection containing this document.
    #[must_use]
    pub fn parent(&self) -> &CollectionPath {
        &self.parent
    }

    /// A sub-collection nested under this document.
    #[must_use]
    pub fn collection(&self, collection_id: &str) -> CollectionPath {
        let mut segments = self.parent.segments.clone();
        segments.push(self.id.clone());
        segments.push(collection_id.to_string());
        CollectionPath { segments }
    }

    /// Full slash-separated path.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.parent, self.id)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent, self.id)
    }
}
