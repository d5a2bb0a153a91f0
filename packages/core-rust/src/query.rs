//! Query model and evaluation.
//!
//! A [`Query`] targets one collection and carries equality filters, an
//! ordering, and an optional limit. Evaluation is defined here so every store
//! implementation orders results identically.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::document::DocumentSnapshot;
use crate::path::CollectionPath;
use crate::types::Value;

/// Sort direction for a single ordering clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Equality filter on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

/// One ordering clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// A filtered, ordered, optionally limited view of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: CollectionPath,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<usize>,
}

impl Query {
    /// All documents of `collection`, in document-id order.
    #[must_use]
    pub fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Appends an ordering clause.
    #[must_use]
    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Caps the result set.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `doc` belongs to the result set, ignoring the limit.
    ///
    /// Documents missing an ordered-by field are excluded, as the hosted
    /// store does.
    #[must_use]
    pub fn matches(&self, doc: &DocumentSnapshot) -> bool {
        if doc.reference.parent() != &self.collection {
            return false;
        }
        let filters_hold = self.filters.iter().all(|filter| {
            doc.get(&filter.field)
                .is_some_and(|value| value.query_eq(&filter.value))
        });
        filters_hold && self.order_by.iter().all(|o| doc.get(&o.field).is_some())
    }

    /// Result-set ordering: each clause in turn, then document id ascending.
    #[must_use]
    pub fn compare(&self, a: &DocumentSnapshot, b: &DocumentSnapshot) -> Ordering {
        for clause in &self.order_by {
            let ord = match (a.get(&clause.field), b.get(&clause.field)) {
                (Some(x), Some(y)) => x.total_cmp(y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ord = match clause.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id().cmp(b.id())
    }

    /// Filters, sorts, and limits `docs` into this query's result set.
    #[must_use]
    pub fn apply<I>(&self, docs: I) -> Vec<DocumentSnapshot>
    where
        I: IntoIterator<Item = DocumentSnapshot>,
    {
        let mut results: Vec<DocumentSnapshot> =
            docs.into_iter().filter(|d| self.matches(d)).collect();
        results.sort_by(|a, b| self.compare(a, b));
        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}
