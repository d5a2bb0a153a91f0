//! `FireEats` Core — documents, queries, change events, and typed records.

pub mod clock;
pub mod document;
pub mod error;
pub mod models;
pub mod path;
pub mod query;
pub mod record;
pub mod traits;
pub mod types;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use document::{ChangeBatch, ChangeKind, DocumentChange, DocumentSnapshot};
pub use error::{Error, Result};
pub use models::{Author, Restaurant, Review, RATINGS, RATING_RANGE, RESTAURANTS};
pub use path::{CollectionPath, DocumentRef};
pub use query::{Filter, OrderBy, Query, SortDirection};
pub use record::DocumentSerializable;
pub use traits::{
    DocumentStore, ListenerRegistration, Subscription, Transaction, TransactionFunction,
};
pub use types::{FieldMap, Value};
