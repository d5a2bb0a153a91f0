//! Storage layers behind the in-memory document store.
//!
//! - [`StorageEngine`]: low-level document storage keyed by [`DocumentRef`](fireeats_core::DocumentRef)
//! - [`StoredDocument`]: fields plus store-internal metadata
//! - [`MutationObserver`]: reacts to committed writes; [`CompositeMutationObserver`]
//!   fans out to several observers

pub mod engine;
pub mod engines;
pub mod mutation_observer;
pub mod record;

pub use engine::*;
pub use engines::HashMapStorage;
pub use mutation_observer::*;
pub use record::*;
