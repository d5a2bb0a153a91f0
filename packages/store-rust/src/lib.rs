//! `FireEats` store: an in-memory implementation of the document store
//! contract defined in `fireeats-core`.
//!
//! - [`MemoryStore`]: documents, live queries, optimistic transactions
//! - [`FaultInjector`]: deterministic conflicts and write failures for tests
//! - [`storage`]: engine and mutation observer layers behind the store

pub mod config;
pub mod faults;
pub mod listeners;
pub mod memory;
pub mod storage;
mod transaction;

pub use config::StoreConfig;
pub use faults::FaultInjector;
pub use listeners::{diff_results, ListenerRegistry};
pub use memory::MemoryStore;
