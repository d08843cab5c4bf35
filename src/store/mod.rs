//! Indexed in-memory store.
//!
//! [`IndexedStore`] holds every entity collection with its secondary
//! indexes and newest-first recent views. It is pure and synchronous;
//! locking, persistence triggers and event emission live in
//! [`crate::service`].

mod indexes;
pub mod indexed_store;
pub mod recent_view;
pub mod snapshot;

pub use indexed_store::{IndexedStore, StoreStats, SweepReport, UpsertOutcome};
pub use recent_view::RecentView;
pub use snapshot::{NextIds, PersistedState};
