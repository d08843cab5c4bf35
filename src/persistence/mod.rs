//! Persistence layer: debounced snapshots of the whole store.
//!
//! [`PersistenceWriter`] coalesces dirty marks into periodic snapshot
//! writes through a [`SnapshotSink`]. The concrete sink,
//! [`JsonFileSink`], stores one JSON document on disk.

pub mod json_file;
pub mod writer;

pub use json_file::JsonFileSink;
pub use writer::{PersistenceWriter, SnapshotSink};
