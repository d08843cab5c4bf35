//! # chain-explorer-indexer
//!
//! Incremental ingestion engine for a block explorer, backed by a
//! time-windowed indexed cache, with a REST API and a WebSocket feed.
//!
//! Every sync cycle pulls recent activity, the newest fresh blocks,
//! market snapshots, trades, validators, vaults and transfers from the
//! upstream endpoints, reconciles them into the in-memory
//! [`store::IndexedStore`], and publishes newly inserted records on the
//! [`domain::EventBus`]. The store is persisted as one JSON document through
//! a debounced background writer and swept by age.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ExplorerStore / RetentionManager (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── IndexedStore (store/) ──► PersistenceWriter ──► JSON file (persistence/)
//!     │
//!     └── SyncCycle + TipDiscovery + Reconciler (sync/)
//!             │
//!             └── HeightSource / ActivitySource (upstream/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod store;
pub mod sync;
pub mod upstream;
pub mod ws;
