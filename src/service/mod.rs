//! Service layer: the lock-holding store facade and retention.

pub mod explorer_store;
pub mod retention;

pub use explorer_store::ExplorerStore;
pub use retention::RetentionManager;
