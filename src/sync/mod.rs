//! Incremental synchronization against the upstream sources.
//!
//! [`SyncCycle`] performs one bounded ingestion pass: recent activity,
//! activity backfill, tip discovery and block batch, market, validator,
//! vault and transfer refreshes, and an occasional retention sweep.
//! [`run_scheduler`] drives it on a fixed period.

pub mod cycle;
pub mod reconciler;
pub mod scheduler;
pub mod tip;

pub use cycle::{CycleReport, SyncConfig, SyncCycle, SyncSources};
pub use reconciler::{LinkedActivity, Reconciler};
pub use scheduler::run_scheduler;
pub use tip::{Frontier, TipConfig, TipDiscovery};
