//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams newly ingested blocks,
//! transactions, trades and market refreshes to clients subscribed to the
//! matching channels, and answers a few read-only commands.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
