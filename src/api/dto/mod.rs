//! Data Transfer Objects for REST request/response serialization.
//!
//! Entity records are returned as stored; these types cover query
//! parameters, list envelopes and the composite or system responses.

pub mod block_dto;
pub mod common_dto;
pub mod query_dto;
pub mod system_dto;

pub use block_dto::*;
pub use common_dto::*;
pub use query_dto::*;
pub use system_dto::*;
