//! Block detail DTO.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Block, Transaction};

/// A block together with the transactions stored at its height.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BlockDetail {
    /// The block record.
    pub block: Block,
    /// Transactions at the block's height, newest first.
    pub transactions: Vec<Transaction>,
}
