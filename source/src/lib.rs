//! Ledger source capability for chainwatch.
//!
//! The walker only ever sees the [`LedgerSource`] trait: "current head height"
//! and "block by height". [`JsonRpcSource`] implements it against an
//! Ethereum-style JSON-RPC endpoint over HTTP.

pub mod error;
pub mod jsonrpc;
pub mod quantity;

pub use error::SourceError;
pub use jsonrpc::JsonRpcSource;

use async_trait::async_trait;
use chainwatch_types::{Block, BlockHeight};

/// Supplier of block data.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Height of the current chain head.
    async fn current_height(&self) -> Result<BlockHeight, SourceError>;

    /// The block at `height`.
    ///
    /// A height beyond the chain head is not an error: the returned block has
    /// `number == None`.
    async fn block_at(&self, height: BlockHeight) -> Result<Block, SourceError>;
}
