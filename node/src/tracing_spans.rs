//! Pre-built [`tracing::Span`] constructors for common chainwatch operations.
//!
//! Consistent span names and fields make it easy to filter and correlate
//! walker and API activity in any tracing backend.

use tracing::{info_span, Span};

/// Span covering classification and persistence of a single block.
pub fn walk_block_span(height: u64) -> Span {
    info_span!("walk_block", height)
}

/// Span covering a single query API request.
pub fn rpc_span(route: &str) -> Span {
    info_span!("rpc", route = %route)
}
