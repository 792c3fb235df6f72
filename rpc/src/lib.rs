//! HTTP query API for chainwatch.
//!
//! Provides endpoints for:
//! - The last fully processed block height
//! - Subscribing an address
//! - The recorded transaction history of an address
//! - Walker status and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;
pub mod service;

pub use error::RpcError;
pub use server::{router, ApiState, RpcServer};
pub use service::{QueryService, SubscribeOutcome};
