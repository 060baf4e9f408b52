//! Streamable HTTP transport for the SSG gateway.
//!
//! One logical endpoint (default `/mcp`) speaking JSON-RPC 2.0 over HTTP
//! request/response plus SSE streaming, with per-session sliding-window rate
//! limiting and a process-wide circuit breaker over the downstream message
//! handler. Sessions live in process memory only; there is no durability
//! across restarts.

pub mod circuit;
pub mod config;
pub mod http;
pub mod rate_limit;
pub mod session;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{RateLimitConfig, TransportConfig};
pub use http::{HealthStatus, MessageHandler, StreamableHttp, serve};
pub use rate_limit::RateLimiter;
pub use session::{Session, SessionStore};

use thiserror::Error;

/// Transport-level failures surfaced to callers of the streaming primitives.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `send` after `close`, or the client went away.
    #[error("SSE stream is closed")]
    StreamClosed,

    #[error("bind address: {0}")]
    Bind(#[from] std::io::Error),
}
