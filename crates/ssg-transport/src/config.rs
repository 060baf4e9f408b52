use std::time::Duration;

use crate::circuit::CircuitBreakerConfig;

/// Per-session sliding-window admission control settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Trailing window length.
    pub window: Duration,
    /// Maximum requests admitted per session within the window.
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(60),
            max_requests: 100,
        }
    }
}

/// Configuration surface of the streamable HTTP transport.
///
/// Every knob is independently overridable; the defaults mirror the protocol
/// convention this gateway implements.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// HTTP path of the single logical MCP endpoint.
    pub endpoint_path: String,
    /// When set, a present `Origin` header must match one of these exactly.
    pub allowed_origins: Option<Vec<String>>,
    /// Emit CORS headers on every response and answer preflights.
    pub enable_cors: bool,
    /// Idle time after which a session is swept.
    pub session_ttl: Duration,
    /// Upper bound on one POST request/dispatch cycle.
    pub request_timeout: Duration,
    /// Tick of the background store/limiter cleanup task.
    pub cleanup_interval: Duration,
    pub rate_limit: RateLimitConfig,
    /// When false the breaker is never consulted or recorded.
    pub circuit_breaker_enabled: bool,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/mcp".to_string(),
            allowed_origins: None,
            enable_cors: true,
            session_ttl: Duration::from_secs(30 * 60),
            request_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(60),
            rate_limit: RateLimitConfig::default(),
            circuit_breaker_enabled: true,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}
