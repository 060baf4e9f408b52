use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use ssg_adapters::{AdapterRegistry, GatewayDispatcher, builtin_adapters};
use ssg_transport::{RateLimitConfig, StreamableHttp, TransportConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "ssg-gateway", version, about = "MCP gateway for static-site-generator CLIs")]
struct Args {
    /// TCP address to listen on.
    #[arg(long, env = "SSG_GATEWAY_ADDR", default_value = "127.0.0.1:3600")]
    addr: SocketAddr,

    /// HTTP path of the MCP endpoint.
    #[arg(long, env = "SSG_GATEWAY_ENDPOINT", default_value = "/mcp")]
    endpoint: String,

    /// Comma-separated Origin allow-list. Unset admits any origin.
    #[arg(long, env = "SSG_GATEWAY_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Option<Vec<String>>,

    /// Disable CORS headers and preflight handling.
    #[arg(long, env = "SSG_GATEWAY_NO_CORS")]
    no_cors: bool,

    /// Idle session expiry, in seconds.
    #[arg(long, env = "SSG_GATEWAY_SESSION_TTL_SECS", default_value_t = 1800)]
    session_ttl_secs: u64,

    /// Per-request processing timeout, in seconds.
    #[arg(long, env = "SSG_GATEWAY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Disable per-session rate limiting.
    #[arg(long, env = "SSG_GATEWAY_NO_RATE_LIMIT")]
    no_rate_limit: bool,

    /// Rate limit window, in seconds.
    #[arg(long, env = "SSG_GATEWAY_RATE_WINDOW_SECS", default_value_t = 60)]
    rate_window_secs: u64,

    /// Maximum requests per session within the window.
    #[arg(long, env = "SSG_GATEWAY_RATE_MAX_REQUESTS", default_value_t = 100)]
    rate_max_requests: usize,

    /// Disable the circuit breaker.
    #[arg(long, env = "SSG_GATEWAY_NO_CIRCUIT_BREAKER")]
    no_circuit_breaker: bool,

    /// Consecutive failures that open the circuit.
    #[arg(long, env = "SSG_GATEWAY_FAILURE_THRESHOLD", default_value_t = 5)]
    failure_threshold: u32,

    /// Circuit cooldown before a trial request, in seconds.
    #[arg(long, env = "SSG_GATEWAY_RESET_TIMEOUT_SECS", default_value_t = 30)]
    reset_timeout_secs: u64,
}

impl Args {
    fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            endpoint_path: self.endpoint.clone(),
            allowed_origins: self.allowed_origins.clone(),
            enable_cors: !self.no_cors,
            session_ttl: Duration::from_secs(self.session_ttl_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            rate_limit: RateLimitConfig {
                enabled: !self.no_rate_limit,
                window: Duration::from_secs(self.rate_window_secs),
                max_requests: self.rate_max_requests,
            },
            circuit_breaker_enabled: !self.no_circuit_breaker,
            circuit_breaker: ssg_transport::CircuitBreakerConfig {
                failure_threshold: self.failure_threshold,
                reset_timeout: Duration::from_secs(self.reset_timeout_secs),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hyper=warn,tower_http=info".into()),
        )
        .json()
        .init();

    let args = Args::parse();

    let mut registry = AdapterRegistry::new();
    for adapter in builtin_adapters() {
        registry.register(Arc::new(adapter));
    }
    registry.connect_all().await;
    info!(adapters = registry.len(), "adapter fleet registered");

    let dispatcher = Arc::new(GatewayDispatcher::new(Arc::new(registry)));
    let transport = StreamableHttp::new(args.transport_config(), dispatcher);

    ssg_transport::serve(args.addr, transport).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_onto_the_transport_config() {
        let args = Args::parse_from(["ssg-gateway"]);
        let cfg = args.transport_config();
        assert_eq!(cfg.endpoint_path, "/mcp");
        assert!(cfg.enable_cors);
        assert!(cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.max_requests, 100);
        assert_eq!(cfg.session_ttl, Duration::from_secs(1800));
        assert_eq!(cfg.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn flags_override_and_origins_split_on_commas() {
        let args = Args::parse_from([
            "ssg-gateway",
            "--no-cors",
            "--no-rate-limit",
            "--allowed-origins",
            "http://a.example,http://b.example",
            "--failure-threshold",
            "2",
        ]);
        let cfg = args.transport_config();
        assert!(!cfg.enable_cors);
        assert!(!cfg.rate_limit.enabled);
        assert_eq!(
            cfg.allowed_origins.as_deref(),
            Some(["http://a.example".to_string(), "http://b.example".to_string()].as_slice())
        );
        assert_eq!(cfg.circuit_breaker.failure_threshold, 2);
    }
}
