//! The streamable HTTP wire protocol: method routing, envelope validation,
//! dispatch to the injected message handler, and response assembly (plain
//! JSON, batched JSON, or SSE).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Context as _;
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::{StreamExt as _, wrappers::UnboundedReceiverStream};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use ssg_mcp::{
    JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcResponse, PROTOCOL_VERSION, encode_sse_frame,
};

use crate::TransportError;
use crate::circuit::{CircuitBreaker, CircuitState};
use crate::config::TransportConfig;
use crate::rate_limit::RateLimiter;
use crate::session::SessionStore;

pub const SESSION_ID_HEADER: &str = "mcp-session-id";
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Downstream consumer of client messages.
///
/// `Ok(None)` signals notification semantics (no response). An `Err` is a
/// downstream failure, not a protocol error; the transport decides how it
/// surfaces (inline `-32603` within a batch, 500 + breaker failure otherwise).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: JsonRpcMessage) -> anyhow::Result<Option<JsonRpcResponse>>;
}

type CloseHandler = Box<dyn Fn() + Send + Sync>;

/// Snapshot of transport health for external monitoring. Producing it does
/// not mutate any transport state.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub circuit_state: CircuitState,
    pub active_sessions: usize,
}

struct Inner {
    cfg: TransportConfig,
    sessions: Mutex<SessionStore>,
    limiter: Mutex<RateLimiter>,
    breaker: Mutex<CircuitBreaker>,
    handler: Arc<dyn MessageHandler>,
    on_close: StdMutex<Option<CloseHandler>>,
}

/// The streamable HTTP transport: one logical MCP endpoint binding session
/// store, rate limiter, circuit breaker, and SSE emitter together.
#[derive(Clone)]
pub struct StreamableHttp {
    inner: Arc<Inner>,
}

impl StreamableHttp {
    pub fn new(cfg: TransportConfig, handler: Arc<dyn MessageHandler>) -> Self {
        let sessions = SessionStore::new(cfg.session_ttl);
        let limiter = RateLimiter::new(cfg.rate_limit.window, cfg.rate_limit.max_requests);
        let breaker = CircuitBreaker::new(cfg.circuit_breaker.clone());
        Self {
            inner: Arc::new(Inner {
                cfg,
                sessions: Mutex::new(sessions),
                limiter: Mutex::new(limiter),
                breaker: Mutex::new(breaker),
                handler,
                on_close: StdMutex::new(None),
            }),
        }
    }

    /// Register a hook invoked whenever a session is terminated via DELETE.
    pub fn set_close_handler(&self, f: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut guard) = self.inner.on_close.lock() {
            *guard = Some(Box::new(f));
        }
    }

    /// Queue an outbound message for a session; the client collects it on its
    /// next GET drain. Returns false for unknown sessions.
    pub async fn queue_message(&self, session_id: &str, message: Value) -> bool {
        let mut sessions = self.inner.sessions.lock().await;
        match sessions.get(session_id) {
            Some(session) => {
                session.pending.push_back(message);
                true
            }
            None => false,
        }
    }

    pub async fn health(&self) -> HealthStatus {
        HealthStatus {
            circuit_state: self.inner.breaker.lock().await.state(),
            active_sessions: self.inner.sessions.lock().await.len(),
        }
    }

    /// Background sweep of idle sessions and stale rate-limit windows.
    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let transport = self.clone();
        let interval = transport.inner.cfg.cleanup_interval;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately.
            tick.tick().await;
            loop {
                tick.tick().await;
                transport.inner.sessions.lock().await.cleanup();
                transport.inner.limiter.lock().await.cleanup();
                debug!("transport cleanup sweep completed");
            }
        })
    }

    pub fn router(&self) -> Router {
        let endpoint = self.inner.cfg.endpoint_path.clone();
        Router::new()
            .route(
                &endpoint,
                post(post_mcp)
                    .get(get_mcp)
                    .delete(delete_mcp)
                    .options(preflight),
            )
            .route("/health", axum::routing::get(health))
            .layer(middleware::from_fn_with_state(
                self.clone(),
                standard_headers,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    /// Origin allow-list, then circuit breaker. Shared by POST/GET/DELETE.
    async fn pre_checks(&self, headers: &HeaderMap) -> Result<(), Response> {
        if let Some(allowed) = &self.inner.cfg.allowed_origins
            && let Some(origin) = header_str(headers, header::ORIGIN.as_str())
            && !allowed.iter().any(|o| o == origin)
        {
            warn!(origin, "rejecting request from disallowed origin");
            return Err(error_response(StatusCode::FORBIDDEN, "Origin not allowed"));
        }

        if self.inner.cfg.circuit_breaker_enabled
            && !self.inner.breaker.lock().await.can_execute()
        {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
            ));
        }

        Ok(())
    }

    async fn record_success(&self) {
        if self.inner.cfg.circuit_breaker_enabled {
            self.inner.breaker.lock().await.record_success();
        }
    }

    async fn record_failure(&self) {
        if self.inner.cfg.circuit_breaker_enabled {
            self.inner.breaker.lock().await.record_failure();
        }
    }
}

/// Run the transport on a TCP listener, with the periodic cleanup task.
pub async fn serve(addr: SocketAddr, transport: StreamableHttp) -> anyhow::Result<()> {
    let cleanup = transport.spawn_cleanup();
    let path = transport.inner.cfg.endpoint_path.clone();
    let app = transport.router();

    info!(addr = %addr, path = %path, "starting MCP streamable HTTP server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app).await?;

    cleanup.abort();
    Ok(())
}

/// Adds `MCP-Protocol-Version` everywhere and CORS headers when enabled,
/// including on router fallbacks (404/405).
async fn standard_headers(
    State(st): State<StreamableHttp>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        PROTOCOL_VERSION_HEADER,
        HeaderValue::from_static(PROTOCOL_VERSION),
    );

    if st.inner.cfg.enable_cors {
        let allow_origin = origin.unwrap_or_else(|| HeaderValue::from_static("*"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(
                "Content-Type, Accept, Origin, Mcp-Session-Id, Last-Event-ID",
            ),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("Mcp-Session-Id, MCP-Protocol-Version"),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        );
    }

    response
}

/// CORS preflight short-circuits before origin and breaker checks.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health(State(st): State<StreamableHttp>) -> Json<HealthStatus> {
    Json(st.health().await)
}

async fn post_mcp(
    State(st): State<StreamableHttp>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = st.pre_checks(&headers).await {
        return resp;
    }

    let timeout = st.inner.cfg.request_timeout;
    match tokio::time::timeout(timeout, handle_post(&st, &headers, &body)).await {
        Ok(PostOutcome::Done(response)) => {
            st.record_success().await;
            response
        }
        Ok(PostOutcome::HandlerFailed(message)) => {
            warn!(error = %message, "message handler failed");
            st.record_failure().await;
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &message)
        }
        Err(_elapsed) => {
            // The in-flight dispatch future was dropped; the downstream
            // handler is cancelled rather than left running.
            warn!(timeout_ms = timeout.as_millis() as u64, "request timed out");
            st.record_failure().await;
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Request timeout")
        }
    }
}

enum PostOutcome {
    Done(Response),
    /// A single-message dispatch failed downstream; escalates to the outer
    /// error path (500 + breaker failure). Batch failures stay inline.
    HandlerFailed(String),
}

async fn handle_post(st: &StreamableHttp, headers: &HeaderMap, body: &Bytes) -> PostOutcome {
    // 1. Parse; no partial processing on failure.
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "rejecting unparseable POST body");
            return PostOutcome::Done(error_response(
                StatusCode::BAD_REQUEST,
                "Invalid JSON body",
            ));
        }
    };

    // 2. Normalize to a list of messages.
    let (raw_messages, batched) = match value {
        Value::Array(items) => (items, true),
        single => (vec![single], false),
    };
    if raw_messages.is_empty() {
        return PostOutcome::Done(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid JSON-RPC message",
        ));
    }

    // 3. Envelope validation, all before any dispatch.
    let mut messages = Vec::with_capacity(raw_messages.len());
    for raw in &raw_messages {
        if raw.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return PostOutcome::Done(error_response(
                StatusCode::BAD_REQUEST,
                "Invalid JSON-RPC message",
            ));
        }
        match serde_json::from_value::<JsonRpcMessage>(raw.clone()) {
            Ok(msg) => messages.push(msg),
            Err(_) => {
                return PostOutcome::Done(error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid JSON-RPC message",
                ));
            }
        }
    }

    // 4. Session resolution: initialize creates, everything else looks up.
    let is_initialize = messages
        .iter()
        .any(|m| m.method() == Some("initialize"));

    let session_id = {
        let mut sessions = st.inner.sessions.lock().await;
        if is_initialize {
            let session = sessions.create();
            session.initialized = true;
            let id = session.id().to_string();
            info!(session_id = %id, "created session");
            id
        } else {
            let Some(sid) = header_str(headers, SESSION_ID_HEADER) else {
                return PostOutcome::Done(error_response(
                    StatusCode::BAD_REQUEST,
                    "Missing Mcp-Session-Id header",
                ));
            };
            let Some(session) = sessions.get(sid) else {
                return PostOutcome::Done(error_response(
                    StatusCode::NOT_FOUND,
                    "Session not found",
                ));
            };
            session.id().to_string()
        }
    };

    // 5. Rate limiting, keyed by session, skipped for initialize.
    if !is_initialize
        && st.inner.cfg.rate_limit.enabled
        && !st.inner.limiter.lock().await.is_allowed(&session_id)
    {
        debug!(session_id = %session_id, "rate limit exceeded");
        return PostOutcome::Done(with_session(
            error_response(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
            &session_id,
        ));
    }

    if let Some(session) = st.inner.sessions.lock().await.get(&session_id) {
        session.request_count += 1;
    }

    // 6. Sequential dispatch, responses assembled strictly in input order.
    let mut responses: Vec<JsonRpcResponse> = Vec::new();
    for message in messages {
        let message_id = message.id().cloned();
        match st.inner.handler.handle(message).await {
            Ok(Some(response)) => responses.push(response),
            Ok(None) => {}
            Err(e) => {
                if let Some(session) = st.inner.sessions.lock().await.get(&session_id) {
                    session.error_count += 1;
                }
                if !batched {
                    return PostOutcome::HandlerFailed(e.to_string());
                }
                responses.push(JsonRpcResponse::err(
                    message_id.unwrap_or(JsonRpcId::Null),
                    JsonRpcError {
                        code: -32603,
                        message: e.to_string(),
                        data: None,
                    },
                ));
            }
        }
    }

    // 7. Response shape.
    if responses.is_empty() {
        return PostOutcome::Done(with_session(
            StatusCode::ACCEPTED.into_response(),
            &session_id,
        ));
    }

    let wants_sse = header_str(headers, header::ACCEPT.as_str())
        .is_some_and(|accept| accept.contains("text/event-stream"));

    if wants_sse && responses.len() > 1 {
        let frames = {
            let mut sessions = st.inner.sessions.lock().await;
            let Some(session) = sessions.get(&session_id) else {
                return PostOutcome::Done(error_response(
                    StatusCode::NOT_FOUND,
                    "Session not found",
                ));
            };
            responses
                .iter()
                .map(|r| {
                    let data = serde_json::to_value(r).unwrap_or(Value::Null);
                    (data, session.next_event_id())
                })
                .collect::<Vec<_>>()
        };
        return PostOutcome::Done(with_session(sse_drain_response(frames), &session_id));
    }

    let response = if responses.len() == 1 {
        Json(&responses[0]).into_response()
    } else {
        Json(&responses).into_response()
    };
    PostOutcome::Done(with_session(response, &session_id))
}

/// GET drains the session's pending queue over SSE and closes the stream.
/// Repeated polling is the expected usage, not a long-lived push channel.
async fn get_mcp(State(st): State<StreamableHttp>, headers: HeaderMap) -> Response {
    if let Err(resp) = st.pre_checks(&headers).await {
        return resp;
    }

    let Some(sid) = header_str(&headers, SESSION_ID_HEADER) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header");
    };

    let frames = {
        let mut sessions = st.inner.sessions.lock().await;
        let Some(session) = sessions.get(sid) else {
            return error_response(StatusCode::NOT_FOUND, "Session not found");
        };
        let mut frames = Vec::with_capacity(session.pending.len());
        while let Some(message) = session.pending.pop_front() {
            let event_id = session.next_event_id();
            frames.push((message, event_id));
        }
        frames
    };

    debug!(session_id = %sid, drained = frames.len(), "flushing pending messages");
    with_session(sse_drain_response(frames), sid)
}

async fn delete_mcp(State(st): State<StreamableHttp>, headers: HeaderMap) -> Response {
    if let Err(resp) = st.pre_checks(&headers).await {
        return resp;
    }

    let Some(sid) = header_str(&headers, SESSION_ID_HEADER) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header");
    };

    let existed = st.inner.sessions.lock().await.delete(sid);
    if !existed {
        return error_response(StatusCode::NOT_FOUND, "Session not found");
    }

    info!(session_id = %sid, "session terminated");
    if let Ok(guard) = st.inner.on_close.lock()
        && let Some(on_close) = guard.as_ref()
    {
        on_close();
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Sending half of an SSE response body. Dropping (or `close`) ends the
/// stream; `send` after that returns an error.
pub struct SseSender {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl SseSender {
    pub fn send(&self, data: &Value, event_id: Option<&str>) -> Result<(), TransportError> {
        let frame = encode_sse_frame(data, event_id);
        self.tx
            .send(Bytes::from(frame))
            .map_err(|_| TransportError::StreamClosed)
    }

    pub fn close(self) {}
}

/// An SSE body plus its sending half.
pub fn sse_channel() -> (SseSender, Body) {
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    let stream = UnboundedReceiverStream::new(rx).map(Ok::<_, std::io::Error>);
    (SseSender { tx }, Body::from_stream(stream))
}

/// Stream the given `(message, event id)` pairs and close: the drain-and-close
/// shape used by both the POST SSE mode and the GET pending flush.
fn sse_drain_response(frames: Vec<(Value, String)>) -> Response {
    let (sender, body) = sse_channel();
    for (data, event_id) in &frames {
        let _ = sender.send(data, Some(event_id));
    }
    sender.close();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn with_session(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}
