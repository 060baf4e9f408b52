//! Per-client session records and their idle-expiry store.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use rand::RngCore as _;
use serde_json::Value;

/// One logical client connection, created by the `initialize` handshake and
/// addressed by the `Mcp-Session-Id` header afterwards.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: Instant,
    last_access: Instant,
    /// Set once the `initialize` request that created the session was handled.
    pub initialized: bool,
    /// Outbound messages waiting for the client's next GET drain.
    pub pending: VecDeque<Value>,
    event_counter: u64,
    pub request_count: u64,
    pub error_count: u64,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_access: now,
            initialized: false,
            pending: VecDeque::new(),
            event_counter: 0,
            request_count: 0,
            error_count: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Mint the next SSE event id for this session.
    ///
    /// The counter only increases and is never reused within the session's
    /// lifetime, so clients can use `Last-Event-ID` to detect gaps.
    pub fn next_event_id(&mut self) -> String {
        self.event_counter += 1;
        format!("{}-{}", self.id, self.event_counter)
    }
}

/// Owns every live session; the transport only touches sessions through the
/// operations here. None of them can fail — absence is an `Option` or `bool`.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: HashMap::new(),
        }
    }

    /// Create and register a session under a fresh unguessable identifier,
    /// sweeping expired sessions on the way.
    pub fn create(&mut self) -> &mut Session {
        self.cleanup();
        let id = new_session_id();
        self.sessions
            .entry(id)
            .or_insert_with_key(|id| Session::new(id.clone()))
    }

    /// Look up a session, refreshing its last-access timestamp on a hit.
    pub fn get(&mut self, id: &str) -> Option<&mut Session> {
        let session = self.sessions.get_mut(id)?;
        session.last_access = Instant::now();
        Some(session)
    }

    /// Remove a session. Idempotent; returns whether one existed.
    pub fn delete(&mut self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop every session idle for longer than the TTL.
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.sessions
            .retain(|_, s| now.duration_since(s.last_access) <= ttl);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 256 bits of fresh randomness, rendered as lowercase hex.
fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
