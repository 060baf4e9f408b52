//! Model Context Protocol (MCP) primitives used by the SSG gateway.
//!
//! This crate is intentionally scoped to the parts the gateway needs:
//! - JSON-RPC 2.0 envelope types shared by the transport and the dispatcher
//! - the MCP request/result payloads for `initialize`, `tools/list`, and
//!   `tools/call`
//! - SSE frame encoding (server side) and decoding (tests/clients)

mod jsonrpc;
mod sse;
mod types;

pub use jsonrpc::{
    JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
pub use sse::{decode_sse_events, encode_sse_frame, parse_first_json_message_from_sse};
pub use types::{
    CallToolParams, CallToolResult, ContentBlock, InitializeParams, InitializeResult,
    ListToolsParams, ListToolsResult, McpClientInfo, McpServerInfo, Tool,
};

/// Streamable HTTP transport convention implemented by this gateway.
pub const PROTOCOL_VERSION: &str = "2025-06-18";
