//! SSE framing for MCP streamable HTTP.
//!
//! The server encodes one JSON message per blank-line-delimited event; the
//! decoder only cares about `data:` lines and is used by tests and by clients
//! consuming a streamed response body.

use serde_json::Value;

/// Encode one SSE frame carrying a JSON message.
///
/// The `id:` line is omitted when `event_id` is absent.
pub fn encode_sse_frame(data: &Value, event_id: Option<&str>) -> String {
    let json = serde_json::to_string(data).unwrap_or_else(|_| "null".to_string());
    match event_id {
        Some(id) => format!("event: message\ndata: {json}\nid: {id}\n\n"),
        None => format!("event: message\ndata: {json}\n\n"),
    }
}

/// Decode the `data` payloads of every blank-line-delimited SSE event in `buf`.
pub fn decode_sse_events(buf: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in buf.split('\n') {
        let l = line.trim_end_matches('\r');

        if l.is_empty() {
            if !data_lines.is_empty() {
                out.push(data_lines.join("\n"));
                data_lines.clear();
            }
            continue;
        }

        // Ignore comments and unknown fields.
        if l.starts_with(':') {
            continue;
        }

        if let Some(rest) = l.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }

    if !data_lines.is_empty() {
        out.push(data_lines.join("\n"));
    }

    out
}

pub fn parse_first_json_message_from_sse(body: &str) -> Option<Value> {
    let events = decode_sse_events(body);
    let first = events.first()?;
    serde_json::from_str(first).ok()
}
