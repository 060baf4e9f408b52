use async_trait::async_trait;
use serde_json::Value;

use ssg_mcp::{CallToolResult, Tool};

/// Capability surface shared by every generator adapter.
///
/// Adapters are opaque subprocess-executing units to the rest of the
/// gateway: the dispatcher only sees this trait. `call_tool` returning
/// `Err` means the invocation itself broke (spawn failure, timeout);
/// tool-level failure (non-zero exit) is a `CallToolResult` with
/// `is_error` set, so the caller still gets the captured output.
#[async_trait]
pub trait SsgAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Implementation language of the generator itself (Go, Ruby, ...).
    fn language(&self) -> &str;

    fn description(&self) -> &str;

    async fn connect(&self) -> anyhow::Result<()>;

    async fn disconnect(&self) -> anyhow::Result<()>;

    fn is_connected(&self) -> bool;

    /// Tools this adapter offers, named without the adapter prefix.
    fn tools(&self) -> Vec<Tool>;

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<Value>,
    ) -> anyhow::Result<CallToolResult>;
}
