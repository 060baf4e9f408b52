//! Adapter aggregation and namespaced tool resolution.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use ssg_mcp::{CallToolResult, Tool};

use crate::adapter::SsgAdapter;

/// Holds the adapter fleet and exposes its tools under namespaced names
/// (`"{adapter}:{tool}"`), so generators with overlapping tool vocabularies
/// (`build`, `serve`, `version`) never collide.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SsgAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn SsgAdapter>) {
        debug!(adapter = %adapter.name(), "registered adapter");
        self.adapters.push(adapter);
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn adapter(&self, name: &str) -> Option<&Arc<dyn SsgAdapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    /// Connect every adapter. A single connect failure is logged and
    /// skipped rather than aborting the rest of the fleet.
    pub async fn connect_all(&self) {
        for adapter in &self.adapters {
            if let Err(e) = adapter.connect().await {
                warn!(adapter = %adapter.name(), error = %e, "adapter connect failed");
            }
        }
    }

    pub async fn disconnect_all(&self) {
        for adapter in &self.adapters {
            if let Err(e) = adapter.disconnect().await {
                warn!(adapter = %adapter.name(), error = %e, "adapter disconnect failed");
            }
        }
    }

    /// Every tool of every connected adapter, in registration order, with
    /// names prefixed by the owning adapter.
    pub fn tools(&self) -> Vec<Tool> {
        let mut out = Vec::new();
        for adapter in &self.adapters {
            if !adapter.is_connected() {
                continue;
            }
            for mut tool in adapter.tools() {
                tool.name = format!("{}:{}", adapter.name(), tool.name);
                out.push(tool);
            }
        }
        out
    }

    /// Split a namespaced tool name into its adapter and bare tool name.
    pub fn resolve(&self, namespaced: &str) -> Option<(&Arc<dyn SsgAdapter>, String)> {
        let (adapter_name, tool) = namespaced.split_once(':')?;
        let adapter = self.adapter(adapter_name)?;
        Some((adapter, tool.to_string()))
    }

    /// Call a namespaced tool. `None` means the name did not resolve.
    pub async fn call(
        &self,
        namespaced: &str,
        arguments: Option<Value>,
    ) -> Option<anyhow::Result<CallToolResult>> {
        let (adapter, tool) = self.resolve(namespaced)?;
        Some(adapter.call_tool(&tool, arguments).await)
    }
}
