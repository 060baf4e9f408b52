//! The one adapter implementation the fleet needs: a declarative mapping
//! from tool names to fixed argument templates for a single binary.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use ssg_mcp::{CallToolResult, Tool};

use crate::adapter::SsgAdapter;

/// One tool exposed by a [`CommandAdapter`]: a fixed argv template, plus an
/// opt-in for caller-supplied trailing arguments.
#[derive(Debug, Clone)]
pub struct CommandTool {
    pub name: String,
    pub description: String,
    pub args: Vec<String>,
    /// When set, a JSON `{"args": ["..."]}` argument object may append
    /// string arguments after the template.
    pub accepts_args: bool,
}

/// Subprocess-backed adapter for one generator binary.
///
/// Construction is declarative: name the binary once, then list the tools
/// as argument templates. The connect/disconnect lifecycle is a plain flag;
/// nothing is spawned until a tool is called.
pub struct CommandAdapter {
    name: String,
    language: String,
    description: String,
    program: String,
    timeout: Duration,
    tools: Vec<CommandTool>,
    connected: AtomicBool,
}

impl CommandAdapter {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: String::new(),
            description: String::new(),
            program: program.into(),
            timeout: Duration::from_secs(120),
            tools: Vec::new(),
            connected: AtomicBool::new(false),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        args: Vec<&str>,
    ) -> Self {
        self.tools.push(CommandTool {
            name: name.into(),
            description: description.into(),
            args: args.into_iter().map(str::to_string).collect(),
            accepts_args: false,
        });
        self
    }

    /// Like `with_tool`, but the tool accepts caller-supplied trailing
    /// string arguments via `{"args": [...]}`.
    pub fn with_open_tool(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        args: Vec<&str>,
    ) -> Self {
        self.tools.push(CommandTool {
            name: name.into(),
            description: description.into(),
            args: args.into_iter().map(str::to_string).collect(),
            accepts_args: true,
        });
        self
    }

    fn find_tool(&self, name: &str) -> Option<&CommandTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    fn extra_args(tool: &CommandTool, arguments: Option<&Value>) -> anyhow::Result<Vec<String>> {
        let Some(raw) = arguments.and_then(|a| a.get("args")) else {
            return Ok(Vec::new());
        };
        if !tool.accepts_args {
            anyhow::bail!("tool '{}' does not accept extra arguments", tool.name);
        }
        let items = raw
            .as_array()
            .with_context(|| format!("tool '{}': 'args' must be an array", tool.name))?;
        items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .with_context(|| format!("tool '{}': 'args' entries must be strings", tool.name))
            })
            .collect()
    }
}

#[async_trait]
impl SsgAdapter for CommandAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn connect(&self) -> anyhow::Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        debug!(adapter = %self.name, program = %self.program, "adapter connected");
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        debug!(adapter = %self.name, "adapter disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn tools(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|t| Tool {
                name: t.name.clone(),
                title: None,
                description: Some(t.description.clone()),
                input_schema: if t.accepts_args {
                    serde_json::json!({
                        "type": "object",
                        "properties": {
                            "args": {
                                "type": "array",
                                "items": {"type": "string"},
                                "description": "Extra command-line arguments"
                            }
                        }
                    })
                } else {
                    serde_json::json!({"type": "object", "properties": {}})
                },
            })
            .collect()
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<Value>,
    ) -> anyhow::Result<CallToolResult> {
        if !self.is_connected() {
            anyhow::bail!("adapter '{}' is not connected", self.name);
        }
        let Some(template) = self.find_tool(tool) else {
            anyhow::bail!("adapter '{}' has no tool '{tool}'", self.name);
        };
        let extra = Self::extra_args(template, arguments.as_ref())?;

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&template.args)
            .args(&extra)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(adapter = %self.name, tool = %tool, program = %self.program, "spawning tool command");
        let child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", self.program))?;

        let out = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| format!("tool '{}:{tool}' timed out", self.name))?
            .with_context(|| format!("wait for {}", self.program))?;

        let stdout = String::from_utf8_lossy(&out.stdout);
        if out.status.success() {
            Ok(CallToolResult::text(stdout.trim_end()))
        } else {
            let stderr = String::from_utf8_lossy(&out.stderr);
            Ok(CallToolResult::error(format!(
                "{} exited with {}\n{}",
                self.program,
                out.status,
                stderr.trim_end()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_adapter() -> CommandAdapter {
        CommandAdapter::new("echoer", "echo")
            .with_language("Shell")
            .with_description("echoes things")
            .with_tool("hello", "say hello", vec!["hello"])
            .with_open_tool("say", "echo the given arguments", vec![])
    }

    #[tokio::test]
    async fn calls_fail_until_connected() {
        let adapter = echo_adapter();
        assert!(!adapter.is_connected());
        let err = adapter.call_tool("hello", None).await.unwrap_err();
        assert!(err.to_string().contains("not connected"));

        adapter.connect().await.unwrap();
        assert!(adapter.is_connected());
        adapter.disconnect().await.unwrap();
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn fixed_template_runs_and_captures_stdout() {
        let adapter = echo_adapter();
        adapter.connect().await.unwrap();
        let result = adapter.call_tool("hello", None).await.unwrap();
        assert_eq!(result.is_error, Some(false));
        let ssg_mcp::ContentBlock::Text { text } = &result.content[0];
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn open_tool_appends_caller_arguments() {
        let adapter = echo_adapter();
        adapter.connect().await.unwrap();
        let result = adapter
            .call_tool("say", Some(serde_json::json!({"args": ["a", "b"]})))
            .await
            .unwrap();
        let ssg_mcp::ContentBlock::Text { text } = &result.content[0];
        assert_eq!(text, "a b");
    }

    #[tokio::test]
    async fn closed_tool_rejects_caller_arguments() {
        let adapter = echo_adapter();
        adapter.connect().await.unwrap();
        let err = adapter
            .call_tool("hello", Some(serde_json::json!({"args": ["x"]})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not accept extra arguments"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let adapter = echo_adapter();
        adapter.connect().await.unwrap();
        let err = adapter.call_tool("nope", None).await.unwrap_err();
        assert!(err.to_string().contains("has no tool"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_tool_level_failure() {
        let adapter = CommandAdapter::new("sh", "sh")
            .with_tool("fail", "exit nonzero", vec!["-c", "echo oops >&2; exit 3"]);
        adapter.connect().await.unwrap();
        let result = adapter.call_tool("fail", None).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        let ssg_mcp::ContentBlock::Text { text } = &result.content[0];
        assert!(text.contains("oops"));
    }

    #[test]
    fn tool_descriptors_carry_schemas() {
        let tools = echo_adapter().tools();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "hello");
        assert!(tools[1].input_schema["properties"]["args"].is_object());
    }
}
