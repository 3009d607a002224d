use crate::error::{FieldViolation, ToolError};
use crate::traits::{Tool, ToolResult, ToolSpec};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        if self.get(tool.name()).is_some() {
            return Err(ToolError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn specs_for(&self, names: &[String]) -> Result<Vec<ToolSpec>, ToolError> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .map(|t| t.spec())
                    .ok_or_else(|| ToolError::UnknownTool(name.clone()))
            })
            .collect()
    }

    /// Validates `args` against the tool's schema and runs it. Whatever the
    /// implementation does (error or panic) comes back as a `ToolError`.
    pub async fn invoke(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tool.parameters()
            .validate(&args)
            .map_err(|violations| ToolError::InvalidArguments {
                tool: name.to_string(),
                violations,
            })?;

        debug!(tool = name, %args, "Invoking tool");

        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "Tool execution failed");
                Err(ToolError::ExecutionFailed {
                    tool: name.to_string(),
                    message: e.to_string(),
                })
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tool panicked".to_string());
                warn!(tool = name, %message, "Tool panicked");
                Err(ToolError::ExecutionFailed {
                    tool: name.to_string(),
                    message,
                })
            }
        }
    }

    pub async fn invoke_raw(&self, name: &str, raw_args: &str) -> Result<ToolResult, ToolError> {
        if self.get(name).is_none() {
            return Err(ToolError::UnknownTool(name.to_string()));
        }

        let raw = raw_args.trim();
        let args = if raw.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
                tool: name.to_string(),
                violations: vec![FieldViolation::new(
                    "arguments",
                    format!("not valid JSON: {e}"),
                )],
            })?
        };

        self.invoke(name, args).await
    }
}
