use crate::args::ToolArgs;
use crate::context::ExecutionContext;
use crate::error::ToolError;
use crate::schema::{ParameterMap, ToolDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(default)]
    pub additional_data: Map<String, Value>,
}

/// Outcome of a tool call. A failed call is a normal result, never a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    pub output: ToolOutput,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: ToolOutput {
                content: content.into(),
                additional_data: Map::new(),
            },
        }
    }

    pub fn failure(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: ToolOutput {
                content: content.into(),
                additional_data: Map::new(),
            },
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.output.additional_data.insert(key.into(), value);
        self
    }

    pub fn from_error(tool_name: impl Into<String>, error: &ToolError) -> Self {
        let result = Self::failure(tool_name, error.to_string());
        match error {
            ToolError::ApprovalRequired {
                operation_key,
                reason,
            } => result
                .with_data("approval_required", Value::Bool(true))
                .with_data("operation_key", Value::String(operation_key.clone()))
                .with_data("reason", Value::String(reason.clone())),
            _ => result,
        }
    }

    pub fn content(&self) -> &str {
        &self.output.content
    }
}

/// A named capability with a declared parameter schema.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> ParameterMap;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    /// Run the tool on already-validated arguments.
    async fn execute(&self, ctx: &ExecutionContext, args: ToolArgs)
        -> Result<ToolResult, ToolError>;

    /// Validate raw arguments, then execute. Every failure comes back as a
    /// `success: false` result so one bad call cannot end the agent's turn.
    async fn invoke(&self, ctx: &ExecutionContext, input: &Value) -> ToolResult {
        let args = match ToolArgs::validate(&self.parameters(), input) {
            Ok(args) => args,
            Err(e) => return ToolResult::from_error(self.name(), &e),
        };

        match self.execute(ctx, args).await {
            Ok(result) => result,
            Err(e) => ToolResult::from_error(self.name(), &e),
        }
    }
}

/// Producer of tools whose availability is only known at runtime.
#[async_trait]
pub trait ToolFactory: Send + Sync {
    async fn create_tools(&self) -> Vec<Arc<dyn Tool>>;
}
