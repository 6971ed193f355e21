use crate::args::ToolArgs;
use crate::context::ExecutionContext;
use crate::error::ToolError;
use crate::overflow::ResultOverflowStore;
use crate::schema::{ParameterMap, ToolParameter};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Pages through output that was too large to return inline.
///
/// A page never exceeds the store's inline threshold, so reading a stored
/// result never spills again.
pub struct ReadToolResultTool {
    store: Arc<ResultOverflowStore>,
}

impl ReadToolResultTool {
    pub fn new(store: Arc<ResultOverflowStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ReadToolResultTool {
    fn name(&self) -> &str {
        "read_tool_result"
    }

    fn description(&self) -> &str {
        "Read a window of a truncated tool output by its tool call id"
    }

    fn parameters(&self) -> ParameterMap {
        let mut parameters = ParameterMap::new();
        parameters.insert(
            "toolCallId".into(),
            ToolParameter::string("Tool call id named in the truncation notice").required(),
        );
        parameters.insert(
            "offset".into(),
            ToolParameter::integer("Character offset to start from (default 0)"),
        );
        parameters.insert(
            "length".into(),
            ToolParameter::integer("Number of characters to read (default and maximum: the inline size limit)"),
        );
        parameters
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: ToolArgs,
    ) -> Result<ToolResult, ToolError> {
        let id = args.str("toolCallId")?;
        let offset = args.opt_usize("offset")?.unwrap_or(0);
        let page = self.store.config().max_inline_size;
        let length = args.opt_usize("length")?.map_or(page, |len| len.min(page));

        let total = self
            .store
            .stored_len(id)
            .ok_or_else(|| ToolError::NotFound(format!("Stored result not found: {}", id)))?;
        let window = self
            .store
            .read_stored(id, offset, length)
            .map_err(|e| ToolError::NotFound(e.to_string()))?;

        let end = offset.min(total) + window.chars().count();
        Ok(ToolResult::success(self.name(), window)
            .with_data("offset", json!(offset))
            .with_data("length", json!(length))
            .with_data("total_length", json!(total))
            .with_data("remaining", json!(total - end)))
    }
}
