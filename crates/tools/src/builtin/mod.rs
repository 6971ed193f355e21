//! Tools every runtime ships with.

mod file_operations;
mod read_tool_result;
mod run_command;

pub use file_operations::FileOperationsTool;
pub use read_tool_result::ReadToolResultTool;
pub use run_command::RunCommandTool;

use crate::overflow::ResultOverflowStore;
use crate::registry::ToolRegistry;
use crate::traits::Tool;
use clawhands_guard::AuthorizationGuard;
use std::sync::Arc;

pub fn builtin_tools(
    guard: Arc<AuthorizationGuard>,
    overflow: Arc<ResultOverflowStore>,
) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(FileOperationsTool::new(guard.clone())),
        Arc::new(RunCommandTool::new(guard)),
        Arc::new(ReadToolResultTool::new(overflow)),
    ]
}

/// Register the built-in tools. Returns how many were added.
pub fn register_builtin_tools(
    registry: &ToolRegistry,
    guard: Arc<AuthorizationGuard>,
    overflow: Arc<ResultOverflowStore>,
) -> usize {
    builtin_tools(guard, overflow)
        .into_iter()
        .filter(|tool| registry.register(tool.clone()))
        .count()
}
