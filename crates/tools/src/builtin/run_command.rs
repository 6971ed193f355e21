use crate::args::ToolArgs;
use crate::context::ExecutionContext;
use crate::error::ToolError;
use crate::schema::{ParameterMap, ToolParameter};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use clawhands_guard::{AuthorizationDecision, AuthorizationGuard};
use serde_json::json;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Stderr carried in `additional_data`, which is never spilled to the
/// overflow store.
const STDERR_TAIL_CHARS: usize = 1024;

/// Runs a shell command with the session working directory as cwd.
///
/// The command string itself is not inspected for paths; only the
/// operation as a whole goes through the guard.
pub struct RunCommandTool {
    guard: Arc<AuthorizationGuard>,
}

impl RunCommandTool {
    pub fn new(guard: Arc<AuthorizationGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the session working directory"
    }

    fn parameters(&self) -> ParameterMap {
        let mut parameters = ParameterMap::new();
        parameters.insert(
            "command".into(),
            ToolParameter::string("Command line passed to sh -c").required(),
        );
        parameters
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: ToolArgs,
    ) -> Result<ToolResult, ToolError> {
        let command = args.str("command")?;
        if command.trim().is_empty() {
            return Err(ToolError::Validation("Empty command".into()));
        }

        let operation_key = self.name().to_string();
        let decision = self
            .guard
            .check_command(command, &ctx.authorization(&operation_key));
        match decision {
            AuthorizationDecision::Allowed(_) => {}
            AuthorizationDecision::Denied(reason) => {
                return Err(ToolError::PermissionDenied(reason))
            }
            AuthorizationDecision::RequiresEscalation(reason) => {
                return Err(ToolError::ApprovalRequired {
                    operation_key,
                    reason,
                })
            }
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if ctx.working_directory.is_some() {
            cmd.current_dir(ctx.resolve_path("."));
        }

        debug!(session = ctx.session_id.as_str(), command, "Spawning command");
        let output = cmd
            .output()
            .await
            .map_err(|e| ToolError::Execution(format!("Failed to spawn command: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();

        let result = if output.status.success() {
            ToolResult::success(self.name(), stdout)
        } else {
            let content = if stderr.is_empty() { stdout } else { stderr.clone() };
            ToolResult::failure(self.name(), content)
        };

        Ok(result
            .with_data("exit_code", json!(exit_code))
            .with_data("stderr_length", json!(stderr.chars().count()))
            .with_data("stderr_tail", json!(tail(&stderr, STDERR_TAIL_CHARS))))
    }
}

/// Last `max` chars of `text`.
fn tail(text: &str, max: usize) -> &str {
    let skip = text.chars().count().saturating_sub(max);
    match text.char_indices().nth(skip) {
        Some((start, _)) => &text[start..],
        None => "",
    }
}
