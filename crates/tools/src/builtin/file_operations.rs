use crate::args::ToolArgs;
use crate::context::ExecutionContext;
use crate::error::ToolError;
use crate::schema::{ParameterMap, ToolParameter};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use clawhands_guard::{AuthorizationDecision, AuthorizationGuard};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

const OPERATIONS: &[&str] = &["read_file", "list_dir", "create_file", "create_directory"];

/// Read, list and create files, every path checked against the session
/// sandbox first.
pub struct FileOperationsTool {
    guard: Arc<AuthorizationGuard>,
}

impl FileOperationsTool {
    pub fn new(guard: Arc<AuthorizationGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for FileOperationsTool {
    fn name(&self) -> &str {
        "file_operations"
    }

    fn description(&self) -> &str {
        "Read files, list directories, create files and directories"
    }

    fn parameters(&self) -> ParameterMap {
        let mut parameters = ParameterMap::new();
        parameters.insert(
            "operation".into(),
            ToolParameter::string("Operation to perform")
                .required()
                .one_of(OPERATIONS),
        );
        parameters.insert(
            "path".into(),
            ToolParameter::string("Target path, absolute or relative to the working directory")
                .required(),
        );
        parameters.insert(
            "content".into(),
            ToolParameter::string("File content for create_file"),
        );
        parameters.insert(
            "offset".into(),
            ToolParameter::integer("First line to read (1-based) for read_file"),
        );
        parameters.insert(
            "limit".into(),
            ToolParameter::integer("Maximum number of lines to read for read_file"),
        );
        parameters
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: ToolArgs,
    ) -> Result<ToolResult, ToolError> {
        let operation = args.str("operation")?;
        let raw_path = args.str("path")?;
        let operation_key = format!("{}.{}", self.name(), operation);

        let decision = self
            .guard
            .check_path(raw_path, &ctx.authorization(&operation_key));
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

        let path = ctx.resolve_path(raw_path);
        match operation {
            "read_file" => self.read_file(&path, &args).await,
            "list_dir" => self.list_dir(&path).await,
            "create_file" => {
                self.create_file(&path, args.opt_str("content").unwrap_or_default())
                    .await
            }
            "create_directory" => self.create_directory(&path).await,
            other => Err(ToolError::Validation(format!(
                "Unknown operation: {}",
                other
            ))),
        }
    }
}

impl FileOperationsTool {
    async fn read_file(&self, path: &Path, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::Execution(format!("{}: {}", path.display(), e)))?;

        let offset = args.opt_usize("offset")?;
        let limit = args.opt_usize("limit")?;
        let total_lines = content.lines().count();

        let text = if offset.is_none() && limit.is_none() {
            content
        } else {
            let skip = offset.unwrap_or(1).saturating_sub(1);
            let take = limit.unwrap_or(usize::MAX);
            content
                .lines()
                .skip(skip)
                .take(take)
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(ToolResult::success(self.name(), text)
            .with_data("path", json!(path.display().to_string()))
            .with_data("total_lines", json!(total_lines)))
    }

    async fn list_dir(&self, path: &Path) -> Result<ToolResult, ToolError> {
        let mut reader = fs::read_dir(path)
            .await
            .map_err(|e| ToolError::Execution(format!("{}: {}", path.display(), e)))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        Ok(ToolResult::success(self.name(), entries.join("\n"))
            .with_data("path", json!(path.display().to_string()))
            .with_data("count", json!(entries.len())))
    }

    async fn create_file(&self, path: &Path, content: &str) -> Result<ToolResult, ToolError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;

        Ok(ToolResult::success(
            self.name(),
            format!("Created {} ({} bytes)", path.display(), content.len()),
        )
        .with_data("path", json!(path.display().to_string())))
    }

    async fn create_directory(&self, path: &Path) -> Result<ToolResult, ToolError> {
        fs::create_dir_all(path).await?;

        Ok(
            ToolResult::success(self.name(), format!("Created directory {}", path.display()))
                .with_data("path", json!(path.display().to_string())),
        )
    }
}
