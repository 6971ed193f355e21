use clawhands_guard::{resolve_path, AuthorizationRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Per-invocation context handed to a tool. Tools never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub session_id: String,
    pub user_id: Option<String>,
    pub tool_call_id: String,
    pub user_initiated: bool,
    pub external_api_call: bool,
    pub working_directory: Option<PathBuf>,
    pub timeout_ms: u64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            tool_call_id: uuid::Uuid::new_v4().to_string(),
            user_initiated: false,
            external_api_call: false,
            working_directory: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            metadata: HashMap::new(),
        }
    }

    pub fn with_tool_call_id(mut self, tool_call_id: impl Into<String>) -> Self {
        self.tool_call_id = tool_call_id.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn user_initiated(mut self, user_initiated: bool) -> Self {
        self.user_initiated = user_initiated;
        self
    }

    pub fn external_api_call(mut self, external: bool) -> Self {
        self.external_api_call = external;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Authorization request for `operation_key` on behalf of this call.
    pub fn authorization<'a>(&'a self, operation_key: &'a str) -> AuthorizationRequest<'a> {
        let mut request = AuthorizationRequest::new(operation_key)
            .session(&self.session_id)
            .user_initiated(self.user_initiated);
        if let Some(dir) = &self.working_directory {
            request = request.working_directory(dir);
        }
        request
    }

    /// Resolve a tool-supplied path against this call's working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let base = self
            .working_directory
            .as_ref()
            .map(|dir| dir.to_string_lossy());
        resolve_path(path, base.as_deref())
    }
}
