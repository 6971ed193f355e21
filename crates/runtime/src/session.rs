use crate::error::SessionError;
use chrono::{DateTime, Utc};
use clawhands_guard::{expand_tilde, GrantStore};
use clawhands_tools::{ExecutionContext, ResultOverflowStore, ToolDispatcher};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// One conversation. The working directory is fixed at creation.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: String,
    working_directory: Option<PathBuf>,
    created_at: DateTime<Utc>,
    tool_timeout_ms: u64,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Context for one tool call made by this session.
    pub fn context(
        &self,
        tool_call_id: impl Into<String>,
        user_initiated: bool,
    ) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(self.id.clone())
            .with_tool_call_id(tool_call_id)
            .with_timeout_ms(self.tool_timeout_ms)
            .user_initiated(user_initiated);
        if let Some(dir) = &self.working_directory {
            ctx = ctx.with_working_directory(dir.clone());
        }
        ctx
    }
}

/// What a teardown cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub cancelled_executions: usize,
    pub revoked_grants: usize,
    pub evicted_results: usize,
}

pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    workspace_root: Option<PathBuf>,
    tool_timeout_ms: u64,
    grants: Arc<GrantStore>,
    overflow: Arc<ResultOverflowStore>,
    dispatcher: Arc<ToolDispatcher>,
}

impl SessionManager {
    pub fn new(
        workspace_root: Option<PathBuf>,
        tool_timeout_ms: u64,
        grants: Arc<GrantStore>,
        dispatcher: Arc<ToolDispatcher>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            workspace_root,
            tool_timeout_ms,
            grants,
            overflow: dispatcher.overflow().clone(),
            dispatcher,
        }
    }

    /// Start a session. An explicit directory is created if missing; without
    /// one, a fresh `<workspace_root>/<session-id>` is used when a workspace
    /// root is configured. With neither, the session has no sandbox and
    /// every guarded operation needs approval.
    pub fn create(&self, working_dir: Option<PathBuf>) -> Result<Arc<Session>, SessionError> {
        let id = uuid::Uuid::new_v4().to_string();
        let dir = match working_dir {
            Some(dir) => Some(dir),
            None => self.workspace_root.as_ref().map(|root| root.join(&id)),
        };
        let working_directory = dir.map(|dir| prepare_directory(&dir)).transpose()?;

        let session = Arc::new(Session {
            id: id.clone(),
            working_directory,
            created_at: Utc::now(),
            tool_timeout_ms: self.tool_timeout_ms,
        });
        self.sessions.write().insert(id.clone(), session.clone());

        match session.working_directory() {
            Some(dir) => info!(
                session = id.as_str(),
                working_directory = %dir.display(),
                "Session created"
            ),
            None => warn!(session = id.as_str(), "Session created without working directory"),
        }
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Live sessions, oldest first.
    pub fn list(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// End a session: abort its in-flight tool calls, then drop its grants
    /// and stored results. The working directory is left on disk.
    pub fn teardown(&self, session_id: &str) -> Result<TeardownReport, SessionError> {
        if self.sessions.write().remove(session_id).is_none() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }

        let report = TeardownReport {
            cancelled_executions: self.dispatcher.cancel_session(session_id),
            revoked_grants: self.grants.clear_session(session_id),
            evicted_results: self.overflow.evict_session(session_id),
        };
        info!(
            session = session_id,
            cancelled = report.cancelled_executions,
            grants = report.revoked_grants,
            results = report.evicted_results,
            "Session torn down"
        );
        Ok(report)
    }
}

fn prepare_directory(dir: &Path) -> Result<PathBuf, SessionError> {
    let dir = expand_tilde(&dir.to_string_lossy());
    let wrap = |source| SessionError::WorkingDirectory {
        path: dir.clone(),
        source,
    };
    std::fs::create_dir_all(&dir).map_err(wrap)?;
    dir.canonicalize().map_err(wrap)
}
