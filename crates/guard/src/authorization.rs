use crate::grants::GrantStore;
use crate::path_resolver::{is_within, resolve_path};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of an authorization check. Produced fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum AuthorizationDecision {
    Allowed(String),
    Denied(String),
    RequiresEscalation(String),
}

impl AuthorizationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Allowed(reason) | Self::Denied(reason) | Self::RequiresEscalation(reason) => {
                reason
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Allowed(_) => "allowed",
            Self::Denied(_) => "denied",
            Self::RequiresEscalation(_) => "requires_escalation",
        }
    }
}

/// Who is asking, from where, for what.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub operation_key: &'a str,
    pub session_id: Option<&'a str>,
    pub working_directory: Option<&'a Path>,
    pub user_initiated: bool,
}

impl<'a> AuthorizationRequest<'a> {
    pub fn new(operation_key: &'a str) -> Self {
        Self {
            operation_key,
            session_id: None,
            working_directory: None,
            user_initiated: false,
        }
    }

    pub fn session(mut self, session_id: &'a str) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn working_directory(mut self, dir: &'a Path) -> Self {
        self.working_directory = Some(dir);
        self
    }

    pub fn user_initiated(mut self, user_initiated: bool) -> Self {
        self.user_initiated = user_initiated;
        self
    }

    fn session_id(&self) -> Option<&'a str> {
        self.session_id.filter(|s| !s.is_empty())
    }
}

/// Decides whether a filesystem or command operation may run unsupervised.
///
/// Inside the working directory the agent has full control. Outside it, an
/// operation runs only if a human already granted the same operation key for
/// the session; otherwise it is escalated.
pub struct AuthorizationGuard {
    grants: Arc<GrantStore>,
}

impl AuthorizationGuard {
    pub fn new(grants: Arc<GrantStore>) -> Self {
        Self { grants }
    }

    pub fn grants(&self) -> &Arc<GrantStore> {
        &self.grants
    }

    pub fn check_path(
        &self,
        path: &str,
        request: &AuthorizationRequest<'_>,
    ) -> AuthorizationDecision {
        let base = request.working_directory.map(|dir| dir.to_string_lossy());
        let resolved = resolve_path(path, base.as_deref());

        if request.user_initiated {
            let decision = AuthorizationDecision::Allowed("user-initiated operation".into());
            log_path_decision(request, path, &resolved, &decision);
            return decision;
        }

        let Some(working_directory) = request.working_directory else {
            let decision =
                AuthorizationDecision::RequiresEscalation("no sandbox configured".into());
            log_path_decision(request, path, &resolved, &decision);
            return decision;
        };

        let boundary = resolve_path(&working_directory.to_string_lossy(), None);
        let decision = if is_within(&resolved, &boundary) {
            AuthorizationDecision::Allowed("inside working directory".into())
        } else {
            self.outside_sandbox(request, &resolved, &boundary)
        };

        log_path_decision(request, path, &resolved, &decision);
        decision
    }

    /// Commands are not inspected for embedded paths; they run with the
    /// working directory as cwd.
    pub fn check_command(
        &self,
        command: &str,
        request: &AuthorizationRequest<'_>,
    ) -> AuthorizationDecision {
        let decision = if request.user_initiated {
            AuthorizationDecision::Allowed("user-initiated operation".into())
        } else if request.working_directory.is_none() {
            AuthorizationDecision::RequiresEscalation("no sandbox configured".into())
        } else if request
            .session_id()
            .is_some_and(|session| self.grants.is_granted(session, request.operation_key))
        {
            AuthorizationDecision::Allowed("previously granted".into())
        } else {
            AuthorizationDecision::Allowed("runs inside working directory".into())
        };

        match &decision {
            AuthorizationDecision::Allowed(reason) => debug!(
                operation = request.operation_key,
                command,
                session = request.session_id.unwrap_or("-"),
                reason = reason.as_str(),
                "Command authorized"
            ),
            other => warn!(
                operation = request.operation_key,
                command,
                session = request.session_id.unwrap_or("-"),
                decision = other.kind(),
                reason = other.reason(),
                "Command not authorized"
            ),
        }

        decision
    }

    fn outside_sandbox(
        &self,
        request: &AuthorizationRequest<'_>,
        resolved: &Path,
        boundary: &Path,
    ) -> AuthorizationDecision {
        let Some(session_id) = request.session_id() else {
            return AuthorizationDecision::Denied("no session context".into());
        };

        if self.grants.is_granted(session_id, request.operation_key) {
            return AuthorizationDecision::Allowed("previously granted".into());
        }

        AuthorizationDecision::RequiresEscalation(format!(
            "{} is outside the working directory {}",
            resolved.display(),
            boundary.display()
        ))
    }
}

fn log_path_decision(
    request: &AuthorizationRequest<'_>,
    raw_path: &str,
    resolved: &Path,
    decision: &AuthorizationDecision,
) {
    let resolved = resolved.display().to_string();

    match decision {
        AuthorizationDecision::Allowed(reason) => debug!(
            operation = request.operation_key,
            raw_path,
            resolved_path = resolved.as_str(),
            session = request.session_id.unwrap_or("-"),
            reason = reason.as_str(),
            "Path authorized"
        ),
        other => warn!(
            operation = request.operation_key,
            raw_path,
            resolved_path = resolved.as_str(),
            session = request.session_id.unwrap_or("-"),
            decision = other.kind(),
            reason = other.reason(),
            "Path not authorized"
        ),
    }
}
