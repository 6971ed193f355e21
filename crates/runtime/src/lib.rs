//! Runtime wiring: one authorization guard, one tool dispatcher, one
//! provider router and the sessions that share them.

pub mod config;
pub mod error;
pub mod session;

pub use config::RuntimeConfig;
pub use error::{ConfigError, RuntimeError, SessionError};
pub use session::{Session, SessionManager, TeardownReport};

use clawhands_guard::{AuthorizationGuard, GrantStore};
use clawhands_providers::{
    OpenAICompatibleAdapter, ProviderAdapterConfig, ProviderRouter, ProviderType,
};
use clawhands_tools::builtin::register_builtin_tools;
use clawhands_tools::{ResultOverflowStore, ToolDispatcher, ToolRegistry, ToolResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Runtime {
    config: RuntimeConfig,
    guard: Arc<AuthorizationGuard>,
    dispatcher: Arc<ToolDispatcher>,
    router: Arc<ProviderRouter>,
    sessions: SessionManager,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let grants = Arc::new(GrantStore::new());
        let guard = Arc::new(AuthorizationGuard::new(grants.clone()));
        let overflow = Arc::new(ResultOverflowStore::new(config.overflow));
        let registry = Arc::new(ToolRegistry::new());
        let builtin = register_builtin_tools(&registry, guard.clone(), overflow.clone());
        let dispatcher = Arc::new(ToolDispatcher::new(registry, overflow));

        let router = Arc::new(ProviderRouter::new(config.balancer.build()));
        for provider in &config.providers {
            register_provider(&router, provider)?;
        }

        let sessions = SessionManager::new(
            config.workspace_root.clone(),
            config.tool_timeout_ms,
            grants,
            dispatcher.clone(),
        );

        info!(
            tools = builtin,
            providers = router.configs().len(),
            balancer = router.balancer().name(),
            "Runtime ready"
        );
        Ok(Self {
            config,
            guard,
            dispatcher,
            router,
            sessions,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn guard(&self) -> &Arc<AuthorizationGuard> {
        &self.guard
    }

    pub fn grants(&self) -> &Arc<GrantStore> {
        self.guard.grants()
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }

    pub fn router(&self) -> &Arc<ProviderRouter> {
        &self.router
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Run one tool call on behalf of a session.
    pub async fn execute_tool(
        &self,
        session_id: &str,
        tool_call_id: &str,
        tool_name: &str,
        arguments: Value,
        user_initiated: bool,
    ) -> Result<ToolResult, SessionError> {
        let session = self.sessions.get(session_id)?;
        let ctx = session.context(tool_call_id, user_initiated);
        Ok(self.dispatcher.dispatch(tool_name, arguments, ctx).await)
    }

    /// Record a human approval so later calls with the same operation key
    /// skip the prompt for the rest of the session.
    pub fn approve(&self, session_id: &str, operation_key: &str) -> Result<(), SessionError> {
        self.sessions.get(session_id)?;
        self.grants().grant(session_id, operation_key);
        Ok(())
    }
}

fn register_provider(
    router: &ProviderRouter,
    config: &ProviderAdapterConfig,
) -> Result<(), RuntimeError> {
    if config.provider_type == ProviderType::Custom {
        warn!(
            provider = config.provider_id.as_str(),
            "Custom providers must be registered in code, skipping"
        );
        return Ok(());
    }

    let adapter =
        OpenAICompatibleAdapter::new(config.clone()).map_err(|source| RuntimeError::Provider {
            provider_id: config.provider_id.clone(),
            source,
        })?;
    router.upsert(config.clone(), Arc::new(adapter));
    Ok(())
}
