use crate::balancer::LoadBalancer;
use crate::config::{ModelMatch, ProviderAdapterConfig};
use crate::traits::{ChatRequest, ChatResponse, ProviderAdapter, ProviderError};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RouterError {
    /// Nothing enabled can serve the model. Callers branch on this to offer
    /// provider setup instead of a retry.
    #[error("No provider available for model '{0}'")]
    NoProviderAvailable(String),

    #[error("Provider '{provider_id}' failed: {source}")]
    Transport {
        provider_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unconfigured,
    Enabled,
    Disabled,
}

#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider_id: String,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider_id", &self.provider_id)
            .finish()
    }
}

struct Entry {
    config: ProviderAdapterConfig,
    adapter: Arc<dyn ProviderAdapter>,
}

/// Maps a model id to one configured adapter.
///
/// Entries keep insertion order; updating an existing id keeps its slot, so
/// round-robin order is stable across configuration edits.
pub struct ProviderRouter {
    entries: RwLock<Vec<Entry>>,
    balancer: Arc<dyn LoadBalancer>,
}

impl ProviderRouter {
    pub fn new(balancer: Arc<dyn LoadBalancer>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            balancer,
        }
    }

    pub fn balancer(&self) -> &Arc<dyn LoadBalancer> {
        &self.balancer
    }

    /// Add or replace an adapter. Returns the previous configuration.
    pub fn upsert(
        &self,
        config: ProviderAdapterConfig,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Option<ProviderAdapterConfig> {
        let mut entries = self.entries.write();
        let id = config.provider_id.clone();
        let entry = Entry { config, adapter };

        match entries.iter_mut().find(|e| e.config.provider_id == id) {
            Some(slot) => {
                let previous = std::mem::replace(slot, entry);
                info!(provider = id.as_str(), "Updated provider");
                Some(previous.config)
            }
            None => {
                entries.push(entry);
                info!(provider = id.as_str(), "Added provider");
                None
            }
        }
    }

    pub fn set_enabled(&self, provider_id: &str, enabled: bool) -> Result<(), RouterError> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.config.provider_id == provider_id)
            .ok_or_else(|| RouterError::UnknownProvider(provider_id.to_string()))?;

        if entry.config.enabled != enabled {
            entry.config.enabled = enabled;
            info!(provider = provider_id, enabled, "Provider state changed");
        }
        Ok(())
    }

    pub fn remove(&self, provider_id: &str) -> Option<ProviderAdapterConfig> {
        let mut entries = self.entries.write();
        let index = entries
            .iter()
            .position(|e| e.config.provider_id == provider_id)?;
        info!(provider = provider_id, "Removed provider");
        Some(entries.remove(index).config)
    }

    pub fn configs(&self) -> Vec<ProviderAdapterConfig> {
        self.entries
            .read()
            .iter()
            .map(|e| e.config.clone())
            .collect()
    }

    pub fn state(&self, provider_id: &str) -> AdapterState {
        match self
            .entries
            .read()
            .iter()
            .find(|e| e.config.provider_id == provider_id)
        {
            None => AdapterState::Unconfigured,
            Some(e) if e.config.enabled => AdapterState::Enabled,
            Some(_) => AdapterState::Disabled,
        }
    }

    /// Select an adapter for `model`: enabled adapters listing it exactly,
    /// else enabled adapters matching it by pattern, balanced when several
    /// qualify.
    pub fn resolve(&self, model: &str) -> Result<ResolvedProvider, RouterError> {
        let (candidates, kind) = {
            let entries = self.entries.read();
            let mut exact = Vec::new();
            let mut pattern = Vec::new();
            for entry in entries.iter().filter(|e| e.config.enabled) {
                let matched = entry.config.match_model(model);
                if matched.is_none() || !entry.adapter.supports_model(model) {
                    continue;
                }
                let resolved = ResolvedProvider {
                    provider_id: entry.config.provider_id.clone(),
                    adapter: entry.adapter.clone(),
                };
                match matched {
                    Some(ModelMatch::Exact) => exact.push(resolved),
                    _ => pattern.push(resolved),
                }
            }

            if exact.is_empty() {
                (pattern, ModelMatch::Pattern)
            } else {
                (exact, ModelMatch::Exact)
            }
        };

        if candidates.is_empty() {
            warn!(model, "No provider available");
            return Err(RouterError::NoProviderAvailable(model.to_string()));
        }

        let index = self.balancer.select(model, candidates.len());
        let chosen = candidates
            .into_iter()
            .nth(index)
            .ok_or_else(|| RouterError::NoProviderAvailable(model.to_string()))?;

        debug!(
            model,
            provider = chosen.provider_id.as_str(),
            matched = ?kind,
            balancer = self.balancer.name(),
            "Resolved provider"
        );
        Ok(chosen)
    }

    /// Select a specific adapter by id, bypassing model matching. A disabled
    /// adapter is never selected.
    pub fn resolve_explicit(
        &self,
        provider_id: &str,
        model: &str,
    ) -> Result<ResolvedProvider, RouterError> {
        let entries = self.entries.read();
        let entry = entries
            .iter()
            .find(|e| e.config.provider_id == provider_id)
            .ok_or_else(|| RouterError::UnknownProvider(provider_id.to_string()))?;

        if !entry.config.enabled {
            warn!(provider = provider_id, model, "Explicitly requested provider is disabled");
            return Err(RouterError::NoProviderAvailable(model.to_string()));
        }

        Ok(ResolvedProvider {
            provider_id: entry.config.provider_id.clone(),
            adapter: entry.adapter.clone(),
        })
    }

    /// Resolve by `request.model` and run the completion. Adapter failures
    /// come back unchanged, tagged with the adapter that produced them.
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, RouterError> {
        let resolved = self.resolve(&request.model)?;
        Self::complete_with(resolved, request).await
    }

    pub async fn complete_explicit(
        &self,
        provider_id: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, RouterError> {
        let resolved = self.resolve_explicit(provider_id, &request.model)?;
        Self::complete_with(resolved, request).await
    }

    async fn complete_with(
        resolved: ResolvedProvider,
        request: &ChatRequest,
    ) -> Result<ChatResponse, RouterError> {
        resolved
            .adapter
            .complete(request)
            .await
            .map_err(|source| {
                warn!(
                    provider = resolved.provider_id.as_str(),
                    error = %source,
                    "Provider call failed"
                );
                RouterError::Transport {
                    provider_id: resolved.provider_id.clone(),
                    source,
                }
            })
    }
}
