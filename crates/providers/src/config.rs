use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    #[default]
    OpenaiCompatible,
    Openai,
    Ollama,
    LmStudio,
    /// Adapter supplied in code; configuration alone cannot build it.
    Custom,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key. Consulted when `api_key` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Credentials {
    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tunables {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry_count: u32,
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: None,
            timeout_seconds: default_timeout_seconds(),
            retry_count: 0,
        }
    }
}

/// How a configured adapter matched a requested model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMatch {
    Exact,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAdapterConfig {
    pub provider_id: String,
    #[serde(default)]
    pub provider_type: ProviderType,
    #[serde(default = "default_enabled", alias = "is_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub credentials: Credentials,
    pub base_url: String,
    /// Model ids or patterns, in priority order.
    #[serde(default)]
    pub supported_models: Vec<String>,
    #[serde(default)]
    pub tunables: Tunables,
}

fn default_enabled() -> bool {
    true
}

impl ProviderAdapterConfig {
    pub fn new(provider_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider_type: ProviderType::default(),
            enabled: true,
            credentials: Credentials::default(),
            base_url: base_url.into(),
            supported_models: Vec::new(),
            tunables: Tunables::default(),
        }
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for model in models {
            let model = model.into();
            if !self.supported_models.contains(&model) {
                self.supported_models.push(model);
            }
        }
        self
    }

    pub fn with_provider_type(mut self, provider_type: ProviderType) -> Self {
        self.provider_type = provider_type;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.credentials.api_key = Some(key.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Exact listing wins over any pattern that would also match.
    pub fn match_model(&self, model: &str) -> Option<ModelMatch> {
        if self.supported_models.iter().any(|m| m == model) {
            return Some(ModelMatch::Exact);
        }
        self.supported_models
            .iter()
            .any(|pattern| pattern_matches(pattern, model))
            .then_some(ModelMatch::Pattern)
    }
}

/// `*` matches anything, `gpt-4*` matches by prefix, `anthropic/` matches
/// every model in that family. Anything else only matches itself.
pub fn pattern_matches(pattern: &str, model: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return model.starts_with(prefix);
    }
    if pattern.ends_with('/') {
        return model.starts_with(pattern) && model.len() > pattern.len();
    }
    pattern == model
}
