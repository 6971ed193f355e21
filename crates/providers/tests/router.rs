use async_trait::async_trait;
use clawhands_providers::*;
use std::collections::HashSet;
use std::sync::Arc;

/// Adapter that echoes its own id, or fails with a fixed error.
struct StubAdapter {
    id: String,
    failure: Option<ProviderError>,
}

#[async_trait]
impl ProviderAdapter for StubAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(ChatResponse {
            content: Some(self.id.clone()),
            tool_calls: Vec::new(),
            finish_reason: "stop".into(),
        })
    }
}

fn stub(id: &str) -> Arc<dyn ProviderAdapter> {
    Arc::new(StubAdapter {
        id: id.into(),
        failure: None,
    })
}

fn config(id: &str, models: &[&str]) -> ProviderAdapterConfig {
    ProviderAdapterConfig::new(id, format!("http://{}.invalid", id))
        .with_models(models.iter().copied())
}

fn round_robin() -> ProviderRouter {
    ProviderRouter::new(Arc::new(RoundRobinBalancer::new()))
}

fn ids(router: &ProviderRouter, model: &str, n: usize) -> Vec<String> {
    (0..n)
        .map(|_| router.resolve(model).unwrap().provider_id)
        .collect()
}

#[test]
fn test_round_robin_visits_in_insertion_order() {
    let router = round_robin();
    router.upsert(config("a", &["gpt-4"]), stub("a"));
    router.upsert(config("b", &["gpt-4"]), stub("b"));

    assert_eq!(ids(&router, "gpt-4", 3), vec!["a", "b", "a"]);
}

#[test]
fn test_n_calls_visit_each_adapter_once() {
    let router = round_robin();
    for id in ["a", "b", "c", "d"] {
        router.upsert(config(id, &["llama3"]), stub(id));
    }
    let visited: HashSet<String> = ids(&router, "llama3", 4).into_iter().collect();
    assert_eq!(visited.len(), 4);
}

#[test]
fn test_no_provider_carries_model_unchanged() {
    let router = round_robin();
    router.upsert(config("a", &["gpt-4"]), stub("a"));

    match router.resolve("Claude-3 Opus/beta") {
        Err(RouterError::NoProviderAvailable(model)) => assert_eq!(model, "Claude-3 Opus/beta"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_disabled_adapter_excluded_but_retained() {
    let router = round_robin();
    router.upsert(config("a", &["gpt-4"]), stub("a"));
    router.upsert(config("b", &["gpt-4"]), stub("b"));

    router.set_enabled("a", false).unwrap();
    assert_eq!(router.state("a"), AdapterState::Disabled);
    assert_eq!(ids(&router, "gpt-4", 3), vec!["b", "b", "b"]);
    assert_eq!(router.configs().len(), 2);

    router.set_enabled("b", false).unwrap();
    assert!(matches!(
        router.resolve("gpt-4"),
        Err(RouterError::NoProviderAvailable(_))
    ));

    router.set_enabled("a", true).unwrap();
    assert_eq!(router.resolve("gpt-4").unwrap().provider_id, "a");
}

#[test]
fn test_exact_match_beats_pattern() {
    let router = round_robin();
    router.upsert(config("wildcard", &["*"]), stub("wildcard"));
    router.upsert(config("family", &["gpt-4*"]), stub("family"));
    router.upsert(config("exact", &["gpt-4o"]), stub("exact"));

    assert_eq!(ids(&router, "gpt-4o", 3), vec!["exact", "exact", "exact"]);
    assert_eq!(
        ids(&router, "gpt-4-turbo", 2),
        vec!["wildcard", "family"]
    );
    assert_eq!(router.resolve("mistral").unwrap().provider_id, "wildcard");
}

#[test]
fn test_family_prefix_pattern() {
    let router = round_robin();
    router.upsert(config("or", &["openrouter/"]), stub("or"));

    assert_eq!(
        router.resolve("openrouter/meta/llama").unwrap().provider_id,
        "or"
    );
    assert!(router.resolve("openrouter").is_err());
}

#[test]
fn test_state_machine() {
    let router = round_robin();
    assert_eq!(router.state("a"), AdapterState::Unconfigured);

    router.upsert(config("a", &["m"]), stub("a"));
    assert_eq!(router.state("a"), AdapterState::Enabled);

    router.upsert(config("a", &["m"]).enabled(false), stub("a"));
    assert_eq!(router.state("a"), AdapterState::Disabled);

    assert!(matches!(
        router.set_enabled("zzz", true),
        Err(RouterError::UnknownProvider(_))
    ));

    assert!(router.remove("a").is_some());
    assert_eq!(router.state("a"), AdapterState::Unconfigured);
}

#[test]
fn test_upsert_keeps_position() {
    let router = round_robin();
    router.upsert(config("a", &["m"]), stub("a"));
    router.upsert(config("b", &["m"]), stub("b"));
    let previous = router.upsert(config("a", &["m", "n"]), stub("a"));

    assert_eq!(previous.unwrap().supported_models, vec!["m"]);
    let order: Vec<String> = router
        .configs()
        .into_iter()
        .map(|c| c.provider_id)
        .collect();
    assert_eq!(order, vec!["a", "b"]);
}

#[test]
fn test_explicit_selection() {
    let router = round_robin();
    router.upsert(config("a", &["gpt-4"]), stub("a"));
    router.upsert(config("b", &["llama3"]).enabled(false), stub("b"));

    assert_eq!(
        router.resolve_explicit("a", "anything").unwrap().provider_id,
        "a"
    );
    assert!(matches!(
        router.resolve_explicit("b", "llama3"),
        Err(RouterError::NoProviderAvailable(m)) if m == "llama3"
    ));
    assert!(matches!(
        router.resolve_explicit("c", "llama3"),
        Err(RouterError::UnknownProvider(id)) if id == "c"
    ));
}

#[test]
fn test_first_available_policy() {
    let router = ProviderRouter::new(BalancerPolicy::FirstAvailable.build());
    router.upsert(config("a", &["m"]), stub("a"));
    router.upsert(config("b", &["m"]), stub("b"));
    assert_eq!(ids(&router, "m", 3), vec!["a", "a", "a"]);
}

#[tokio::test]
async fn test_complete_routes_and_passes_errors_through() {
    let router = round_robin();
    router.upsert(config("ok", &["good"]), stub("ok"));
    router.upsert(
        config("slow", &["bad"]),
        Arc::new(StubAdapter {
            id: "slow".into(),
            failure: Some(ProviderError::Timeout(30)),
        }),
    );

    let response = router
        .complete(&ChatRequest::new("good", vec![Message::user("hi")]))
        .await
        .unwrap();
    assert_eq!(response.content.as_deref(), Some("ok"));

    match router
        .complete(&ChatRequest::new("bad", vec![Message::user("hi")]))
        .await
    {
        Err(RouterError::Transport {
            provider_id,
            source,
        }) => {
            assert_eq!(provider_id, "slow");
            assert_eq!(source, ProviderError::Timeout(30));
        }
        other => panic!("unexpected: {:?}", other),
    }

    assert!(matches!(
        router
            .complete(&ChatRequest::new("none", vec![Message::user("hi")]))
            .await,
        Err(RouterError::NoProviderAvailable(_))
    ));
}

#[test]
fn test_concurrent_resolves_cover_all_adapters() {
    let router = Arc::new(round_robin());
    for id in ["a", "b", "c"] {
        router.upsert(config(id, &["m"]), stub(id));
    }

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let router = router.clone();
            std::thread::spawn(move || ids(&router, "m", 30))
        })
        .collect();

    let mut counts = std::collections::HashMap::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            *counts.entry(id).or_insert(0) += 1;
        }
    }
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|&n| n == 60));
}

#[test]
fn test_config_from_yaml() {
    let yaml = r#"
provider_id: local
provider_type: ollama
base_url: http://localhost:11434/v1
api_key_env: OLLAMA_KEY
supported_models: ["llama3*", "qwen/"]
tunables:
  max_tokens: 1024
  retry_count: 2
"#;
    let config: ProviderAdapterConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.provider_type, ProviderType::Ollama);
    assert!(config.enabled);
    assert_eq!(config.credentials.api_key_env.as_deref(), Some("OLLAMA_KEY"));
    assert_eq!(config.tunables.timeout_seconds, 60);
    assert_eq!(config.tunables.retry_count, 2);
    assert_eq!(config.match_model("qwen/qwen2"), Some(ModelMatch::Pattern));
}
