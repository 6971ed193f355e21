use async_trait::async_trait;
use clawhands_guard::{AuthorizationGuard, GrantStore};
use clawhands_tools::builtin::register_builtin_tools;
use clawhands_tools::{
    ExecutionContext, OverflowConfig, ParameterMap, ResultOverflowStore, Tool, ToolArgs,
    ToolDispatcher, ToolError, ToolParameter, ToolRegistry, ToolResult,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tempfile::TempDir;

/// Emits `size` characters of deterministic text.
struct BigOutputTool;

#[async_trait]
impl Tool for BigOutputTool {
    fn name(&self) -> &str {
        "big_output"
    }

    fn description(&self) -> &str {
        "Produces a large output"
    }

    fn parameters(&self) -> ParameterMap {
        let mut parameters = ParameterMap::new();
        parameters.insert("size".into(), ToolParameter::integer("chars").required());
        parameters
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: ToolArgs,
    ) -> Result<ToolResult, ToolError> {
        let size = args.int("size")? as usize;
        Ok(ToolResult::success(self.name(), pattern(size)))
    }
}

struct SleepTool;

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Sleeps for a long time"
    }

    fn parameters(&self) -> ParameterMap {
        ParameterMap::new()
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        _args: ToolArgs,
    ) -> Result<ToolResult, ToolError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ToolResult::success(self.name(), "woke up"))
    }
}

struct PanicTool;

#[async_trait]
impl Tool for PanicTool {
    fn name(&self) -> &str {
        "panic"
    }

    fn description(&self) -> &str {
        "Always panics"
    }

    fn parameters(&self) -> ParameterMap {
        ParameterMap::new()
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        _args: ToolArgs,
    ) -> Result<ToolResult, ToolError> {
        panic!("tool bug");
    }
}

/// Tears down its own session from inside the call, then returns a result
/// large enough to be spilled.
struct CancelOwnSessionTool {
    dispatcher: Arc<OnceLock<Arc<ToolDispatcher>>>,
}

#[async_trait]
impl Tool for CancelOwnSessionTool {
    fn name(&self) -> &str {
        "cancel_own_session"
    }

    fn description(&self) -> &str {
        "Cancels its session and returns a large output"
    }

    fn parameters(&self) -> ParameterMap {
        ParameterMap::new()
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        _args: ToolArgs,
    ) -> Result<ToolResult, ToolError> {
        if let Some(dispatcher) = self.dispatcher.get() {
            dispatcher.cancel_session(&ctx.session_id);
        }
        Ok(ToolResult::success(self.name(), pattern(10_000)))
    }
}

fn pattern(size: usize) -> String {
    (0..size)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect()
}

fn dispatcher(config: OverflowConfig) -> ToolDispatcher {
    let registry = Arc::new(ToolRegistry::new());
    let overflow = Arc::new(ResultOverflowStore::new(config));
    let guard = Arc::new(AuthorizationGuard::new(Arc::new(GrantStore::new())));

    register_builtin_tools(&registry, guard, overflow.clone());
    registry.register(Arc::new(BigOutputTool));
    registry.register(Arc::new(SleepTool));
    registry.register(Arc::new(PanicTool));
    ToolDispatcher::new(registry, overflow)
}

#[tokio::test]
async fn test_unknown_tool_fails_gracefully() {
    let dispatcher = dispatcher(OverflowConfig::default());
    let result = dispatcher
        .dispatch("nope", json!({}), ExecutionContext::new("s1"))
        .await;
    assert!(!result.success);
    assert_eq!(result.content(), "Tool not found: nope");
}

#[tokio::test]
async fn test_validation_failure_is_a_result() {
    let dispatcher = dispatcher(OverflowConfig::default());
    let result = dispatcher
        .dispatch("big_output", json!({"size": "ten"}), ExecutionContext::new("s1"))
        .await;
    assert!(!result.success);
    assert!(result.content().contains("must be of type integer"));
}

#[tokio::test]
async fn test_large_output_round_trip_through_read_tool_result() {
    let dispatcher = dispatcher(OverflowConfig::default());
    let ctx = ExecutionContext::new("s1").with_tool_call_id("call-42");

    let result = dispatcher
        .dispatch("big_output", json!({"size": 10_000}), ctx)
        .await;
    assert!(result.success);
    assert_eq!(result.output.additional_data["truncated"], true);
    assert_eq!(result.output.additional_data["tool_call_id"], "call-42");
    assert!(result
        .content()
        .starts_with("[Output truncated: 10000 characters total, showing first 2000."));

    let expected = pattern(10_000);
    let tail = dispatcher
        .overflow()
        .read_stored("call-42", 8192, 1808)
        .unwrap();
    assert_eq!(tail.chars().count(), 1808);
    assert_eq!(tail, &expected[8192..]);

    let paged = dispatcher
        .dispatch(
            "read_tool_result",
            json!({"toolCallId": "call-42", "offset": 8192}),
            ExecutionContext::new("s1"),
        )
        .await;
    assert!(paged.success);
    assert_eq!(paged.content(), &expected[8192..]);
}

#[tokio::test]
async fn test_small_output_untouched() {
    let dispatcher = dispatcher(OverflowConfig::default());
    let result = dispatcher
        .dispatch("big_output", json!({"size": 8192}), ExecutionContext::new("s1"))
        .await;
    assert_eq!(result.content().len(), 8192);
    assert!(!result.output.additional_data.contains_key("truncated"));
    assert!(dispatcher.overflow().is_empty());
}

#[tokio::test]
async fn test_dotted_name_injects_operation() {
    let dir = TempDir::new().unwrap();
    let wd = dir.path().canonicalize().unwrap();
    std::fs::write(wd.join("a.txt"), "alpha").unwrap();

    let dispatcher = dispatcher(OverflowConfig::default());
    let ctx = ExecutionContext::new("s1").with_working_directory(&wd);
    let result = dispatcher
        .dispatch("file_operations.read_file", json!({"path": "a.txt"}), ctx)
        .await;
    assert!(result.success, "{}", result.content());
    assert_eq!(result.content(), "alpha");
}

#[tokio::test]
async fn test_timeout_becomes_failure() {
    let dispatcher = dispatcher(OverflowConfig::default());
    let ctx = ExecutionContext::new("s1").with_timeout_ms(50);
    let result = dispatcher.dispatch("sleep", json!({}), ctx).await;
    assert!(!result.success);
    assert!(result.content().contains("timed out after 50ms"));
    assert_eq!(dispatcher.in_flight("s1"), 0);
}

#[tokio::test]
async fn test_panic_is_isolated() {
    let dispatcher = dispatcher(OverflowConfig::default());
    let result = dispatcher
        .dispatch("panic", json!({}), ExecutionContext::new("s1"))
        .await;
    assert!(!result.success);
    assert!(result.content().contains("panicked"));

    let result = dispatcher
        .dispatch("big_output", json!({"size": 3}), ExecutionContext::new("s1"))
        .await;
    assert!(result.success);
}

#[tokio::test]
async fn test_cancel_session_aborts_in_flight_calls() {
    let dispatcher = Arc::new(dispatcher(OverflowConfig::default()));

    let running = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .dispatch("sleep", json!({}), ExecutionContext::new("s1"))
                .await
        })
    };

    while dispatcher.in_flight("s1") == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(dispatcher.cancel_session("s2"), 0);
    assert_eq!(dispatcher.cancel_session("s1"), 1);

    let result = running.await.unwrap();
    assert!(!result.success);
    assert!(result.content().contains("cancelled"));
    assert_eq!(dispatcher.in_flight("s1"), 0);
}

proptest! {
    #[test]
    fn prop_windows_reassemble_stored_output(
        size in 101usize..3000,
        window in 1usize..700,
    ) {
        let store = ResultOverflowStore::new(OverflowConfig {
            max_inline_size: 100,
            preview_size: 20,
        });
        let original = pattern(size);
        store.process_tool_result("c1", original.clone(), "s1");

        let mut rebuilt = String::new();
        let mut offset = 0;
        while offset < size {
            rebuilt.push_str(&store.read_stored("c1", offset, window).unwrap());
            offset += window;
        }
        prop_assert_eq!(rebuilt, original);
    }
}

#[tokio::test]
async fn test_cancelled_session_result_is_not_stored() {
    let slot = Arc::new(OnceLock::new());
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(CancelOwnSessionTool {
        dispatcher: slot.clone(),
    }));
    let overflow = Arc::new(ResultOverflowStore::default());
    let dispatcher = Arc::new(ToolDispatcher::new(registry, overflow.clone()));
    let _ = slot.set(dispatcher.clone());

    let ctx = ExecutionContext::new("s1").with_tool_call_id("late-1");
    let result = dispatcher
        .dispatch("cancel_own_session", json!({}), ctx)
        .await;

    assert!(!result.success);
    assert!(!overflow.contains("late-1"));
    assert!(overflow.is_empty());
    assert_eq!(dispatcher.in_flight("s1"), 0);
}
