use crate::context::ExecutionContext;
use crate::overflow::ResultOverflowStore;
use crate::registry::ToolRegistry;
use crate::traits::ToolResult;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

type InFlight = Mutex<HashMap<String, HashMap<u64, AbortHandle>>>;

/// Runs tool calls: lookup, isolated execution, overflow post-processing.
///
/// Each execution runs on its own task, tracked under its session so that
/// [`ToolDispatcher::cancel_session`] can abort everything a torn-down
/// session still has in flight.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    overflow: Arc<ResultOverflowStore>,
    in_flight: Arc<InFlight>,
    next_execution: AtomicU64,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, overflow: Arc<ResultOverflowStore>) -> Self {
        Self {
            registry,
            overflow,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_execution: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn overflow(&self) -> &Arc<ResultOverflowStore> {
        &self.overflow
    }

    pub async fn dispatch(
        &self,
        tool_name: &str,
        input: Value,
        ctx: ExecutionContext,
    ) -> ToolResult {
        info!(
            tool = tool_name,
            session = ctx.session_id.as_str(),
            call = ctx.tool_call_id.as_str(),
            "Dispatching tool"
        );

        let Some(resolved) = self.registry.resolve(tool_name).await else {
            warn!(tool = tool_name, "Tool not found");
            return ToolResult::failure(tool_name, format!("Tool not found: {}", tool_name));
        };

        let input = match resolved.operation {
            Some(operation) => with_operation(input, operation),
            None => input,
        };

        let tool = resolved.tool;
        let name = tool.name().to_string();
        let session_id = ctx.session_id.clone();
        let tool_call_id = ctx.tool_call_id.clone();
        let timeout_ms = ctx.timeout_ms;

        let handle = tokio::spawn(async move { tool.invoke(&ctx, &input).await });
        let tracked = self.track(&session_id, handle.abort_handle());

        let mut result = match timeout(Duration::from_millis(timeout_ms), handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_cancelled() => {
                warn!(tool = name.as_str(), "Tool execution cancelled");
                ToolResult::failure(&name, "Tool execution cancelled")
            }
            Ok(Err(_)) => {
                error!(tool = name.as_str(), "Tool execution panicked");
                ToolResult::failure(&name, "Tool execution panicked")
            }
            Err(_) => {
                warn!(tool = name.as_str(), timeout_ms, "Tool execution timed out");
                ToolResult::failure(
                    &name,
                    format!("Tool execution timed out after {}ms", timeout_ms),
                )
            }
        };

        // Spill under the in-flight lock: once cancel_session has removed
        // this execution, nothing more is stored for the session.
        let in_flight = self.in_flight.lock();
        let live = in_flight
            .get(&session_id)
            .is_some_and(|handles| handles.contains_key(&tracked.id));
        if !live {
            drop(in_flight);
            warn!(tool = name.as_str(), "Session cancelled before result was recorded");
            return ToolResult::failure(&name, "Tool execution cancelled");
        }
        let spilled = self
            .overflow
            .spill(&tool_call_id, &result.output.content, &session_id);
        drop(in_flight);

        if let Some(preview) = spilled {
            result.output.content = preview;
            result = result
                .with_data("truncated", Value::Bool(true))
                .with_data("tool_call_id", Value::String(tool_call_id));
        }

        result
    }

    /// Abort every in-flight execution of a session. Returns how many were
    /// still tracked.
    pub fn cancel_session(&self, session_id: &str) -> usize {
        let handles = self.in_flight.lock().remove(session_id).unwrap_or_default();
        let count = handles.len();
        for handle in handles.into_values() {
            handle.abort();
        }
        if count > 0 {
            info!(session = session_id, count, "Cancelled in-flight tool executions");
        }
        count
    }

    pub fn in_flight(&self, session_id: &str) -> usize {
        self.in_flight
            .lock()
            .get(session_id)
            .map(|handles| handles.len())
            .unwrap_or(0)
    }

    fn track(&self, session_id: &str, handle: AbortHandle) -> Tracked {
        let id = self.next_execution.fetch_add(1, Ordering::Relaxed);
        self.in_flight
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .insert(id, handle.clone());

        Tracked {
            in_flight: self.in_flight.clone(),
            session_id: session_id.to_string(),
            id,
            handle,
        }
    }
}

/// Untracks an execution when dispatch finishes, and aborts the task if the
/// dispatch future was dropped or timed out first.
struct Tracked {
    in_flight: Arc<InFlight>,
    session_id: String,
    id: u64,
    handle: AbortHandle,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.handle.abort();
        let mut in_flight = self.in_flight.lock();
        if let Some(handles) = in_flight.get_mut(&self.session_id) {
            handles.remove(&self.id);
            if handles.is_empty() {
                in_flight.remove(&self.session_id);
            }
        }
    }
}

fn with_operation(input: Value, operation: String) -> Value {
    match input {
        Value::Object(mut map) => {
            map.entry("operation")
                .or_insert_with(|| Value::String(operation));
            Value::Object(map)
        }
        Value::Null => serde_json::json!({ "operation": operation }),
        other => other,
    }
}
