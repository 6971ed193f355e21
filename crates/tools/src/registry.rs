use crate::schema::ToolDescriptor;
use crate::traits::{Tool, ToolFactory};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// A tool found by name, plus the operation taken from a dotted name
/// (`file_operations.read_file` resolves to `file_operations` with
/// operation `read_file`).
#[derive(Clone)]
pub struct ResolvedTool {
    pub tool: Arc<dyn Tool>,
    pub operation: Option<String>,
}

/// Process-wide set of active tools.
///
/// Registration swaps a fully built `Arc<dyn Tool>` into the map under a
/// write lock, so lookups either see the whole tool or nothing.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    factory: Mutex<Option<Arc<dyn ToolFactory>>>,
    deferred: OnceCell<usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            factory: Mutex::new(None),
            deferred: OnceCell::new(),
        }
    }

    /// Add a tool. A name collision is logged and the new tool is ignored.
    pub fn register(&self, tool: Arc<dyn Tool>) -> bool {
        let name = tool.name().to_string();
        let mut tools = self.tools.write();
        if tools.contains_key(&name) {
            warn!(tool = name.as_str(), "Tool name already registered, ignoring");
            return false;
        }

        tools.insert(name.clone(), tool);
        debug!(tool = name.as_str(), "Registered tool");
        true
    }

    pub fn deregister(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let removed = self.tools.write().remove(name);
        if removed.is_some() {
            info!(tool = name, "Deregistered tool");
        }
        removed
    }

    /// Exact-name lookup among tools registered so far.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.tools.read().len()
    }

    /// Install the deferred factory. Rejected once the factory has run.
    pub fn set_deferred_factory(&self, factory: Arc<dyn ToolFactory>) -> bool {
        if self.deferred.initialized() {
            warn!("Deferred tool factory already ran, ignoring replacement");
            return false;
        }
        *self.factory.lock() = Some(factory);
        true
    }

    /// Run the deferred factory once and register what it produces.
    /// Returns the number of tools it added; later calls return the cached
    /// count without invoking the factory again.
    pub async fn load_deferred(&self) -> usize {
        if !self.deferred.initialized() && self.factory.lock().is_none() {
            return 0;
        }

        *self
            .deferred
            .get_or_init(|| async {
                let factory = self.factory.lock().take();
                let Some(factory) = factory else {
                    return 0;
                };

                let produced = factory.create_tools().await;
                let added = produced
                    .into_iter()
                    .filter(|tool| self.register(tool.clone()))
                    .count();
                info!(added, "Loaded deferred tools");
                added
            })
            .await
    }

    /// Full tool set, including deferred tools, sorted by name.
    pub async fn all_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.load_deferred().await;
        let mut tools: Vec<Arc<dyn Tool>> = self.tools.read().values().cloned().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub async fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.all_tools()
            .await
            .iter()
            .map(|tool| tool.descriptor())
            .collect()
    }

    /// Tool declarations in OpenAI function format.
    pub async fn schemas(&self) -> Vec<serde_json::Value> {
        self.descriptors()
            .await
            .iter()
            .map(ToolDescriptor::function_schema)
            .collect()
    }

    /// Lookup used on the execution path: loads deferred tools, then tries
    /// the exact name, then a dotted `tool.operation` name.
    pub async fn resolve(&self, name: &str) -> Option<ResolvedTool> {
        self.load_deferred().await;

        if let Some(tool) = self.lookup(name) {
            return Some(ResolvedTool {
                tool,
                operation: None,
            });
        }

        let (base, operation) = name.rsplit_once('.')?;
        let tool = self.lookup(base)?;
        if operation.is_empty() || !tool.parameters().contains_key("operation") {
            return None;
        }

        debug!(tool = base, operation, "Resolved dotted tool name");
        Some(ResolvedTool {
            tool,
            operation: Some(operation.to_string()),
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
