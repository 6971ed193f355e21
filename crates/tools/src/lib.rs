pub mod args;
pub mod builtin;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod overflow;
pub mod registry;
pub mod schema;
pub mod traits;

pub use args::{ParamValue, ToolArgs};
pub use context::ExecutionContext;
pub use dispatcher::ToolDispatcher;
pub use error::{OverflowError, ToolError};
pub use overflow::{OverflowConfig, ResultOverflowStore, StoredResult};
pub use registry::{ResolvedTool, ToolRegistry};
pub use schema::{ParameterMap, ParameterType, ToolDescriptor, ToolParameter};
pub use traits::{Tool, ToolFactory, ToolOutput, ToolResult};
