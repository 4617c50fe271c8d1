//! Tool-related types.

mod call;
mod definition;
mod error;
mod output;
mod params;

pub use call::ToolCallRequest;
pub use definition::{ToolDefinition, ToolSchema};
pub use error::ToolError;
pub use output::{ToolOutput, ToolResult};
pub use params::{Arguments, ParamSpec, ParamType, params_from_schema, prepare_arguments};
