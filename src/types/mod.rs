//! Core types shared by the agent loop.

mod message;
mod tool;

pub use message::{Message, Role};
pub use tool::{
    Arguments, ParamSpec, ParamType, ToolCallRequest, ToolDefinition, ToolError, ToolOutput,
    ToolResult, ToolSchema, params_from_schema, prepare_arguments,
};
