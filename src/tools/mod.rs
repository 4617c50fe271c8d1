//! Tool catalog and handler traits.

mod catalog;
mod context;
mod traits;

pub use catalog::{PreparedCall, ToolCatalog};
pub(crate) use catalog::panic_message;
pub use context::ToolContext;
pub use traits::{FnTool, SchemaTool, Tool};
