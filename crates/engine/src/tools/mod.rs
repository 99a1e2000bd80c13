pub mod context;
pub mod handlers;
pub mod registry;

pub use context::ToolContext;
pub use registry::{ToolExecution, ToolHandler, ToolRegistry};
