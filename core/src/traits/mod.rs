pub mod provider;
pub mod tool;

pub use provider::{ChatMessage, ChatRequest, Provider, ProviderEvent, ToolCall};
pub use tool::{Tool, ToolResult, ToolSpec};
