//! DocChat Chat: streaming agent loop with tool calling.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint, runs tool
//! calls between steps and emits the result as data-stream parts that the
//! HTTP layer writes line by line.

pub mod agent;
pub mod prompt;
pub mod providers;
pub mod tools;
pub mod types;

pub use agent::{run_agent, AssistantTranscript};
pub use prompt::SYSTEM_PROMPT;
pub use providers::LlmClient;
pub use tools::{ToolDefinition, ToolHandler};
pub use types::*;
