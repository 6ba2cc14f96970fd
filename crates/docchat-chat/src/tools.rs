//! Tools the model may call during an agent run.

use async_trait::async_trait;
use serde_json::{json, Value};

/// Function-tool declaration sent to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
    pub strict: bool,
}

impl ToolDefinition {
    /// OpenAI `tools[]` entry.
    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
                "strict": self.strict,
            }
        })
    }
}

/// A callable tool. Failures are reported inside the returned value so the
/// model can read them; `call` itself never fails.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, args: Value) -> Value;
}
