// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;

/// Capability the workflow can invoke by name.
///
/// `name()`, `description()` and `schema()` borrow from the implementor so
/// declarations can be sent to a provider on every call without cloning.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a bound tool set)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>>;
}

/// Render a tool result as the text that goes back into the conversation.
pub fn result_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_text_string_is_unquoted() {
        assert_eq!(result_text(&json!("customers, orders")), "customers, orders");
    }

    #[test]
    fn test_result_text_structured_is_json() {
        assert_eq!(result_text(&json!({"rows": 2})), r#"{"rows":2}"#);
    }
}
