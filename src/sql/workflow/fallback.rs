// SPDX-License-Identifier: MIT

//! Tool node with error fallback
//!
//! Executes the tool invocation requests carried by the last message. If any
//! execution fails, the whole batch is replaced by error results, one per
//! request, so every request still gets exactly one correlated result.

use super::graph::Node;
use super::state::{SqlState, StateUpdate};
use crate::adk::error::SqlAgentError;
use crate::adk::model::{Content, FunctionCall};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

pub struct ToolNode {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolNode {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let tools = tools
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();
        Self { tools }
    }

    async fn execute_all(
        &self,
        calls: &[FunctionCall<'_>],
    ) -> Result<Vec<Content>, Box<dyn Error + Send + Sync>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            log::info!("Tool call: {} {}", call.name, call.args);
            let tool = self
                .tools
                .get(call.name)
                .ok_or_else(|| SqlAgentError::tool_not_found(call.name))?;
            let response = tool.execute(call.args.clone()).await?;
            results.push(Content::tool_result(call.id, call.name, response));
        }
        Ok(results)
    }
}

/// Error result for every pending request
pub fn fallback_results(calls: &[FunctionCall<'_>], error: &str) -> Vec<Content> {
    calls
        .iter()
        .map(|call| {
            Content::tool_result(
                call.id,
                call.name,
                Value::String(format!("Error: {}\n please fix your mistakes.", error)),
            )
        })
        .collect()
}

#[async_trait]
impl Node<SqlState> for ToolNode {
    async fn run(&self, state: &SqlState) -> Result<StateUpdate, Box<dyn Error + Send + Sync>> {
        let calls = state
            .last_message()
            .map(Content::function_calls)
            .unwrap_or_default();

        if calls.is_empty() {
            log::warn!("Tool node reached without pending tool calls");
            return Ok(StateUpdate::new());
        }

        let results = match self.execute_all(&calls).await {
            Ok(results) => results,
            Err(e) => {
                log::error!("Tool execution failed: {}", e);
                fallback_results(&calls, &e.to_string())
            }
        };
        Ok(StateUpdate::new().messages(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::{role, Part};
    use crate::sql::workflow::graph::GraphState;
    use once_cell::sync::Lazy;
    use serde_json::json;

    static SCHEMA: Lazy<Value> = Lazy::new(|| json!({"type": "object", "properties": {}}));

    struct StaticTool {
        name: &'static str,
        result: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "static"
        }
        fn schema(&self) -> &Value {
            &SCHEMA
        }
        async fn execute(&self, _input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
            match self.result {
                Ok(v) => Ok(json!(v)),
                Err(e) => Err(e.into()),
            }
        }
    }

    fn state_with_calls(calls: Vec<(&str, &str)>) -> SqlState {
        let mut state = SqlState::new("q");
        let parts = calls
            .into_iter()
            .map(|(id, name)| Part::FunctionCall {
                id: id.to_string(),
                name: name.to_string(),
                args: json!({}),
            })
            .collect();
        state.apply(StateUpdate::new().message(Content::new(role::MODEL, parts)));
        state
    }

    fn response_text(content: &Content) -> String {
        match &content.parts[0] {
            Part::FunctionResponse { response, .. } => response.as_str().unwrap().to_string(),
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_correlates_ids() {
        let node = ToolNode::new(vec![Arc::new(StaticTool {
            name: "sql_db_list_tables",
            result: Ok("customers, orders"),
        })]);
        let state = state_with_calls(vec![("tool_initial", "sql_db_list_tables")]);

        let update = node.run(&state).await.unwrap();
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].role, role::TOOL);
        assert_eq!(update.messages[0].response_ids(), vec!["tool_initial"]);
        assert_eq!(response_text(&update.messages[0]), "customers, orders");
        assert!(update.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_answers_every_call() {
        let node = ToolNode::new(vec![
            Arc::new(StaticTool {
                name: "ok_tool",
                result: Ok("fine"),
            }),
            Arc::new(StaticTool {
                name: "bad_tool",
                result: Err("connection reset"),
            }),
        ]);
        let state = state_with_calls(vec![("c1", "ok_tool"), ("c2", "bad_tool")]);

        let update = node.run(&state).await.unwrap();
        let ids: Vec<&str> = update
            .messages
            .iter()
            .flat_map(|m| m.response_ids())
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        for message in &update.messages {
            let text = response_text(message);
            assert!(text.starts_with("Error: connection reset"));
            assert!(text.ends_with("please fix your mistakes."));
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_falls_back() {
        let node = ToolNode::new(vec![]);
        let state = state_with_calls(vec![("c1", "sql_db_schema")]);

        let update = node.run(&state).await.unwrap();
        assert_eq!(update.messages.len(), 1);
        assert!(response_text(&update.messages[0]).contains("Tool 'sql_db_schema' not found"));
    }

    #[tokio::test]
    async fn test_no_pending_calls_is_noop() {
        let node = ToolNode::new(vec![]);
        let update = node.run(&SqlState::new("q")).await.unwrap();
        assert!(update.is_empty());
    }
}
