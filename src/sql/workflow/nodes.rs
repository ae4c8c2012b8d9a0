// SPDX-License-Identifier: MIT

//! Step functions of the SQL workflow
//!
//! Every step reads the state and returns a [`StateUpdate`]; none of them
//! mutates shared state. Steps from `query_gen` onward are re-entered on
//! retry and depend on nothing but the state they are given.

use super::extract::extract_sql;
use super::graph::{Node, Route, END};
use super::state::{SqlState, StateUpdate};
use super::QUERY_GEN;
use crate::adk::model::throttle::llm_call;
use crate::adk::model::{BoundModel, Content, Model};
use crate::adk::tool::{result_text, Tool};
use crate::sql::prompts;
use crate::sql::tools::LIST_TABLES;
use async_trait::async_trait;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub const INITIAL_CALL_ID: &str = "tool_initial";
pub const NO_SQL_GENERATED: &str = "No SQL query generated";
pub const VALIDATION_FAILED: &str = "Query validation failed";
pub const NO_SQL_TO_EXECUTE: &str = "No SQL query to execute";

fn log_llm_message(message: &Content, step: &str) {
    log::info!("LLM {} output", step);
    let text = message.text();
    if !text.is_empty() {
        log::info!("Content: {}", text);
    }
    for call in message.function_calls() {
        log::info!("Tool call [{}]: {} {}", call.id, call.name, call.args);
    }
}

/// Request the table list without asking a model
pub fn first_tool_call(_state: &SqlState) -> StateUpdate {
    StateUpdate::new().message(Content::tool_call(INITIAL_CALL_ID, LIST_TABLES, json!({})))
}

/// Asks the schema-bound model which tables to describe
pub struct ModelGetSchema {
    model: BoundModel,
    throttle: Duration,
}

impl ModelGetSchema {
    pub fn new(model: BoundModel, throttle: Duration) -> Self {
        Self { model, throttle }
    }
}

#[async_trait]
impl Node<SqlState> for ModelGetSchema {
    async fn run(&self, state: &SqlState) -> Result<StateUpdate, Box<dyn Error + Send + Sync>> {
        log::info!("Getting schema information with {}", self.model.model_name());
        let result = llm_call(
            "model_get_schema",
            self.throttle,
            self.model.generate_content(&state.messages, None, None),
        )
        .await?;
        log_llm_message(&result, "schema analysis");
        Ok(StateUpdate::new().message(result))
    }
}

/// Generates a candidate query from the conversation so far
pub struct QueryGen {
    model: Arc<dyn Model>,
    throttle: Duration,
}

impl QueryGen {
    pub fn new(model: Arc<dyn Model>, throttle: Duration) -> Self {
        Self { model, throttle }
    }

    /// System prompt, full history, and a retry note when the last attempt failed
    pub fn build_context(state: &SqlState) -> Vec<Content> {
        let mut context = Vec::with_capacity(state.messages.len() + 2);
        context.push(Content::system(prompts::QUERY_GEN));
        context.extend(state.messages.iter().cloned());
        if let Some(error) = &state.error {
            context.push(Content::user(prompts::retry_note(error)));
        }
        context
    }
}

#[async_trait]
impl Node<SqlState> for QueryGen {
    async fn run(&self, state: &SqlState) -> Result<StateUpdate, Box<dyn Error + Send + Sync>> {
        log::info!("Generating SQL query with {}", self.model.model_name());
        let context = Self::build_context(state);
        let result = llm_call(
            "query_gen",
            self.throttle,
            self.model.generate_content(&context, None, None),
        )
        .await?;
        log_llm_message(&result, "query generation");

        let update = match extract_sql(&result.text()) {
            Some(sql) => StateUpdate::new()
                .sql_query(Some(sql.to_string()))
                .clear_error(),
            None => {
                log::warn!("{}", NO_SQL_GENERATED);
                StateUpdate::new().sql_query(None).error(NO_SQL_GENERATED)
            }
        };
        Ok(update.message(result))
    }
}

/// Double-checks the candidate query in a fresh context
pub struct QueryCheck {
    model: Arc<dyn Model>,
    throttle: Duration,
}

impl QueryCheck {
    pub fn new(model: Arc<dyn Model>, throttle: Duration) -> Self {
        Self { model, throttle }
    }
}

#[async_trait]
impl Node<SqlState> for QueryCheck {
    async fn run(&self, state: &SqlState) -> Result<StateUpdate, Box<dyn Error + Send + Sync>> {
        let Some(sql) = state.sql_query.as_deref() else {
            log::warn!("No candidate query to validate");
            return Ok(StateUpdate::new());
        };

        log::info!("Validating SQL query with {}", self.model.model_name());
        let context = [Content::system(prompts::QUERY_CHECK), Content::user(sql)];
        let result = llm_call(
            "query_check",
            self.throttle,
            self.model.generate_content(&context, None, None),
        )
        .await?;
        log_llm_message(&result, "query validation");

        let update = match extract_sql(&result.text()) {
            Some(validated) => StateUpdate::new()
                .sql_query(Some(validated.to_string()))
                .clear_error(),
            None => {
                log::warn!("{}", VALIDATION_FAILED);
                StateUpdate::new().error(VALIDATION_FAILED)
            }
        };
        Ok(update.message(result))
    }
}

/// Runs the current query through the query tool
pub struct ExecuteQuery {
    tool: Arc<dyn Tool>,
}

impl ExecuteQuery {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self { tool }
    }

    fn failed(detail: impl std::fmt::Display) -> StateUpdate {
        log::error!("Query execution failed: {}", detail);
        StateUpdate::new()
            .execution_result(None)
            .error(format!("Query execution failed: {}", detail))
    }
}

#[async_trait]
impl Node<SqlState> for ExecuteQuery {
    async fn run(&self, state: &SqlState) -> Result<StateUpdate, Box<dyn Error + Send + Sync>> {
        let Some(sql) = state.sql_query.as_deref() else {
            // an upstream failure stays the recorded error
            let update = StateUpdate::new().execution_result(None);
            return Ok(match &state.error {
                Some(_) => update,
                None => update.error(NO_SQL_TO_EXECUTE),
            });
        };

        log::info!("Executing query: {}", sql);
        let output = match self.tool.execute(json!({ "query": sql })).await {
            Ok(value) => result_text(&value),
            Err(e) => return Ok(Self::failed(e)),
        };
        if output.starts_with("Error") {
            return Ok(Self::failed(output));
        }

        Ok(StateUpdate::new()
            .message(Content::model_text(format!(
                "Query executed successfully:\n{}",
                output
            )))
            .execution_result(Some(output))
            .clear_error())
    }
}

/// Turns the query and its rows into a natural-language answer
pub struct GenerateAnswer {
    model: Arc<dyn Model>,
    throttle: Duration,
}

impl GenerateAnswer {
    pub fn new(model: Arc<dyn Model>, throttle: Duration) -> Self {
        Self { model, throttle }
    }
}

#[async_trait]
impl Node<SqlState> for GenerateAnswer {
    async fn run(&self, state: &SqlState) -> Result<StateUpdate, Box<dyn Error + Send + Sync>> {
        if state.error.is_some() {
            return Ok(StateUpdate::new());
        }
        let (Some(sql), Some(results)) = (&state.sql_query, &state.execution_result) else {
            return Ok(StateUpdate::new());
        };

        log::info!("Generating answer with {}", self.model.model_name());
        let question = state.question().unwrap_or_default();
        let context = [
            Content::system(prompts::ANSWER),
            Content::user(prompts::answer_request(&question, sql, results)),
        ];
        let answer = llm_call(
            "generate_answer",
            self.throttle,
            self.model.generate_content(&context, None, None),
        )
        .await?;
        log_llm_message(&answer, "answer");

        Ok(StateUpdate::new().message(answer).clear_error())
    }
}

/// Outcome of an answer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Finish,
}

/// Retry on any error or a missing result; finish otherwise
pub fn should_retry_or_end(state: &SqlState) -> Decision {
    if state.error.is_some() || state.execution_result.is_none() {
        Decision::Retry
    } else {
        Decision::Finish
    }
}

/// Conditional edge after `generate_answer`, bounded by `max_retries`
pub fn route_after_answer(state: &SqlState, max_retries: u32) -> Route<StateUpdate> {
    match should_retry_or_end(state) {
        Decision::Finish => Route::end(),
        Decision::Retry if state.retries >= max_retries => {
            let last = state.error.as_deref().unwrap_or("no execution result");
            log::error!("Giving up after {} retries: {}", state.retries, last);
            Route::to(END).with_update(
                StateUpdate::new().error(format!("Retry limit exceeded ({}): {}", max_retries, last)),
            )
        }
        Decision::Retry => {
            log::warn!(
                "Retrying query generation ({}/{})",
                state.retries + 1,
                max_retries
            );
            Route::to(QUERY_GEN).with_update(StateUpdate::new().retries(state.retries + 1))
        }
    }
}
