// SPDX-License-Identifier: MIT

//! Conversation state threaded through the SQL workflow

use crate::adk::model::{role, Content};
use crate::sql::workflow::graph::GraphState;
use serde::{Deserialize, Serialize};

/// State of one question, owned by the graph between node runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlState {
    /// Full conversation; only ever appended to
    pub messages: Vec<Content>,
    /// Most recently generated or validated query
    pub sql_query: Option<String>,
    /// Rendered rows of the last successful execution
    pub execution_result: Option<String>,
    /// Most recent failure; `None` when healthy
    pub error: Option<String>,
    /// How many times the retry edge has fired
    pub retries: u32,
}

impl SqlState {
    /// Fresh state seeded with the user's question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            messages: vec![Content::user(question)],
            ..Self::default()
        }
    }

    /// Text of the first user message
    pub fn question(&self) -> Option<String> {
        self.messages
            .iter()
            .find(|m| m.role == role::USER)
            .map(Content::text)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.execution_result.is_some()
    }

    /// Text of the last message when the run succeeded
    pub fn final_answer(&self) -> Option<String> {
        if !self.is_success() {
            return None;
        }
        self.messages
            .last()
            .map(Content::text)
            .filter(|t| !t.is_empty())
    }

    pub fn last_message(&self) -> Option<&Content> {
        self.messages.last()
    }
}

/// Partial state returned by a node.
///
/// `messages` are appended. Scalar fields left as `None` keep their current
/// value; `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Content>,
    pub sql_query: Option<Option<String>>,
    pub execution_result: Option<Option<String>>,
    pub error: Option<Option<String>>,
    pub retries: Option<u32>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: Content) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = Content>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn sql_query(mut self, sql: Option<String>) -> Self {
        self.sql_query = Some(sql);
        self
    }

    pub fn execution_result(mut self, result: Option<String>) -> Self {
        self.execution_result = Some(result);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl GraphState for SqlState {
    type Update = StateUpdate;

    fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(sql) = update.sql_query {
            self.sql_query = sql;
        }
        if let Some(result) = update.execution_result {
            self.execution_result = result;
        }
        if let Some(error) = update.error {
            self.error = error;
        }
        if let Some(retries) = update.retries {
            self.retries = retries;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_seeds_question() {
        let state = SqlState::new("How many orders?");
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.question().as_deref(), Some("How many orders?"));
        assert!(state.sql_query.is_none());
        assert!(!state.is_success());
    }

    #[test]
    fn test_messages_concatenate() {
        let mut state = SqlState::new("q");
        state.apply(StateUpdate::new().message(Content::model_text("a")));
        state.apply(StateUpdate::new().messages(vec![
            Content::model_text("b"),
            Content::model_text("c"),
        ]));
        let texts: Vec<String> = state.messages.iter().map(Content::text).collect();
        assert_eq!(texts, vec!["q", "a", "b", "c"]);
    }

    #[test]
    fn test_scalars_replace_only_when_present() {
        let mut state = SqlState::new("q");
        state.apply(
            StateUpdate::new()
                .sql_query(Some("SELECT 1;".to_string()))
                .error("boom"),
        );
        assert_eq!(state.sql_query.as_deref(), Some("SELECT 1;"));
        assert_eq!(state.error.as_deref(), Some("boom"));

        // Untouched fields survive
        state.apply(StateUpdate::new().message(Content::model_text("x")));
        assert_eq!(state.sql_query.as_deref(), Some("SELECT 1;"));
        assert_eq!(state.error.as_deref(), Some("boom"));

        // Explicit clears
        state.apply(StateUpdate::new().clear_error().sql_query(None));
        assert!(state.error.is_none());
        assert!(state.sql_query.is_none());
    }

    #[test]
    fn test_final_answer_requires_success() {
        let mut state = SqlState::new("q");
        state.apply(StateUpdate::new().message(Content::model_text("answer")));
        assert_eq!(state.final_answer(), None);

        state.apply(StateUpdate::new().execution_result(Some("| n |".to_string())));
        assert_eq!(state.final_answer().as_deref(), Some("answer"));
    }

    #[test]
    fn test_empty_update() {
        assert!(StateUpdate::new().is_empty());
        assert!(!StateUpdate::new().clear_error().is_empty());
    }

    #[test]
    fn test_state_serializes() {
        let state = SqlState::new("q");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["error"].is_null());
        assert_eq!(json["retries"], 0);
    }
}
