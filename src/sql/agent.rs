// SPDX-License-Identifier: MIT

//! SQL agent - natural-language question in, answer grounded in query results out

use crate::adk::agent::Agent;
use crate::adk::config::{Config, WorkflowSettings};
use crate::adk::error::SqlAgentError;
use crate::adk::model::provider::LlmFactory;
use crate::adk::model::Model;
use crate::sql::database::DatabaseManager;
use crate::sql::tools::SqlToolkit;
use crate::sql::workflow::{
    build_workflow, CompiledGraph, SqlState, WorkflowEvent, WorkflowModels,
};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Builder for [`SqlAgent`]
pub struct SqlAgentBuilder {
    name: String,
    query_gen: Option<Arc<dyn Model>>,
    query_check: Option<Arc<dyn Model>>,
    answer: Option<Arc<dyn Model>>,
    toolkit: Option<SqlToolkit>,
    settings: WorkflowSettings,
}

impl SqlAgentBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            query_gen: None,
            query_check: None,
            answer: None,
            toolkit: None,
            settings: WorkflowSettings::default(),
        }
    }

    pub fn query_gen_model(mut self, model: Arc<dyn Model>) -> Self {
        self.query_gen = Some(model);
        self
    }

    pub fn query_check_model(mut self, model: Arc<dyn Model>) -> Self {
        self.query_check = Some(model);
        self
    }

    pub fn answer_model(mut self, model: Arc<dyn Model>) -> Self {
        self.answer = Some(model);
        self
    }

    /// Use one model for every role
    pub fn model(self, model: Arc<dyn Model>) -> Self {
        self.query_gen_model(model.clone())
            .query_check_model(model.clone())
            .answer_model(model)
    }

    pub fn toolkit(mut self, toolkit: SqlToolkit) -> Self {
        self.toolkit = Some(toolkit);
        self
    }

    pub fn settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<SqlAgent, SqlAgentError> {
        let missing = |role: &str| SqlAgentError::config(format!("no {} model configured", role));
        let models = WorkflowModels {
            query_gen: self.query_gen.ok_or_else(|| missing("query_gen"))?,
            query_check: self.query_check.ok_or_else(|| missing("query_check"))?,
            answer: self.answer.ok_or_else(|| missing("answer"))?,
        };
        let toolkit = self
            .toolkit
            .ok_or_else(|| SqlAgentError::config("no SQL toolkit configured"))?;

        let graph = build_workflow(&models, &toolkit, &self.settings)?;
        Ok(SqlAgent {
            name: self.name,
            graph,
        })
    }
}

/// Answers questions by running the SQL workflow once per question
pub struct SqlAgent {
    name: String,
    graph: CompiledGraph<SqlState>,
}

impl SqlAgent {
    pub fn builder(name: &str) -> SqlAgentBuilder {
        SqlAgentBuilder::new(name)
    }

    /// Connect the database and create the role models described by `config`
    pub async fn from_config(config: &Config) -> Result<Self, SqlAgentError> {
        let db = Arc::new(DatabaseManager::connect(&config.database_url).await?);
        let factory = LlmFactory::new(&config.api_keys);

        SqlAgentBuilder::new("sql_agent")
            .query_gen_model(factory.create(&config.llm.query_gen)?)
            .query_check_model(factory.create(&config.llm.query_check)?)
            .answer_model(factory.create(&config.llm.answer)?)
            .toolkit(SqlToolkit::new(db))
            .settings(config.workflow.clone())
            .build()
    }

    /// Run the workflow for `question` and return the final state
    pub async fn invoke(&self, question: &str) -> Result<SqlState, SqlAgentError> {
        self.invoke_stream(question, None).await
    }

    /// Like [`invoke`](Self::invoke), reporting progress on `events`
    pub async fn invoke_stream(
        &self,
        question: &str,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<SqlState, SqlAgentError> {
        log::info!("[{}] Question: {}", self.name, question);
        let state = self
            .graph
            .invoke_with_events(SqlState::new(question), events)
            .await?;
        match &state.error {
            Some(error) => log::warn!("[{}] Finished with error: {}", self.name, error),
            None => log::info!("[{}] Finished after {} retries", self.name, state.retries),
        }
        Ok(state)
    }
}

#[async_trait]
impl Agent for SqlAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
        let state = self.invoke(&input).await?;
        if let Some(answer) = state.final_answer() {
            return Ok(answer);
        }
        Err(state
            .error
            .unwrap_or_else(|| "No answer generated".to_string())
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::{Content, GenerationConfig};
    use crate::adk::tool::Tool;

    struct SilentModel;

    #[async_trait]
    impl Model for SilentModel {
        fn model_name(&self) -> &str {
            "silent"
        }

        async fn generate_content(
            &self,
            _history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content, Box<dyn Error + Send + Sync>> {
            Ok(Content::model_text(""))
        }
    }

    #[test]
    fn test_build_requires_models() {
        let err = SqlAgentBuilder::new("t").build().err().unwrap();
        assert!(matches!(err, SqlAgentError::Config(msg) if msg.contains("query_gen")));
    }

    #[tokio::test]
    async fn test_build_requires_toolkit() {
        let err = SqlAgentBuilder::new("t")
            .model(Arc::new(SilentModel))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SqlAgentError::Config(msg) if msg.contains("toolkit")));
    }

    #[tokio::test]
    async fn test_from_config_without_keys_fails() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Config::default()
        };
        let err = SqlAgent::from_config(&config).await.err().unwrap();
        assert!(err.to_string().contains("API key not configured"));
    }
}
