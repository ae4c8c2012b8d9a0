// SPDX-License-Identifier: MIT

//! Model module - defines the LLM capability and the message model
//!
//! This module provides the core [`Model`] trait and shared types.
//! Implementations and wrappers live in their own submodules:
//! - [openai] - OpenAI-compatible chat-completions client (Mistral, Groq)
//! - [provider] - provider lookup table and model listing
//! - [throttle] - logging/rate-limit wrapper applied around each LLM call

pub mod openai;
pub mod provider;
pub mod throttle;

use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;

/// Role tags used in [`Content::role`]
pub mod role {
    pub const SYSTEM: &str = "system";
    pub const USER: &str = "user";
    pub const MODEL: &str = "model";
    pub const TOOL: &str = "tool";
}

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Parts of a message - text, tool invocation requests and tool results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Regular text output
    Text { text: String },
    /// Tool invocation requested by the model
    FunctionCall {
        /// Correlation id shared with the matching [`Part::FunctionResponse`]
        id: String,
        name: String,
        args: Value,
    },
    /// Result of executing a tool invocation request
    FunctionResponse {
        id: String,
        name: String,
        response: Value,
    },
}

/// A tool invocation request borrowed out of a message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionCall<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub args: &'a Value,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }
}

impl Content {
    pub fn new(role: &str, parts: Vec<Part>) -> Self {
        Self {
            role: role.to_string(),
            parts,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(role::SYSTEM, vec![Part::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(role::USER, vec![Part::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(role::MODEL, vec![Part::text(text)])
    }

    /// Assistant message carrying a single tool invocation request
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self::new(
            role::MODEL,
            vec![Part::FunctionCall {
                id: id.into(),
                name: name.into(),
                args,
            }],
        )
    }

    /// Tool-result message answering the request with the same `id`
    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, response: Value) -> Self {
        Self::new(
            role::TOOL,
            vec![Part::FunctionResponse {
                id: id.into(),
                name: name.into(),
                response,
            }],
        )
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool invocation requests carried by this message, in order
    pub fn function_calls(&self) -> Vec<FunctionCall<'_>> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall { id, name, args } => Some(FunctionCall {
                    id: id.as_str(),
                    name: name.as_str(),
                    args,
                }),
                _ => None,
            })
            .collect()
    }

    /// Correlation ids of the tool results carried by this message
    pub fn response_ids(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionResponse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// LLM model declaration, used only for listing provider catalogs
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub context_length: u64,
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    /// Identifier of the remote model, used in logs
    fn model_name(&self) -> &str;

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, Box<dyn Error + Send + Sync>>;
}

/// A model bound to a fixed set of tools it may request.
///
/// Any tools passed at call time are ignored in favor of the bound set.
pub struct BoundModel {
    inner: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
}

impl BoundModel {
    pub fn new(inner: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { inner, tools }
    }
}

/// Bind `tools` to `model`
pub fn bind_tools(model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> BoundModel {
    BoundModel::new(model, tools)
}

#[async_trait]
impl Model for BoundModel {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        _tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, Box<dyn Error + Send + Sync>> {
        self.inner
            .generate_content(history, config, Some(&self.tools))
            .await
    }
}
