// SPDX-License-Identifier: MIT

//! Typed error handling for sql-agent-rs
//!
//! Trait seams (`Model`, `Tool`, `Node`) keep returning
//! `Box<dyn Error + Send + Sync>`; everything that crosses the public API
//! is converted into [`SqlAgentError`].

use std::error::Error as StdError;
use thiserror::Error;

/// Top-level error type for sql-agent-rs
#[derive(Debug, Error)]
pub enum SqlAgentError {
    /// API errors from external services (Mistral, Groq, ...)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Tool not found during execution
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or driver errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Workflow graph construction or execution errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Model/provider errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A node raised instead of recording its failure in state
    #[error("Node '{node}' failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Workflow graph errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No entry node was set before compiling
    #[error("Workflow has no entry node")]
    MissingEntry,

    /// An edge or entry point references a node that does not exist
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Two nodes registered under the same name
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    /// A node has no outgoing edge
    #[error("Node '{0}' has no outgoing edge")]
    MissingEdge(String),

    /// A node has more than one outgoing edge
    #[error("Node '{0}' has more than one outgoing edge")]
    AmbiguousEdge(String),

    /// Step budget exhausted
    #[error("Recursion limit of {0} steps reached")]
    RecursionLimit(usize),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider name not in the lookup table
    #[error("Provider {provider} not supported. Use {supported}")]
    UnsupportedProvider { provider: String, supported: String },

    /// Provider cannot bind tools
    #[error("Provider {0} does not support tool/function calling")]
    ToolsUnsupported(String),

    /// Transient failures persisted past the retry budget
    #[error("{provider} request failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        message: String,
    },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl SqlAgentError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool not found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wrap an error raised by a graph node
    pub fn node_failed(node: impl Into<String>, source: Box<dyn StdError + Send + Sync>) -> Self {
        Self::NodeFailed {
            node: node.into(),
            source,
        }
    }
}

impl From<&str> for SqlAgentError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for SqlAgentError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<Box<dyn StdError + Send + Sync>> for SqlAgentError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        Self::Other(err.to_string())
    }
}
