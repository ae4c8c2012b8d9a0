// SPDX-License-Identifier: MIT

//! Agent trait - a question in, an answer out

use async_trait::async_trait;
use std::error::Error;

/// Core agent trait for question-answering agents
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent with the given input and return the final answer
    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>>;
}
