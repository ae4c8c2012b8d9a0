// SPDX-License-Identifier: MIT

pub mod agent;
pub mod database;
pub mod prompts;
pub mod server;
pub mod tools;
pub mod workflow;

pub use agent::{SqlAgent, SqlAgentBuilder};
