// SPDX-License-Identifier: MIT

//! Agent development kit: models, tools, configuration and errors

pub mod agent;
pub mod config;
pub mod error;
pub mod model;
pub mod tool;
