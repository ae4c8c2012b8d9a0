// SPDX-License-Identifier: MIT

pub mod extract;
pub mod fallback;
pub mod graph;
pub mod nodes;
pub mod state;

pub use graph::{CompiledGraph, StateGraph, WorkflowEvent, END};
pub use state::{SqlState, StateUpdate};

use crate::adk::config::WorkflowSettings;
use crate::adk::error::WorkflowError;
use crate::adk::model::{bind_tools, Model};
use crate::sql::tools::SqlToolkit;
use fallback::ToolNode;
use graph::FnNode;
use nodes::{
    first_tool_call, route_after_answer, ExecuteQuery, GenerateAnswer, ModelGetSchema, QueryCheck,
    QueryGen,
};
use std::sync::Arc;
use std::time::Duration;

pub const FIRST_TOOL_CALL: &str = "first_tool_call";
pub const LIST_TABLES_TOOL: &str = "list_tables_tool";
pub const MODEL_GET_SCHEMA: &str = "model_get_schema";
pub const GET_SCHEMA_TOOL: &str = "get_schema_tool";
pub const QUERY_GEN: &str = "query_gen";
pub const QUERY_CHECK: &str = "query_check";
pub const EXECUTE_QUERY: &str = "execute_query";
pub const GENERATE_ANSWER: &str = "generate_answer";

/// Nodes run once before the first query generation
const SETUP_STEPS: usize = 4;
/// Nodes run per generation pass, `query_gen` through `generate_answer`
const PASS_STEPS: usize = 4;

/// Fewest steps that let a run exhaust `max_retries` and still end through the router
pub fn min_recursion_limit(max_retries: u32) -> usize {
    SETUP_STEPS + PASS_STEPS * (max_retries as usize + 1)
}

/// Models serving the LLM roles of the workflow
#[derive(Clone)]
pub struct WorkflowModels {
    /// Generates queries and picks tables to describe
    pub query_gen: Arc<dyn Model>,
    pub query_check: Arc<dyn Model>,
    pub answer: Arc<dyn Model>,
}

/// Wire the eight steps into a compiled graph
pub fn build_workflow(
    models: &WorkflowModels,
    tools: &SqlToolkit,
    settings: &WorkflowSettings,
) -> Result<CompiledGraph<SqlState>, WorkflowError> {
    let throttle = Duration::from_millis(settings.throttle_ms);
    let max_retries = settings.max_retries;
    let floor = min_recursion_limit(max_retries);
    let recursion_limit = if settings.recursion_limit < floor {
        log::warn!(
            "Raising recursion limit from {} to {} to fit {} retries",
            settings.recursion_limit,
            floor,
            max_retries
        );
        floor
    } else {
        settings.recursion_limit
    };
    let schema_model = bind_tools(models.query_gen.clone(), vec![tools.get_schema.clone()]);

    let mut graph = StateGraph::new();
    graph
        .add_node(FIRST_TOOL_CALL, FnNode(first_tool_call))
        .add_node(LIST_TABLES_TOOL, ToolNode::new(vec![tools.list_tables.clone()]))
        .add_node(MODEL_GET_SCHEMA, ModelGetSchema::new(schema_model, throttle))
        .add_node(GET_SCHEMA_TOOL, ToolNode::new(vec![tools.get_schema.clone()]))
        .add_node(QUERY_GEN, QueryGen::new(models.query_gen.clone(), throttle))
        .add_node(QUERY_CHECK, QueryCheck::new(models.query_check.clone(), throttle))
        .add_node(EXECUTE_QUERY, ExecuteQuery::new(tools.run_query.clone()))
        .add_node(GENERATE_ANSWER, GenerateAnswer::new(models.answer.clone(), throttle))
        .set_entry(FIRST_TOOL_CALL)
        .add_edge(FIRST_TOOL_CALL, LIST_TABLES_TOOL)
        .add_edge(LIST_TABLES_TOOL, MODEL_GET_SCHEMA)
        .add_edge(MODEL_GET_SCHEMA, GET_SCHEMA_TOOL)
        .add_edge(GET_SCHEMA_TOOL, QUERY_GEN)
        .add_edge(QUERY_GEN, QUERY_CHECK)
        .add_edge(QUERY_CHECK, EXECUTE_QUERY)
        .add_edge(EXECUTE_QUERY, GENERATE_ANSWER)
        .add_conditional_edges(GENERATE_ANSWER, move |state: &SqlState| {
            route_after_answer(state, max_retries)
        })
        .recursion_limit(recursion_limit);

    graph.compile()
}
