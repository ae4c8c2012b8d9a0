// SPDX-License-Identifier: MIT

//! State-machine engine
//!
//! A [`StateGraph`] is a set of named nodes joined by edges. Each node reads
//! the current state and returns an update; the engine merges the update and
//! follows the node's single outgoing edge, which is either fixed or chosen
//! by a router over the merged state. Execution is strictly sequential.

use crate::adk::error::{SqlAgentError, WorkflowError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Terminal pseudo-node
pub const END: &str = "__end__";

/// Default cap on node executions per invocation
pub const DEFAULT_RECURSION_LIMIT: usize = 50;

/// State that can absorb partial updates
pub trait GraphState: Clone + Send + Sync + 'static {
    type Update: Send + 'static;

    fn apply(&mut self, update: Self::Update);
}

/// A step of the graph
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    /// Compute an update from a read-only view of the state
    async fn run(&self, state: &S) -> Result<S::Update, Box<dyn Error + Send + Sync>>;
}

/// Adapter for synchronous, infallible step functions
pub struct FnNode<F>(pub F);

#[async_trait]
impl<S, F> Node<S> for FnNode<F>
where
    S: GraphState,
    F: Fn(&S) -> S::Update + Send + Sync,
{
    async fn run(&self, state: &S) -> Result<S::Update, Box<dyn Error + Send + Sync>> {
        Ok((self.0)(state))
    }
}

/// Where a conditional edge leads, optionally carrying an update applied
/// when the edge fires
pub struct Route<U> {
    pub target: String,
    pub update: Option<U>,
}

impl<U> Route<U> {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            update: None,
        }
    }

    pub fn end() -> Self {
        Self::to(END)
    }

    pub fn with_update(mut self, update: U) -> Self {
        self.update = Some(update);
        self
    }
}

type Router<S> = Arc<dyn Fn(&S) -> Route<<S as GraphState>::Update> + Send + Sync>;

enum Edge<S: GraphState> {
    Direct(String),
    Conditional(Router<S>),
}

/// Progress notifications, e.g. for streaming to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    NodeStarted { node: String, step: usize },
    NodeCompleted { node: String },
    Routed { from: String, to: String },
    Finished { steps: usize },
    Failed { node: String, message: String },
}

/// Graph under construction
pub struct StateGraph<S: GraphState> {
    nodes: Vec<(String, Arc<dyn Node<S>>)>,
    edges: Vec<(String, Edge<S>)>,
    entry: Option<String>,
    recursion_limit: usize,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            entry: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    pub fn add_node(&mut self, name: &str, node: impl Node<S> + 'static) -> &mut Self {
        self.nodes.push((name.to_string(), Arc::new(node)));
        self
    }

    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        self.edges.push((from.to_string(), Edge::Direct(to.to_string())));
        self
    }

    pub fn add_conditional_edges<F>(&mut self, from: &str, router: F) -> &mut Self
    where
        F: Fn(&S) -> Route<S::Update> + Send + Sync + 'static,
    {
        self.edges
            .push((from.to_string(), Edge::Conditional(Arc::new(router))));
        self
    }

    pub fn set_entry(&mut self, name: &str) -> &mut Self {
        self.entry = Some(name.to_string());
        self
    }

    pub fn recursion_limit(&mut self, limit: usize) -> &mut Self {
        self.recursion_limit = limit;
        self
    }

    /// Validate the wiring and freeze the graph
    pub fn compile(self) -> Result<CompiledGraph<S>, WorkflowError> {
        let mut nodes = HashMap::with_capacity(self.nodes.len());
        for (name, node) in self.nodes {
            if name == END || nodes.insert(name.clone(), node).is_some() {
                return Err(WorkflowError::DuplicateNode(name));
            }
        }

        let entry = self.entry.ok_or(WorkflowError::MissingEntry)?;
        if !nodes.contains_key(&entry) {
            return Err(WorkflowError::UnknownNode(entry));
        }

        let mut edges = HashMap::with_capacity(self.edges.len());
        for (from, edge) in self.edges {
            if !nodes.contains_key(&from) {
                return Err(WorkflowError::UnknownNode(from));
            }
            if let Edge::Direct(to) = &edge {
                if to != END && !nodes.contains_key(to) {
                    return Err(WorkflowError::UnknownNode(to.clone()));
                }
            }
            if edges.insert(from.clone(), edge).is_some() {
                return Err(WorkflowError::AmbiguousEdge(from));
            }
        }

        let sources: HashSet<&String> = edges.keys().collect();
        if let Some(name) = nodes.keys().find(|n| !sources.contains(n)) {
            return Err(WorkflowError::MissingEdge(name.clone()));
        }

        Ok(CompiledGraph {
            nodes,
            edges,
            entry,
            recursion_limit: self.recursion_limit,
        })
    }
}

/// Executable graph
pub struct CompiledGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
    entry: String,
    recursion_limit: usize,
}

async fn emit(events: Option<&mpsc::Sender<WorkflowEvent>>, event: WorkflowEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

impl<S: GraphState> CompiledGraph<S> {
    /// Run from the entry node until [`END`]
    pub async fn invoke(&self, state: S) -> Result<S, SqlAgentError> {
        self.invoke_with_events(state, None).await
    }

    pub async fn invoke_with_events(
        &self,
        mut state: S,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<S, SqlAgentError> {
        let mut current = self.entry.clone();
        let mut steps = 0;

        while current != END {
            steps += 1;
            if steps > self.recursion_limit {
                log::error!("Graph execution exceeded {} steps", self.recursion_limit);
                emit(
                    events,
                    WorkflowEvent::Failed {
                        node: current,
                        message: "recursion limit reached".to_string(),
                    },
                )
                .await;
                return Err(WorkflowError::RecursionLimit(self.recursion_limit).into());
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| WorkflowError::UnknownNode(current.clone()))?;

            log::info!("Executing node: {} (step {})", current, steps);
            emit(
                events,
                WorkflowEvent::NodeStarted {
                    node: current.clone(),
                    step: steps,
                },
            )
            .await;

            let update = match node.run(&state).await {
                Ok(update) => update,
                Err(e) => {
                    log::error!("Node {} failed: {}", current, e);
                    emit(
                        events,
                        WorkflowEvent::Failed {
                            node: current.clone(),
                            message: e.to_string(),
                        },
                    )
                    .await;
                    return Err(SqlAgentError::node_failed(current, e));
                }
            };
            state.apply(update);
            emit(
                events,
                WorkflowEvent::NodeCompleted {
                    node: current.clone(),
                },
            )
            .await;

            let next = match &self.edges[&current] {
                Edge::Direct(to) => to.clone(),
                Edge::Conditional(router) => {
                    let route = router(&state);
                    if let Some(update) = route.update {
                        state.apply(update);
                    }
                    log::info!("Routing {} -> {}", current, route.target);
                    emit(
                        events,
                        WorkflowEvent::Routed {
                            from: current.clone(),
                            to: route.target.clone(),
                        },
                    )
                    .await;
                    route.target
                }
            };
            current = next;
        }

        emit(events, WorkflowEvent::Finished { steps }).await;
        Ok(state)
    }
}
