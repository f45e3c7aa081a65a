//! Graph Nodes
//!
//! Every traversal node is an actor of the runtime whose processing function
//! is a [`NodeProcessor`]: the node kind decides what happens to an incoming
//! unit of work and which named route it leaves on. Forwarding happens inside
//! the node's own processing call, so each hop re-enters the next node's
//! serial mailbox.
//!
//! ```text
//!   Root ──► Custom ──iterate──┐        Fork ──a──► A ──┐
//!               ▲              │             ──b──► B ──┼──► Join ──► End
//!               └──────────────┘             ──c──► C ──┘
//! ```

use crate::error::{GraphError, Result};
use crate::fork::{merge_branches, NodeMemory};
use crate::graph::GraphCore;
use crate::message::{Completion, ForkTicket, NodeMessage};
use crate::route::{RoutePolicy, RouteTable};
use crate::state::{GraphConfig, GraphState};
use actor_runtime::{
    Actor, ActorContext, ActorError, ActorStatus, Address, DeliveryOutcome, Processor,
};
use anyhow::Context;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    End,
    Debug,
    Custom,
    Fork,
    Join,
    Parallel,
}

impl NodeKind {
    pub fn route_policy(self) -> RoutePolicy {
        match self {
            NodeKind::Root | NodeKind::Debug => RoutePolicy::Single,
            NodeKind::End => RoutePolicy::Forbidden,
            NodeKind::Custom | NodeKind::Fork | NodeKind::Join | NodeKind::Parallel => {
                RoutePolicy::Unrestricted
            }
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Root => "root",
            NodeKind::End => "end",
            NodeKind::Debug => "debug",
            NodeKind::Custom => "custom",
            NodeKind::Fork => "fork",
            NodeKind::Join => "join",
            NodeKind::Parallel => "parallel",
        };
        f.write_str(s)
    }
}

/// Route chosen by a processing function, with an optional replacement payload
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub route: String,
    pub payload: Option<Value>,
}

impl Outcome {
    /// Leave on `route` carrying the incoming payload unchanged
    pub fn route(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// What a node sees of its graph while processing one unit of work
pub struct NodeScope<'a, S: GraphState, C: GraphConfig> {
    graph: &'a GraphCore<S, C>,
    node: &'a str,
    message: &'a NodeMessage,
}

impl<'a, S: GraphState, C: GraphConfig> NodeScope<'a, S, C> {
    pub(crate) fn new(graph: &'a GraphCore<S, C>, node: &'a str, message: &'a NodeMessage) -> Self {
        Self {
            graph,
            node,
            message,
        }
    }

    /// Snapshot of the shared state
    pub fn state(&self) -> S {
        self.graph.state.snapshot()
    }

    /// Serialized update of the shared state
    pub fn merge_change(&self, purpose: &str, change: S::Change) -> Result<()> {
        self.graph.state.merge(purpose, change)
    }

    pub fn config(&self) -> &C {
        &self.graph.config
    }

    pub fn payload(&self) -> &Value {
        self.message.payload()
    }

    /// Consecutive self-routes that led to this invocation
    pub fn iteration(&self) -> u64 {
        self.message.iteration()
    }

    pub fn traversal(&self) -> Uuid {
        self.message.traversal()
    }

    pub fn node(&self) -> &str {
        self.node
    }
}

/// User processing function of Custom and Parallel nodes
#[async_trait]
pub trait NodeLogic<S: GraphState, C: GraphConfig>: Send + Sync + 'static {
    async fn run(&self, scope: &NodeScope<'_, S, C>) -> anyhow::Result<Outcome>;
}

/// Adapter turning a synchronous closure into [`NodeLogic`]
pub struct FnLogic<F, S, C> {
    f: F,
    _marker: PhantomData<fn() -> (S, C)>,
}

pub fn node_fn<S, C, F>(f: F) -> FnLogic<F, S, C>
where
    S: GraphState,
    C: GraphConfig,
    F: Fn(&NodeScope<'_, S, C>) -> anyhow::Result<Outcome> + Send + Sync + 'static,
{
    FnLogic {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<S, C, F> NodeLogic<S, C> for FnLogic<F, S, C>
where
    S: GraphState,
    C: GraphConfig,
    F: Fn(&NodeScope<'_, S, C>) -> anyhow::Result<Outcome> + Send + Sync + 'static,
{
    async fn run(&self, scope: &NodeScope<'_, S, C>) -> anyhow::Result<Outcome> {
        (self.f)(scope)
    }
}

/// One embedded branch of a Parallel node
pub struct Branch<S: GraphState, C: GraphConfig> {
    name: String,
    logic: Arc<dyn NodeLogic<S, C>>,
}

impl<S: GraphState, C: GraphConfig> Branch<S, C> {
    pub fn new(name: impl Into<String>, logic: impl NodeLogic<S, C>) -> Self {
        Self {
            name: name.into(),
            logic: Arc::new(logic),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) enum Behavior<S: GraphState, C: GraphConfig> {
    Root,
    End,
    Debug,
    Custom {
        logic: Arc<dyn NodeLogic<S, C>>,
        max_iterations: Option<u64>,
    },
    Fork,
    Join {
        fork: Address,
    },
    Parallel {
        branches: Vec<Branch<S, C>>,
        outcome: String,
    },
}

/// Handle to a traversal node
#[derive(Clone)]
pub struct Node {
    name: String,
    kind: NodeKind,
    actor: Actor<NodeMemory, NodeMessage>,
    routes: Arc<RwLock<RouteTable>>,
}

impl Node {
    pub(crate) fn new(
        name: String,
        kind: NodeKind,
        actor: Actor<NodeMemory, NodeMessage>,
        routes: Arc<RwLock<RouteTable>>,
    ) -> Self {
        Self {
            name,
            kind,
            actor,
            routes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn address(&self) -> &Address {
        self.actor.address()
    }

    pub fn status(&self) -> ActorStatus {
        self.actor.status()
    }

    /// Register a unidirectional edge named `route` to `destination`
    pub fn one_way_route(&self, route: &str, destination: &Node) -> Result<()> {
        if destination.address().parent() != self.address().parent() {
            return Err(GraphError::routing_invalid(
                &self.name,
                format!("{} belongs to another graph", destination.address()),
            ));
        }
        self.routes
            .write()
            .insert(route, destination.address().clone())?;
        debug!(
            node = %self.name,
            route,
            destination = %destination.name,
            "Route registered"
        );
        Ok(())
    }

    /// Registered routes in name order
    pub fn routes(&self) -> Vec<(String, Address)> {
        self.routes
            .read()
            .iter()
            .map(|(name, address)| (name.to_string(), address.clone()))
            .collect()
    }

    /// Inject a unit of work directly into this node
    pub async fn deliver(&self, message: NodeMessage) -> Result<DeliveryOutcome> {
        Ok(self.actor.deliver(message).await?)
    }

    /// Fork dispatches still waiting for branches (join nodes only)
    pub fn pending_joins(&self) -> usize {
        self.actor.state().open_barriers()
    }

    pub fn actor(&self) -> &Actor<NodeMemory, NodeMessage> {
        &self.actor
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("address", self.address())
            .field("routes", &self.routes.read().len())
            .finish()
    }
}

/// Processing function shared by every traversal node kind
pub(crate) struct NodeProcessor<S: GraphState, C: GraphConfig> {
    name: String,
    behavior: Behavior<S, C>,
    routes: Arc<RwLock<RouteTable>>,
    graph: Arc<GraphCore<S, C>>,
}

impl<S: GraphState, C: GraphConfig> NodeProcessor<S, C> {
    pub(crate) fn new(
        name: String,
        behavior: Behavior<S, C>,
        routes: Arc<RwLock<RouteTable>>,
        graph: Arc<GraphCore<S, C>>,
    ) -> Self {
        Self {
            name,
            behavior,
            routes,
            graph,
        }
    }

    fn route(&self, route: &str) -> Result<Address> {
        self.routes.read().get(route).cloned()
    }

    fn single_route(&self) -> Result<Address> {
        self.routes.read().single().map(|(_, address)| address.clone())
    }

    async fn forward(&self, destination: &Address, message: NodeMessage) -> Result<()> {
        self.graph.book.deliver(destination, message).await?;
        Ok(())
    }

    /// Take the route named by `outcome`, counting consecutive self-routes
    async fn follow(
        &self,
        here: &Address,
        message: &NodeMessage,
        outcome: Outcome,
        guard: Option<u64>,
    ) -> Result<()> {
        let destination = self.route(&outcome.route)?;
        let iteration = if &destination == here {
            let next = message.iteration() + 1;
            if let Some(limit) = guard {
                if next > limit {
                    return Err(GraphError::IterationLimit {
                        node: self.name.clone(),
                        limit,
                    });
                }
            }
            next
        } else {
            0
        };

        debug!(
            node = %self.name,
            route = %outcome.route,
            traversal = %message.traversal(),
            iteration,
            "Following route"
        );
        let payload = outcome.payload.unwrap_or_else(|| message.payload().clone());
        self.forward(&destination, message.hop(here, payload, iteration))
            .await
    }

    /// Forward merged branch payloads on the join's single route
    async fn fire(&self, here: &Address, message: &NodeMessage, merged: Value) -> Result<()> {
        let destination = self.single_route()?;
        self.forward(&destination, message.hop(here, merged, 0)).await
    }

    async fn dispatch_fork(&self, here: &Address, message: &NodeMessage) -> Result<()> {
        let targets: Vec<(String, Address)> = self
            .routes
            .read()
            .iter()
            .map(|(name, address)| (name.to_string(), address.clone()))
            .collect();
        if targets.is_empty() {
            return Err(GraphError::routing_invalid(&self.name, "fork has no branches"));
        }
        // Every branch must be reachable before any ticket goes out
        if let Some((_, missing)) = targets
            .iter()
            .find(|(_, destination)| !self.graph.book.contains(destination))
        {
            return Err(ActorError::UnknownAddress {
                address: missing.clone(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let width = targets.len();
        debug!(node = %self.name, fork_id = %id, width, "Dispatching fork");

        for (branch, destination) in targets {
            let mut next = message.hop(here, message.payload().clone(), 0);
            next.push_ticket(ForkTicket {
                fork: here.clone(),
                id,
                branch,
                width,
            });
            self.forward(&destination, next).await?;
        }
        Ok(())
    }

    async fn run_parallel(
        &self,
        here: &Address,
        message: &NodeMessage,
        branches: &[Branch<S, C>],
        outcome: &str,
    ) -> anyhow::Result<()> {
        let scope = NodeScope::new(&self.graph, &self.name, message);
        let results = join_all(branches.iter().map(|branch| branch.logic.run(&scope))).await;

        let mut payloads = Vec::with_capacity(branches.len());
        for (branch, result) in branches.iter().zip(results) {
            let produced = result.with_context(|| {
                format!("parallel branch '{}' of node '{}' failed", branch.name, self.name)
            })?;
            let payload = produced.payload.unwrap_or_else(|| message.payload().clone());
            payloads.push((branch.name.clone(), payload));
        }

        let destination = self.route(outcome)?;
        self.forward(&destination, message.hop(here, merge_branches(payloads), 0))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<S: GraphState, C: GraphConfig> Processor<NodeMemory, NodeMessage> for NodeProcessor<S, C> {
    async fn process(
        &self,
        message: NodeMessage,
        ctx: &ActorContext<'_, NodeMemory, NodeMessage>,
    ) -> anyhow::Result<NodeMemory> {
        let here = ctx.address();

        match &self.behavior {
            Behavior::Root => {
                let destination = self.single_route()?;
                info!(
                    graph = %self.graph.name,
                    traversal = %message.traversal(),
                    "Traversal started"
                );
                self.forward(&destination, message.hop(here, message.payload().clone(), 0))
                    .await?;
            }
            Behavior::Debug => {
                debug!(
                    node = %self.name,
                    traversal = %message.traversal(),
                    sender = %actor_runtime::Message::sender(&message),
                    payload = %message.payload(),
                    "Debug pass-through"
                );
                let destination = self.single_route()?;
                self.forward(&destination, message.hop(here, message.payload().clone(), 0))
                    .await?;
            }
            Behavior::End => {
                info!(
                    graph = %self.graph.name,
                    node = %self.name,
                    traversal = %message.traversal(),
                    "Traversal completed"
                );
                let completion = Completion {
                    end: self.name.clone(),
                    traversal: message.traversal(),
                    payload: message.payload().clone(),
                };
                if self.graph.completions.send(completion).is_err() {
                    debug!(graph = %self.graph.name, "Completion receiver dropped");
                }
            }
            Behavior::Custom {
                logic,
                max_iterations,
            } => {
                let outcome = {
                    let scope = NodeScope::new(&self.graph, &self.name, &message);
                    logic.run(&scope).await?
                };
                self.follow(here, &message, outcome, *max_iterations)
                    .await?;
            }
            Behavior::Fork => {
                self.dispatch_fork(here, &message).await?;
            }
            Behavior::Join { fork } => {
                let mut message = message;
                let ticket = message.pop_ticket().ok_or(GraphError::UnexpectedMessage {
                    node: self.name.clone(),
                    kind: "unforked",
                })?;
                let branch = ticket.branch.clone();

                let mut memory = ctx.state().clone();
                match memory.arrive(&self.name, fork, ticket, message.payload().clone())? {
                    Some(merged) => {
                        debug!(node = %self.name, branch = %branch, "Join complete");
                        // The barrier is already closed; a failed fire must not reopen it
                        if let Err(e) = self.fire(here, &message, merged).await {
                            ctx.report_failure(e.into());
                        }
                    }
                    None => {
                        debug!(node = %self.name, branch = %branch, "Branch arrived");
                    }
                }
                return Ok(memory);
            }
            Behavior::Parallel { branches, outcome } => {
                self.run_parallel(here, &message, branches, outcome).await?;
            }
        }

        Ok(ctx.state().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_policies_by_kind() {
        assert_eq!(NodeKind::Root.route_policy(), RoutePolicy::Single);
        assert_eq!(NodeKind::Debug.route_policy(), RoutePolicy::Single);
        assert_eq!(NodeKind::End.route_policy(), RoutePolicy::Forbidden);
        for kind in [NodeKind::Custom, NodeKind::Fork, NodeKind::Join, NodeKind::Parallel] {
            assert_eq!(kind.route_policy(), RoutePolicy::Unrestricted);
        }
    }

    #[test]
    fn test_outcome_builder() {
        let outcome = Outcome::route("complete").with_payload(serde_json::json!({"n": 3}));
        assert_eq!(outcome.route, "complete");
        assert_eq!(outcome.payload, Some(serde_json::json!({"n": 3})));
        assert_eq!(Outcome::route("iterate").payload, None);
    }
}
