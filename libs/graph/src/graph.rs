//! Graph
//!
//! Owns the shared state, the configuration snapshot, the node address book and
//! the completion channel. A supervisor actor at `graph://<host>/<name>` is
//! the parent of every node, so shutting the graph down tears down all nodes
//! through the runtime's cascading stop.

use crate::config_node::{self, ConfigMessage, ConfigNode};
use crate::error::{GraphError, Result};
use crate::fork::NodeMemory;
use crate::message::{Completion, NodeMessage};
use crate::node::{Behavior, Branch, Node, NodeKind, NodeLogic, NodeProcessor};
use crate::route::RouteTable;
use crate::state::{GraphConfig, GraphState, SharedState};
use crate::status_node::{StatusMessage, StatusNode};
use actor_runtime::{
    from_fn, Actor, ActorContext, ActorError, ActorOptions, ActorState, Address, AddressBook,
    FailureHook, Message, RuntimeConfig, Scheme, Supervised,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_STATE_CHANNEL_CAPACITY: usize = 64;

/// Parts of a graph shared with every node processor
pub(crate) struct GraphCore<S: GraphState, C: GraphConfig> {
    pub(crate) name: String,
    pub(crate) state: SharedState<S>,
    pub(crate) config: C,
    pub(crate) book: Arc<AddressBook<NodeMessage>>,
    pub(crate) completions: mpsc::UnboundedSender<Completion>,
}

/// The graph supervisor never receives messages
pub(crate) enum SupervisorSignal {}

impl Message for SupervisorSignal {
    fn sender(&self) -> &Address {
        match *self {}
    }

    fn mutation(&self) -> bool {
        match *self {}
    }
}

pub struct GraphBuilder {
    name: String,
    host: Option<String>,
    runtime: RuntimeConfig,
    max_iterations: Option<u64>,
    state_channel_capacity: usize,
    on_failure: Option<FailureHook>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
            runtime: RuntimeConfig::default(),
            max_iterations: None,
            state_channel_capacity: DEFAULT_STATE_CHANNEL_CAPACITY,
            on_failure: None,
        }
    }

    /// Host of node addresses; defaults to the runtime config host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Mailbox and drain settings for every node
    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    /// Default self-route guard for Custom nodes
    pub fn max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = Some(limit);
        self
    }

    pub fn state_channel_capacity(mut self, capacity: usize) -> Self {
        self.state_channel_capacity = capacity;
        self
    }

    /// Observe processing failures of every node
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActorError) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    /// Must be called from within a Tokio runtime
    pub fn build<S: GraphState, C: GraphConfig>(self, state: S, config: C) -> Result<Graph<S, C>> {
        self.runtime.validate()?;
        let host = self.host.unwrap_or_else(|| self.runtime.host.clone());
        let address = Address::new(Scheme::Graph, host, [self.name.as_str()])?;

        let supervisor = Actor::new(
            address.clone(),
            from_fn(|signal: SupervisorSignal, _: &ActorContext<'_, (), SupervisorSignal>| {
                match signal {}
            }),
            (),
            ActorOptions::from_config(&self.runtime),
        )?;

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let book = Arc::new(AddressBook::new());
        let core = Arc::new(GraphCore {
            name: self.name.clone(),
            state: SharedState::new(state, self.state_channel_capacity),
            config,
            book: Arc::clone(&book),
            completions: completions_tx,
        });

        let mut node_options = ActorOptions::from_config(&self.runtime).with_address_book(book);
        node_options.on_failure = self.on_failure.clone();

        info!(graph = %self.name, address = %address, "Graph created");
        Ok(Graph {
            core,
            address,
            supervisor,
            runtime: self.runtime,
            node_options,
            on_failure: self.on_failure,
            max_iterations: self.max_iterations,
            root: Mutex::new(None),
            completions: Mutex::new(Some(completions_rx)),
        })
    }
}

/// A workflow graph of named nodes sharing one state and configuration
pub struct Graph<S: GraphState, C: GraphConfig> {
    core: Arc<GraphCore<S, C>>,
    address: Address,
    supervisor: Actor<(), SupervisorSignal>,
    runtime: RuntimeConfig,
    node_options: ActorOptions<NodeMessage>,
    on_failure: Option<FailureHook>,
    max_iterations: Option<u64>,
    root: Mutex<Option<Address>>,
    completions: Mutex<Option<mpsc::UnboundedReceiver<Completion>>>,
}

impl<S: GraphState, C: GraphConfig> Graph<S, C> {
    /// Graph with default runtime settings
    pub fn new(name: impl Into<String>, state: S, config: C) -> Result<Self> {
        GraphBuilder::new(name).build(state, config)
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Address of the graph supervisor
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Validate the node name and reserve its address under the supervisor
    fn node_address(&self, name: &str) -> Result<Address> {
        let address = self.address.child(name)?;
        if self.supervisor.child(&address).is_some() {
            return Err(ActorError::ChildAlreadyRegistered { address }.into());
        }
        Ok(address)
    }

    /// Attach a freshly built actor to the supervisor, stopping it on failure
    async fn adopt(&self, child: Arc<dyn Supervised>) -> Result<()> {
        if let Err(e) = self.supervisor.append_supervised(Arc::clone(&child)) {
            warn!(graph = %self.core.name, node = %child.address(), error = %e, "Failed to attach node");
            if let Ok(signal) = child.stop().await {
                signal.wait().await;
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn add_node(&self, name: &str, kind: NodeKind, behavior: Behavior<S, C>) -> Result<Node> {
        let address = self.node_address(name)?;
        let routes = Arc::new(RwLock::new(RouteTable::new(name, kind.route_policy())));
        let processor = NodeProcessor::new(
            name.to_string(),
            behavior,
            Arc::clone(&routes),
            Arc::clone(&self.core),
        );

        let mut options = self.node_options.clone();
        if kind == NodeKind::Join {
            // Barrier memory must survive every arrival
            options = options.non_transient();
        }
        let actor = Actor::new(address, processor, NodeMemory::default(), options)?;
        self.adopt(Arc::new(actor.clone())).await?;

        info!(graph = %self.core.name, node = name, kind = %kind, "Node added");
        Ok(Node::new(name.to_string(), kind, actor, routes))
    }

    /// Sole entry point of the graph
    pub async fn root(&self, name: &str) -> Result<Node> {
        if self.root.lock().is_some() {
            return Err(GraphError::RootAlreadyDefined {
                graph: self.core.name.clone(),
            });
        }
        let node = self.add_node(name, NodeKind::Root, Behavior::Root).await?;

        // Another root may have been added while this one was being built
        let raced = {
            let mut root = self.root.lock();
            if root.is_some() {
                true
            } else {
                *root = Some(node.address().clone());
                false
            }
        };
        if raced {
            if let Err(e) = self.supervisor.crop(node.address()).await {
                warn!(
                    graph = %self.core.name,
                    node = %node.address(),
                    error = %e,
                    "Failed to remove duplicate root"
                );
            }
            return Err(GraphError::RootAlreadyDefined {
                graph: self.core.name.clone(),
            });
        }
        Ok(node)
    }

    /// Terminal node emitting on the completion channel
    pub async fn end(&self, name: &str) -> Result<Node> {
        self.add_node(name, NodeKind::End, Behavior::End).await
    }

    /// Pass-through node logging each unit of work
    pub async fn debug(&self, name: &str) -> Result<Node> {
        self.add_node(name, NodeKind::Debug, Behavior::Debug).await
    }

    /// User logic node guarded by the graph default iteration limit, if any
    pub async fn custom(&self, name: &str, logic: impl NodeLogic<S, C>) -> Result<Node> {
        let behavior = Behavior::Custom {
            logic: Arc::new(logic),
            max_iterations: self.max_iterations,
        };
        self.add_node(name, NodeKind::Custom, behavior).await
    }

    /// User logic node failing a traversal after `max_iterations` consecutive
    /// self-routes
    pub async fn custom_with_guard(
        &self,
        name: &str,
        logic: impl NodeLogic<S, C>,
        max_iterations: u64,
    ) -> Result<Node> {
        let behavior = Behavior::Custom {
            logic: Arc::new(logic),
            max_iterations: Some(max_iterations),
        };
        self.add_node(name, NodeKind::Custom, behavior).await
    }

    /// Dispatches each unit of work to every registered route
    pub async fn fork(&self, name: &str) -> Result<Node> {
        self.add_node(name, NodeKind::Fork, Behavior::Fork).await
    }

    /// Barrier paired with `fork`, firing on its single route once every
    /// branch has arrived
    pub async fn join(&self, name: &str, fork: &Node) -> Result<Node> {
        if fork.kind() != NodeKind::Fork {
            return Err(GraphError::routing_invalid(
                name,
                format!("join must pair with a fork node, '{}' is {}", fork.name(), fork.kind()),
            ));
        }
        let behavior = Behavior::Join {
            fork: fork.address().clone(),
        };
        self.add_node(name, NodeKind::Join, behavior).await
    }

    /// Runs `branches` concurrently and leaves on `outcome` once all finish
    pub async fn parallel(
        &self,
        name: &str,
        outcome: &str,
        branches: Vec<Branch<S, C>>,
    ) -> Result<Node> {
        if branches.is_empty() {
            return Err(GraphError::routing_invalid(name, "parallel node needs branches"));
        }
        let behavior = Behavior::Parallel {
            branches,
            outcome: outcome.to_string(),
        };
        self.add_node(name, NodeKind::Parallel, behavior).await
    }

    /// Responder serving the configuration snapshot
    pub async fn config_node(
        &self,
        name: &str,
        book: Arc<AddressBook<ConfigMessage>>,
    ) -> Result<ConfigNode> {
        let address = self.node_address(name)?;
        let entries = config_node::snapshot(&self.core.config)?;
        let node = ConfigNode::spawn(name, address, entries, self.responder_options(book))?;
        self.adopt(Arc::new(node.actor().clone())).await?;
        Ok(node)
    }

    /// Responder holding a typed, replaceable value
    pub async fn status_node<T: ActorState>(
        &self,
        name: &str,
        initial: T,
        book: Arc<AddressBook<StatusMessage<T>>>,
    ) -> Result<StatusNode<T>> {
        let address = self.node_address(name)?;
        let node = StatusNode::spawn(name, address, initial, self.responder_options(book))?;
        self.adopt(Arc::new(node.actor().clone())).await?;
        Ok(node)
    }

    fn responder_options<M: Message>(&self, book: Arc<AddressBook<M>>) -> ActorOptions<M> {
        let mut options = ActorOptions::from_config(&self.runtime).with_address_book(book);
        options.on_failure = self.on_failure.clone();
        options
    }

    /// Inject a unit of work at the root, returning its traversal id
    pub async fn start(&self, payload: Value) -> Result<Uuid> {
        let root = self.root.lock().clone().ok_or_else(|| GraphError::NoRoot {
            graph: self.core.name.clone(),
        })?;
        let traversal = Uuid::new_v4();
        self.core
            .book
            .deliver(&root, NodeMessage::new(self.address.clone(), traversal, payload))
            .await?;
        Ok(traversal)
    }

    /// Receiver of End-node completions; available once
    pub fn take_completions(&self) -> Option<mpsc::UnboundedReceiver<Completion>> {
        self.completions.lock().take()
    }

    /// Stream of full state snapshots, one per successful merge
    pub fn subscribe(&self) -> broadcast::Receiver<S> {
        self.core.state.subscribe()
    }

    pub fn state(&self) -> S {
        self.core.state.snapshot()
    }

    /// Merge from outside any node
    pub fn merge_change(&self, purpose: &str, change: S::Change) -> Result<()> {
        self.core.state.merge(purpose, change)
    }

    pub fn config(&self) -> &C {
        &self.core.config
    }

    /// Addresses of all live traversal nodes
    pub fn nodes(&self) -> Vec<Address> {
        self.core.book.addresses()
    }

    /// Stop every node and the supervisor
    pub async fn shutdown(&self) -> Result<()> {
        info!(graph = %self.core.name, "Shutting down graph");
        self.supervisor.stop().await?.wait().await;
        Ok(())
    }
}
