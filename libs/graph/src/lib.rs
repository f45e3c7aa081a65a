//! Graph Engine
//!
//! Directed, possibly cyclic workflow graphs whose nodes are actors of the
//! `actor_runtime` crate. A unit of work enters at the Root node and travels
//! along named routes chosen by each node, hop by hop through the nodes'
//! mailboxes, until it reaches an End node.
//!
//! # Node kinds
//!
//! | Kind | Routes | Behavior |
//! |------|--------|----------|
//! | Root | one | entry point, forwards the injected payload |
//! | Debug | one | logs the unit of work and passes it on |
//! | End | none | emits a [`Completion`] |
//! | Custom | any | runs [`NodeLogic`], follows the returned [`Outcome`] |
//! | Fork | any | dispatches to every route with a fork ticket |
//! | Join | one | waits for every branch of its fork, then fires |
//! | Parallel | any | runs embedded branches concurrently, then fires |
//! | Config / Status | none | terminal responders on their own protocols |
//!
//! # Example
//!
//! ```rust,no_run
//! use graph_engine::{node_fn, Graph, GraphState, NodeScope, Outcome};
//! use serde_json::json;
//!
//! #[derive(Clone, Default)]
//! struct Counter(u64);
//!
//! impl GraphState for Counter {
//!     type Change = u64;
//!     fn merge_change(&mut self, _: &str, by: u64) -> graph_engine::Result<()> {
//!         self.0 += by;
//!         Ok(())
//!     }
//! }
//!
//! # async fn demo() -> graph_engine::Result<()> {
//! let graph = Graph::new("count", Counter::default(), json!({"target": 3}))?;
//! let root = graph.root("root").await?;
//! let step = graph
//!     .custom("step", node_fn(|scope: &NodeScope<'_, Counter, serde_json::Value>| {
//!         if scope.state().0 < 3 {
//!             scope.merge_change("increment", 1)?;
//!             return Ok(Outcome::route("iterate"));
//!         }
//!         Ok(Outcome::route("complete"))
//!     }))
//!     .await?;
//! let end = graph.end("end").await?;
//!
//! root.one_way_route("next", &step)?;
//! step.one_way_route("iterate", &step)?;
//! step.one_way_route("complete", &end)?;
//!
//! let mut done = graph.take_completions().expect("first take");
//! graph.start(json!(null)).await?;
//! done.recv().await;
//! assert_eq!(graph.state().0, 3);
//! # Ok(())
//! # }
//! ```

pub mod config_node;
pub mod error;
pub mod fork;
pub mod graph;
pub mod message;
pub mod node;
pub mod route;
pub mod state;
pub mod status_node;

pub use config_node::{ConfigMessage, ConfigNode, ConfigPayload};
pub use error::{GraphError, Result};
pub use fork::NodeMemory;
pub use graph::{Graph, GraphBuilder, DEFAULT_STATE_CHANNEL_CAPACITY};
pub use message::{Completion, ForkTicket, NodeMessage};
pub use node::{node_fn, Branch, FnLogic, Node, NodeKind, NodeLogic, NodeScope, Outcome};
pub use route::{RoutePolicy, RouteTable};
pub use state::{GraphConfig, GraphState};
pub use status_node::{StatusMessage, StatusNode};
