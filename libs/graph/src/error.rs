//! Graph Engine Error Types
//!
//! Routing-configuration and construction failures are returned to the caller.
//! Failures raised while a traversal is in flight (unknown route, fork
//! mismatch, iteration limit) surface as actor processing failures of the node
//! that hit them and end that traversal.

use actor_runtime::{ActorError, Address};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    /// Error from the underlying actor runtime
    #[error(transparent)]
    Actor(#[from] ActorError),

    /// Route registration refused by the node kind
    #[error("Invalid routing on node '{node}': {reason}")]
    RoutingInvalid { node: String, reason: String },

    /// Outcome named a route the node does not have
    #[error("Node '{node}' has no route named '{route}'")]
    UnknownRoute { node: String, route: String },

    /// A single outgoing route was required
    #[error("Node '{node}' needs exactly one outgoing route, found {count}")]
    AmbiguousRoute { node: String, count: usize },

    /// Join received work dispatched by a different fork
    #[error("Join '{join}' expects fork {expected}, got {found}")]
    ForkMismatch {
        join: String,
        expected: Address,
        found: Address,
    },

    /// Self-routing exceeded the node's guard
    #[error("Node '{node}' exceeded {limit} consecutive iterations")]
    IterationLimit { node: String, limit: u64 },

    /// State merge operation rejected the change
    #[error("Merge '{purpose}' failed: {reason}")]
    Merge { purpose: String, reason: String },

    #[error("Graph '{graph}' already has a root node")]
    RootAlreadyDefined { graph: String },

    #[error("Graph '{graph}' has no root node")]
    NoRoot { graph: String },

    /// Message variant the receiving node does not accept
    #[error("Node '{node}' cannot handle {kind} messages")]
    UnexpectedMessage { node: String, kind: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    pub fn routing_invalid(node: &str, reason: impl Into<String>) -> Self {
        Self::RoutingInvalid {
            node: node.to_string(),
            reason: reason.into(),
        }
    }

    pub fn merge(purpose: &str, reason: impl Into<String>) -> Self {
        Self::Merge {
            purpose: purpose.to_string(),
            reason: reason.into(),
        }
    }

    /// Find the graph error behind an actor processing failure, if any
    pub fn from_processing(err: &ActorError) -> Option<&GraphError> {
        match err {
            ActorError::ProcessingFailure { source, .. } => source.downcast_ref::<GraphError>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_failure_unwraps_to_graph_error() {
        let address: Address = "graph://localhost/g/loop".parse().unwrap();
        let err = ActorError::processing(
            &address,
            anyhow::Error::new(GraphError::IterationLimit {
                node: "loop".into(),
                limit: 3,
            }),
        );

        assert!(matches!(
            GraphError::from_processing(&err),
            Some(GraphError::IterationLimit { limit: 3, .. })
        ));
        assert!(GraphError::from_processing(&ActorError::not_running(&address)).is_none());
    }

    #[test]
    fn test_actor_errors_convert() {
        let address: Address = "graph://localhost/g".parse().unwrap();
        let err: GraphError = ActorError::not_running(&address).into();
        assert_eq!(err.to_string(), "Actor graph://localhost/g is not running");
    }
}
