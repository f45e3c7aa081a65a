//! Traversal Messages
//!
//! A unit of work travels between nodes as a [`NodeMessage`]. It carries a
//! JSON payload, the traversal id assigned by `Graph::start`, the stack of
//! open fork tickets and the count of consecutive self-routes.

use actor_runtime::{Address, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Marks work dispatched by a fork so the paired join can count arrivals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkTicket {
    /// Address of the dispatching fork node
    pub fork: Address,
    /// One id per fork dispatch, shared by all its branches
    pub id: Uuid,
    /// Route name the branch was dispatched on
    pub branch: String,
    /// Number of branches in this dispatch
    pub width: usize,
}

#[derive(Debug, Clone)]
pub struct NodeMessage {
    sender: Address,
    traversal: Uuid,
    payload: Value,
    tickets: Vec<ForkTicket>,
    iteration: u64,
}

impl NodeMessage {
    /// Fresh traversal entering the graph
    pub fn new(sender: Address, traversal: Uuid, payload: Value) -> Self {
        Self {
            sender,
            traversal,
            payload,
            tickets: Vec::new(),
            iteration: 0,
        }
    }

    pub fn traversal(&self) -> Uuid {
        self.traversal
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn tickets(&self) -> &[ForkTicket] {
        &self.tickets
    }

    /// Consecutive self-routes taken so far
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// The next hop of this traversal, sent by `from`
    pub(crate) fn hop(&self, from: &Address, payload: Value, iteration: u64) -> Self {
        Self {
            sender: from.clone(),
            traversal: self.traversal,
            payload,
            tickets: self.tickets.clone(),
            iteration,
        }
    }

    pub(crate) fn push_ticket(&mut self, ticket: ForkTicket) {
        self.tickets.push(ticket);
    }

    pub(crate) fn pop_ticket(&mut self) -> Option<ForkTicket> {
        self.tickets.pop()
    }
}

impl Message for NodeMessage {
    fn sender(&self) -> &Address {
        &self.sender
    }

    /// Traversal never replaces node memory; the join node commits its
    /// barrier because it is non-transient
    fn mutation(&self) -> bool {
        false
    }
}

/// Emitted when a traversal reaches an End node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Name of the End node reached
    pub end: String,
    pub traversal: Uuid,
    pub payload: Value,
}
