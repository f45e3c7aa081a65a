//! Fork/Join Barrier
//!
//! A fork stamps every branch with a shared ticket id and the dispatch width.
//! The paired join keeps one barrier per open ticket in its actor memory and
//! fires once every branch has arrived, whatever the arrival order.

use crate::error::{GraphError, Result};
use crate::message::ForkTicket;
use actor_runtime::Address;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Arrivals collected for one fork dispatch
#[derive(Debug, Clone, Default)]
struct Barrier {
    width: usize,
    arrivals: BTreeMap<String, Value>,
}

/// Per-node actor memory; only join nodes ever populate it
#[derive(Debug, Clone, Default)]
pub struct NodeMemory {
    barriers: HashMap<Uuid, Barrier>,
}

impl NodeMemory {
    /// Number of fork dispatches still waiting for branches
    pub fn open_barriers(&self) -> usize {
        self.barriers.len()
    }

    /// Record one branch arrival. Returns the merged branch payloads once the
    /// barrier is complete; a repeated branch replaces its earlier payload.
    pub(crate) fn arrive(
        &mut self,
        join: &str,
        expected_fork: &Address,
        ticket: ForkTicket,
        payload: Value,
    ) -> Result<Option<Value>> {
        if &ticket.fork != expected_fork {
            return Err(GraphError::ForkMismatch {
                join: join.to_string(),
                expected: expected_fork.clone(),
                found: ticket.fork,
            });
        }

        let barrier = self.barriers.entry(ticket.id).or_insert_with(|| Barrier {
            width: ticket.width,
            arrivals: BTreeMap::new(),
        });
        barrier.arrivals.insert(ticket.branch, payload);

        if barrier.arrivals.len() < barrier.width {
            return Ok(None);
        }
        let complete = self.barriers.remove(&ticket.id).unwrap_or_default();
        Ok(Some(merge_branches(complete.arrivals)))
    }
}

/// JSON object mapping branch name to branch payload
pub(crate) fn merge_branches<I>(branches: I) -> Value
where
    I: IntoIterator<Item = (String, Value)>,
{
    Value::Object(branches.into_iter().collect::<Map<String, Value>>())
}
