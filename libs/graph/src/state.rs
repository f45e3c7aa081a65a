//! Graph State
//!
//! One mutable value shared by every node of a graph. Nodes never write fields
//! directly: they hand a change to [`GraphState::merge_change`], which runs
//! under a single lock so concurrent fork branches serialize their updates.
//! Each successful merge publishes a full snapshot on a broadcast stream.

use crate::error::Result;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Graph-wide mutable state
pub trait GraphState: Clone + Send + Sync + 'static {
    /// Unit of change accepted by the merge operation
    type Change: Send + 'static;

    /// Apply `change`. `purpose` names the update for diagnostics and lets one
    /// change type drive several merge strategies.
    fn merge_change(&mut self, purpose: &str, change: Self::Change) -> Result<()>;
}

/// Immutable graph configuration; serialized to feed Config nodes
pub trait GraphConfig: Serialize + Send + Sync + 'static {}

impl<T: Serialize + Send + Sync + 'static> GraphConfig for T {}

/// Lock-guarded state plus its change stream
pub(crate) struct SharedState<S: GraphState> {
    state: Mutex<S>,
    changes: broadcast::Sender<S>,
}

impl<S: GraphState> SharedState<S> {
    pub(crate) fn new(initial: S, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(initial),
            changes,
        }
    }

    /// Merge atomically: a rejected change leaves the state untouched
    pub(crate) fn merge(&self, purpose: &str, change: S::Change) -> Result<()> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        if let Err(e) = next.merge_change(purpose, change) {
            warn!(purpose, error = %e, "State merge rejected");
            return Err(e);
        }
        *state = next;

        // Published under the lock so subscribers see merges in commit order
        let receivers = self.changes.send(state.clone()).unwrap_or(0);
        debug!(purpose, receivers, "State merged");
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> S {
        self.state.lock().clone()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<S> {
        self.changes.subscribe()
    }
}
