//! Common Test Utilities for the Graph Engine
//!
//! Shared workflow state, configuration and completion helpers.

#![allow(dead_code)]

use actor_runtime::ActorError;
use graph_engine::{Completion, GraphError, GraphState};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Shared state of the test workflows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    pub counter: u64,
    pub markers: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Change {
    Increment,
    Marker(String),
}

impl GraphState for Workflow {
    type Change = Change;

    fn merge_change(&mut self, purpose: &str, change: Change) -> graph_engine::Result<()> {
        match change {
            Change::Increment => self.counter += 1,
            Change::Marker(marker) if marker.is_empty() => {
                return Err(GraphError::merge(purpose, "empty marker"))
            }
            Change::Marker(marker) => self.markers.push(marker),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub target: u64,
    pub label: String,
}

impl Settings {
    pub fn with_target(target: u64) -> Self {
        Self {
            target,
            label: "test-workflow".to_string(),
        }
    }
}

/// Collects the graph errors behind node processing failures
#[derive(Clone, Default)]
pub struct FailureLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl FailureLog {
    pub fn hook(&self) -> impl Fn(&ActorError) + Send + Sync + 'static {
        let entries = Arc::clone(&self.entries);
        move |err: &ActorError| {
            let description = match GraphError::from_processing(err) {
                Some(GraphError::IterationLimit { .. }) => "iteration_limit".to_string(),
                Some(GraphError::ForkMismatch { .. }) => "fork_mismatch".to_string(),
                Some(GraphError::UnknownRoute { .. }) => "unknown_route".to_string(),
                Some(GraphError::AmbiguousRoute { .. }) => "ambiguous_route".to_string(),
                Some(GraphError::UnexpectedMessage { .. }) => "unexpected_message".to_string(),
                Some(other) => other.to_string(),
                None => err.to_string(),
            };
            entries.lock().push(description);
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

pub async fn next_completion(rx: &mut UnboundedReceiver<Completion>) -> Completion {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no completion within 5s")
        .expect("completion channel closed")
}

/// Fail if anything reaches an End node within `wait`
pub async fn assert_no_completion(rx: &mut UnboundedReceiver<Completion>, wait: Duration) {
    if let Ok(Some(extra)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected completion: {:?}", extra);
    }
}

/// Poll until `check` holds or fail after five seconds
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
