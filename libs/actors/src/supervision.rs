//! Supervision Primitives
//!
//! Parents own their children through type-erased [`Supervised`] handles kept
//! in a child map. Children only hold a weak [`ParentRef`] back to their
//! parent: enough to look it up, never enough to keep it alive or mutate it.

use crate::address::Address;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Weak;
use tokio::sync::watch;

/// Actor lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActorStatus {
    /// Consumption loop active, deliveries accepted
    Running = 0,
    /// Stop requested; children torn down, queued messages drained
    Draining = 1,
    /// Terminal
    Idle = 2,
}

impl ActorStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ActorStatus::Running,
            1 => ActorStatus::Draining,
            _ => ActorStatus::Idle,
        }
    }
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActorStatus::Running => "running",
            ActorStatus::Draining => "draining",
            ActorStatus::Idle => "idle",
        };
        f.write_str(s)
    }
}

/// Anything with an address and a lifecycle
pub trait Addressable: Send + Sync {
    fn address(&self) -> &Address;

    fn status(&self) -> ActorStatus;

    fn is_running(&self) -> bool {
        self.status() == ActorStatus::Running
    }
}

/// Type-erased lifecycle handle a parent keeps for each child
#[async_trait]
pub trait Supervised: Addressable {
    /// Begin teardown. Fails with `ActorNotRunning` if not Running and with
    /// `SupervisedChild` while a parent is attached; parents detach first.
    async fn stop(&self) -> Result<StopSignal>;

    /// Completion signal, observable without requesting a stop
    fn stopped(&self) -> StopSignal;

    /// Record the parent; fails if a parent is already attached
    fn attach_parent(&self, parent: ParentRef) -> Result<()>;

    fn detach_parent(&self);
}

/// Weak lookup capability from a child to its parent
#[derive(Clone)]
pub struct ParentRef {
    address: Address,
    handle: Weak<dyn Addressable>,
}

impl ParentRef {
    pub(crate) fn new(address: Address, handle: Weak<dyn Addressable>) -> Self {
        Self { address, handle }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Current parent status, None once the parent has been dropped
    pub fn status(&self) -> Option<ActorStatus> {
        self.handle.upgrade().map(|parent| parent.status())
    }
}

impl fmt::Debug for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentRef")
            .field("address", &self.address)
            .field("status", &self.status())
            .finish()
    }
}

/// Fires once when an actor reaches Idle
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Wait until the actor is Idle
    pub async fn wait(mut self) {
        // A dropped sender means the loop is gone, which is as final as Idle
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    pub fn is_complete(&self) -> bool {
        *self.rx.borrow()
    }
}
