//! Actor Runtime
//!
//! Lightweight actor runtime on Tokio. Every actor owns a bounded mailbox, a
//! private state value and a processing function, and runs its own consumption
//! loop task.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  deliver   ┌───────────────────┐   process   ┌────────────┐
//! │ AddressBook  │──────────► │ Mailbox           │ ──────────► │ Processor  │
//! │ addr → actor │            │ Block / FailFast  │             │ (msg, ctx) │
//! └──────────────┘            │ DropNewest/Oldest │             └─────┬──────┘
//!                             └───────────────────┘                   │
//!                                                 commit if mutating  ▼
//!                                                 or non-transient  state
//! ```
//!
//! Actors form a supervision tree keyed by address: a child lives exactly one
//! path segment below its parent (`actor://host/a` → `actor://host/a/b`).
//! Stopping a parent stops its children depth-first before the parent drains.
//!
//! # Example
//!
//! ```rust,no_run
//! use actor_runtime::{from_fn, Actor, ActorContext, ActorOptions, Envelope};
//!
//! # async fn demo() -> actor_runtime::Result<()> {
//! let counter = Actor::new(
//!     "actor://localhost/counter".parse()?,
//!     from_fn(|msg: Envelope<u64>, ctx: &ActorContext<'_, u64, Envelope<u64>>| {
//!         Ok(ctx.state() + msg.payload())
//!     }),
//!     0,
//!     ActorOptions::default(),
//! )?;
//!
//! counter
//!     .deliver(Envelope::mutating("actor://localhost/client".parse()?, 5))
//!     .await?;
//! counter.stop().await?.wait().await;
//! assert_eq!(counter.state(), 5);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod messages;
pub mod registry;
pub mod supervision;
pub mod system;

pub use address::{Address, Scheme};
pub use config::{BackpressurePolicy, MailboxConfig, RuntimeConfig};
pub use error::{ActorError, Result};
pub use mailbox::{Admission, DeliveryOutcome, Mailbox, MailboxSnapshot, MailboxStats};
pub use messages::{Envelope, Message};
pub use registry::{AddressBook, Endpoint};
pub use supervision::{ActorStatus, Addressable, ParentRef, StopSignal, Supervised};
pub use system::{
    from_fn, Actor, ActorContext, ActorMetrics, ActorOptions, ActorState, ActorStats,
    FailureHook, FnProcessor, Processor,
};
