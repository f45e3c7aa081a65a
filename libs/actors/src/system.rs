//! Actor Core
//!
//! An [`Actor`] owns one mailbox, one state value and one processing function.
//! Construction spawns its consumption loop immediately, so a new actor is
//! Running. The loop processes one message at a time:
//!
//! ```text
//!   Running ──stop()──► Draining ──queue empty or grace elapsed──► Idle
//!      │                   │
//!      │ children stopped  │ queued messages still processed
//!      │ depth-first first │ (same commit rule)
//! ```
//!
//! # Commit rule
//!
//! The value returned by the processing function replaces the actor state only
//! if the message is mutating or the actor is non-transient. Failures are
//! logged and reported to the failure hook; the actor keeps running.
//!
//! # Lock discipline
//!
//! `children`, `parent` and the published state snapshot are guarded by
//! `parking_lot` locks that are never held across an `.await`.

use crate::address::Address;
use crate::config::{MailboxConfig, RuntimeConfig};
use crate::error::{ActorError, Result};
use crate::mailbox::{DeliveryOutcome, Mailbox, MailboxSnapshot};
use crate::messages::Message;
use crate::registry::{AddressBook, Endpoint};
use crate::supervision::{ActorStatus, Addressable, ParentRef, StopSignal, Supervised};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bounds every actor state satisfies
pub trait ActorState: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> ActorState for T {}

/// Observer invoked with every processing failure
pub type FailureHook = Arc<dyn Fn(&ActorError) + Send + Sync>;

/// Processing function of an actor
#[async_trait]
pub trait Processor<S: ActorState, M: Message>: Send + Sync + 'static {
    /// Compute the next state for `message`. Whether it is committed is decided
    /// by the consumption loop, not by the processor.
    async fn process(&self, message: M, ctx: &ActorContext<'_, S, M>) -> anyhow::Result<S>;
}

/// Adapter turning a synchronous closure into a [`Processor`]
pub struct FnProcessor<F, S, M> {
    f: F,
    _marker: PhantomData<fn() -> (S, M)>,
}

/// Build a processor from `Fn(message, ctx) -> anyhow::Result<state>`
pub fn from_fn<S, M, F>(f: F) -> FnProcessor<F, S, M>
where
    S: ActorState,
    M: Message,
    F: Fn(M, &ActorContext<'_, S, M>) -> anyhow::Result<S> + Send + Sync + 'static,
{
    FnProcessor {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<S, M, F> Processor<S, M> for FnProcessor<F, S, M>
where
    S: ActorState,
    M: Message,
    F: Fn(M, &ActorContext<'_, S, M>) -> anyhow::Result<S> + Send + Sync + 'static,
{
    async fn process(&self, message: M, ctx: &ActorContext<'_, S, M>) -> anyhow::Result<S> {
        (self.f)(message, ctx)
    }
}

/// The actor's view of itself while processing a message
pub struct ActorContext<'a, S: ActorState, M: Message> {
    actor: &'a Actor<S, M>,
    state: &'a S,
}

impl<'a, S: ActorState, M: Message> ActorContext<'a, S, M> {
    pub fn address(&self) -> &Address {
        self.actor.address()
    }

    /// State as of the start of this message
    pub fn state(&self) -> &S {
        self.state
    }

    /// Handle to this actor, for spawning children or self-delivery
    pub fn actor(&self) -> &Actor<S, M> {
        self.actor
    }

    pub fn parent(&self) -> Option<ParentRef> {
        self.actor.parent()
    }

    /// Deliver to another actor resolved through this actor's address book
    pub async fn send(&self, msg: M, destination: &Address) -> Result<DeliveryOutcome> {
        self.actor.send(msg, destination).await
    }

    /// Report a failure like a processing error would, while the result of
    /// this message is still returned and committed normally
    pub fn report_failure(&self, source: anyhow::Error) {
        self.actor.inner.report_failure(source);
    }
}

/// Per-actor construction options
pub struct ActorOptions<M: Message> {
    pub mailbox: MailboxConfig,
    /// Transient actors only commit results of mutating messages
    pub transient: bool,
    pub drain_grace: Duration,
    pub address_book: Option<Arc<AddressBook<M>>>,
    pub on_failure: Option<FailureHook>,
}

impl<M: Message> ActorOptions<M> {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            mailbox: config.mailbox,
            transient: true,
            drain_grace: config.drain_grace(),
            address_book: None,
            on_failure: None,
        }
    }

    pub fn with_mailbox(mut self, mailbox: MailboxConfig) -> Self {
        self.mailbox = mailbox;
        self
    }

    /// Commit every processing result regardless of the mutation flag
    pub fn non_transient(mut self) -> Self {
        self.transient = false;
        self
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn with_address_book(mut self, book: Arc<AddressBook<M>>) -> Self {
        self.address_book = Some(book);
        self
    }

    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActorError) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }
}

impl<M: Message> Default for ActorOptions<M> {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl<M: Message> Clone for ActorOptions<M> {
    fn clone(&self) -> Self {
        Self {
            mailbox: self.mailbox,
            transient: self.transient,
            drain_grace: self.drain_grace,
            address_book: self.address_book.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

/// Per-actor processing counters
#[derive(Debug, Default)]
pub struct ActorMetrics {
    pub messages_processed: AtomicU64,
    pub processing_failures: AtomicU64,
    pub state_commits: AtomicU64,
    pub discarded_results: AtomicU64,
    pub total_processing_time_ns: AtomicU64,
}

impl ActorMetrics {
    fn record_processed(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_processing_time_ns.load(Ordering::Relaxed) as f64 / count as f64
    }

    pub fn snapshot(&self) -> ActorStats {
        ActorStats {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            processing_failures: self.processing_failures.load(Ordering::Relaxed),
            state_commits: self.state_commits.load(Ordering::Relaxed),
            discarded_results: self.discarded_results.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
        }
    }
}

/// Point-in-time copy of [`ActorMetrics`]
#[derive(Debug, Clone)]
pub struct ActorStats {
    pub messages_processed: u64,
    pub processing_failures: u64,
    pub state_commits: u64,
    pub discarded_results: u64,
    pub avg_processing_time_ns: f64,
}

struct ActorInner<S: ActorState, M: Message> {
    address: Address,
    status: AtomicU8,
    transient: bool,
    drain_grace: Duration,
    mailbox: Mailbox<M>,
    /// Snapshot published by the loop after every commit
    state: RwLock<S>,
    token: CancellationToken,
    stopped: watch::Receiver<bool>,
    parent: RwLock<Option<ParentRef>>,
    children: Mutex<HashMap<Address, Arc<dyn Supervised>>>,
    address_book: Option<Arc<AddressBook<M>>>,
    on_failure: Option<FailureHook>,
    metrics: ActorMetrics,
}

impl<S: ActorState, M: Message> ActorInner<S, M> {
    fn load_status(&self) -> ActorStatus {
        ActorStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: ActorStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Count and log a processing failure, then hand it to the failure hook
    fn report_failure(&self, source: anyhow::Error) {
        let err = ActorError::processing(&self.address, source);
        self.metrics.processing_failures.fetch_add(1, Ordering::Relaxed);
        error!(
            actor = %self.address,
            error = %err,
            error_category = err.category(),
            "Actor message processing failed"
        );
        if let Some(hook) = &self.on_failure {
            hook(&err);
        }
    }
}

impl<S: ActorState, M: Message> Addressable for ActorInner<S, M> {
    fn address(&self) -> &Address {
        &self.address
    }

    fn status(&self) -> ActorStatus {
        self.load_status()
    }
}

/// Cheaply cloneable handle to a running (or stopped) actor
pub struct Actor<S: ActorState, M: Message> {
    inner: Arc<ActorInner<S, M>>,
}

impl<S: ActorState, M: Message> Actor<S, M> {
    /// Create an actor and start its consumption loop.
    ///
    /// Must be called from within a Tokio runtime. If `options` carries an
    /// address book the actor registers itself before the loop starts.
    pub fn new<P>(address: Address, processor: P, initial_state: S, options: ActorOptions<M>) -> Result<Self>
    where
        P: Processor<S, M>,
    {
        options.mailbox.validate()?;

        let (stopped_tx, stopped_rx) = watch::channel(false);
        let inner = Arc::new(ActorInner {
            mailbox: Mailbox::new(address.clone(), options.mailbox),
            address,
            status: AtomicU8::new(ActorStatus::Running as u8),
            transient: options.transient,
            drain_grace: options.drain_grace,
            state: RwLock::new(initial_state.clone()),
            token: CancellationToken::new(),
            stopped: stopped_rx,
            parent: RwLock::new(None),
            children: Mutex::new(HashMap::new()),
            address_book: options.address_book,
            on_failure: options.on_failure,
            metrics: ActorMetrics::default(),
        });
        let actor = Self { inner };

        if let Some(book) = &actor.inner.address_book {
            book.register(Arc::new(actor.clone()))?;
        }

        let task = ActorTask {
            actor: actor.clone(),
            processor: Box::new(processor),
            state: initial_state,
            stopped: stopped_tx,
        };
        tokio::spawn(task.run());

        info!(
            actor = %actor.inner.address,
            capacity = options.mailbox.capacity,
            policy = ?options.mailbox.policy,
            transient = actor.inner.transient,
            "Actor started"
        );
        Ok(actor)
    }

    pub fn address(&self) -> &Address {
        &self.inner.address
    }

    pub fn status(&self) -> ActorStatus {
        self.inner.load_status()
    }

    pub fn is_running(&self) -> bool {
        self.status() == ActorStatus::Running
    }

    /// Last committed state
    pub fn state(&self) -> S {
        self.inner.state.read().clone()
    }

    /// Enqueue a message, applying the mailbox backpressure policy
    pub async fn deliver(&self, msg: M) -> Result<DeliveryOutcome> {
        if self.status() != ActorStatus::Running {
            return Err(ActorError::not_running(&self.inner.address));
        }
        self.inner.mailbox.push(msg).await
    }

    /// Deliver to another actor resolved through this actor's address book
    pub async fn send(&self, msg: M, destination: &Address) -> Result<DeliveryOutcome> {
        match &self.inner.address_book {
            Some(book) => book.deliver(destination, msg).await,
            None => Err(ActorError::UnknownAddress {
                address: destination.clone(),
            }),
        }
    }

    /// Begin teardown: stop children depth-first, then drain and go Idle.
    /// Not idempotent: a second call fails with `ActorNotRunning`. An actor
    /// attached to a parent refuses with `SupervisedChild`; use the parent's
    /// [`Actor::crop`].
    pub async fn stop(&self) -> Result<StopSignal> {
        Supervised::stop(self).await
    }

    pub fn stopped(&self) -> StopSignal {
        StopSignal::new(self.inner.stopped.clone())
    }

    pub fn parent(&self) -> Option<ParentRef> {
        self.inner.parent.read().clone()
    }

    /// Running -> Draining, refused while a parent is attached. The parent
    /// slot stays read-locked so no parent can attach in between.
    fn begin_draining(&self) -> Result<()> {
        let parent = self.inner.parent.read();
        if let Some(parent) = parent.as_ref() {
            return Err(ActorError::SupervisedChild {
                address: self.inner.address.clone(),
                parent: parent.address().clone(),
            });
        }
        self.inner
            .status
            .compare_exchange(
                ActorStatus::Running as u8,
                ActorStatus::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| ActorError::not_running(&self.inner.address))
    }

    fn parent_ref(&self) -> ParentRef {
        let handle: Weak<dyn Addressable> = Arc::downgrade(&self.inner) as Weak<dyn Addressable>;
        ParentRef::new(self.inner.address.clone(), handle)
    }

    /// Register an existing actor as a child
    pub fn append<CS: ActorState, CM: Message>(&self, child: &Actor<CS, CM>) -> Result<()> {
        self.append_supervised(Arc::new(child.clone()))
    }

    /// Register any supervised handle as a child. The child must be Running and
    /// live exactly one path segment below this actor.
    pub fn append_supervised(&self, child: Arc<dyn Supervised>) -> Result<()> {
        if !self.is_running() {
            return Err(ActorError::not_running(&self.inner.address));
        }
        if !self.inner.address.is_parent_of(child.address()) {
            return Err(ActorError::ChildAddressInvalid {
                parent: self.inner.address.clone(),
                child: child.address().clone(),
            });
        }
        if !child.is_running() {
            return Err(ActorError::not_running(child.address()));
        }

        let mut children = self.inner.children.lock();
        if children.contains_key(child.address()) {
            return Err(ActorError::ChildAlreadyRegistered {
                address: child.address().clone(),
            });
        }
        child.attach_parent(self.parent_ref())?;
        debug!(
            actor = %self.inner.address,
            child = %child.address(),
            "Child appended"
        );
        children.insert(child.address().clone(), child);
        Ok(())
    }

    /// Create a child under a fresh unique path segment
    pub fn spawn<CS, CM, P>(
        &self,
        processor: P,
        initial_state: CS,
        options: ActorOptions<CM>,
    ) -> Result<Actor<CS, CM>>
    where
        CS: ActorState,
        CM: Message,
        P: Processor<CS, CM>,
    {
        if !self.is_running() {
            return Err(ActorError::not_running(&self.inner.address));
        }

        let child = Actor::new(self.inner.address.unique_child(), processor, initial_state, options)?;
        if let Err(e) = self.append(&child) {
            warn!(
                actor = %self.inner.address,
                child = %child.address(),
                error = %e,
                "Failed to attach spawned child, stopping it"
            );
            let orphan = child.clone();
            tokio::spawn(async move {
                if let Ok(signal) = orphan.stop().await {
                    signal.wait().await;
                }
            });
            return Err(e);
        }
        Ok(child)
    }

    /// Stop and remove one child, returning its handle
    pub async fn crop(&self, address: &Address) -> Result<Arc<dyn Supervised>> {
        let child = self
            .inner
            .children
            .lock()
            .remove(address)
            .ok_or_else(|| ActorError::ChildNotFound {
                parent: self.inner.address.clone(),
                address: address.clone(),
            })?;

        child.detach_parent();
        stop_and_wait(child.as_ref()).await;
        info!(actor = %self.inner.address, child = %address, "Child cropped");
        Ok(child)
    }

    pub fn children(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.inner.children.lock().keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn child(&self, address: &Address) -> Option<Arc<dyn Supervised>> {
        self.inner.children.lock().get(address).cloned()
    }

    pub fn address_book(&self) -> Option<&Arc<AddressBook<M>>> {
        self.inner.address_book.as_ref()
    }

    pub fn mailbox_stats(&self) -> MailboxSnapshot {
        self.inner.mailbox.stats()
    }

    pub fn metrics(&self) -> ActorStats {
        self.inner.metrics.snapshot()
    }
}

/// Stop a child and wait for it; a child already stopping is simply awaited
async fn stop_and_wait(child: &dyn Supervised) {
    match child.stop().await {
        Ok(signal) => signal.wait().await,
        Err(e) if e.is_not_running() => {
            debug!(child = %child.address(), "Child already stopping");
            child.stopped().wait().await;
        }
        Err(e) => {
            warn!(child = %child.address(), error = %e, "Failed to stop child");
        }
    }
}

impl<S: ActorState, M: Message> Clone for Actor<S, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ActorState, M: Message> fmt::Debug for Actor<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("address", &self.inner.address)
            .field("status", &self.status())
            .field("queued", &self.inner.mailbox.len())
            .finish()
    }
}

impl<S: ActorState, M: Message> Addressable for Actor<S, M> {
    fn address(&self) -> &Address {
        &self.inner.address
    }

    fn status(&self) -> ActorStatus {
        self.inner.load_status()
    }
}

#[async_trait]
impl<S: ActorState, M: Message> Endpoint<M> for Actor<S, M> {
    async fn deliver(&self, msg: M) -> Result<DeliveryOutcome> {
        Actor::deliver(self, msg).await
    }
}

#[async_trait]
impl<S: ActorState, M: Message> Supervised for Actor<S, M> {
    async fn stop(&self) -> Result<StopSignal> {
        let inner = &self.inner;
        self.begin_draining()?;

        let children: Vec<Arc<dyn Supervised>> =
            inner.children.lock().drain().map(|(_, child)| child).collect();
        info!(
            actor = %inner.address,
            children = children.len(),
            queued = inner.mailbox.len(),
            "Stopping actor"
        );

        for child in children {
            child.detach_parent();
            stop_and_wait(child.as_ref()).await;
        }

        inner.token.cancel();
        Ok(self.stopped())
    }

    fn stopped(&self) -> StopSignal {
        Actor::stopped(self)
    }

    fn attach_parent(&self, parent: ParentRef) -> Result<()> {
        let mut slot = self.inner.parent.write();
        if !self.is_running() {
            return Err(ActorError::not_running(&self.inner.address));
        }
        if slot.is_some() {
            return Err(ActorError::ChildAlreadyRegistered {
                address: self.inner.address.clone(),
            });
        }
        *slot = Some(parent);
        Ok(())
    }

    fn detach_parent(&self) {
        self.inner.parent.write().take();
    }
}

/// Consumption loop state, owned by the spawned task
struct ActorTask<S: ActorState, M: Message> {
    actor: Actor<S, M>,
    processor: Box<dyn Processor<S, M>>,
    state: S,
    stopped: watch::Sender<bool>,
}

impl<S: ActorState, M: Message> ActorTask<S, M> {
    async fn run(mut self) {
        let token = self.actor.inner.token.clone();
        debug!(actor = %self.actor.inner.address, "Entering message loop");

        loop {
            let msg = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                msg = self.actor.inner.mailbox.pop() => msg,
            };
            self.process(msg).await;
        }

        self.drain().await;
        self.finish();
    }

    async fn process(&mut self, msg: M) {
        let inner = Arc::clone(&self.actor.inner);
        let mutation = msg.mutation();
        let start = Instant::now();

        let result = {
            let ctx = ActorContext {
                actor: &self.actor,
                state: &self.state,
            };
            self.processor.process(msg, &ctx).await
        };
        let elapsed = start.elapsed();
        inner.metrics.record_processed(elapsed);

        match result {
            Ok(next) => {
                if mutation || !inner.transient {
                    *inner.state.write() = next.clone();
                    self.state = next;
                    inner.metrics.state_commits.fetch_add(1, Ordering::Relaxed);
                } else {
                    inner.metrics.discarded_results.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(source) => inner.report_failure(source),
        }
    }

    /// Keep consuming already-queued messages until empty or the grace elapses
    async fn drain(&mut self) {
        let inner = Arc::clone(&self.actor.inner);
        let deadline = Instant::now() + inner.drain_grace;
        let mut drained = 0usize;

        while Instant::now() < deadline {
            match inner.mailbox.try_pop() {
                Some(msg) => {
                    self.process(msg).await;
                    drained += 1;
                }
                None => break,
            }
        }

        inner.mailbox.close();
        let leftover = inner.mailbox.clear();
        if leftover > 0 {
            warn!(
                actor = %inner.address,
                leftover,
                grace_ms = inner.drain_grace.as_millis() as u64,
                "Drain grace period elapsed, dropping queued messages"
            );
        }
        debug!(actor = %inner.address, drained, "Drain complete");
    }

    fn finish(self) {
        let inner = &self.actor.inner;
        inner.set_status(ActorStatus::Idle);
        if let Some(book) = &inner.address_book {
            book.unregister_idle(&inner.address);
        }
        self.stopped.send_replace(true);

        let stats = inner.metrics.snapshot();
        info!(
            actor = %inner.address,
            messages_processed = stats.messages_processed,
            processing_failures = stats.processing_failures,
            "Actor idle"
        );
    }
}
