//! Typed actor handles.
//!
//! Three handle flavours with a documented ownership direction:
//!
//! - [`ActorOwn`] - unique owner; dropping it (without an explicit
//!   [`ActorOwn::stop`]) delivers a hangup to the actor.
//! - [`ActorId`] - weak reference; posting through a dead one is a silent
//!   no-op. Use for cyclic references between actors.
//! - [`ActorShared`] - counted reference for graceful teardown fan-in;
//!   dropping one delivers a `hangup_shared` to the actor.

// Layer 1: Standard library
use std::sync::Arc;

// Layer 2: Third-party
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};

// Layer 3: Internal
use crate::actor::{Actor, ActorContext, ActorInfo};
use crate::mailbox::Signal;

/// Unique owning handle to an actor.
///
/// Exactly one `ActorOwn` exists per actor. Dropping it releases the
/// actor: the actor receives `hangup` (whose default implementation
/// stops it), then `tear_down` runs and the actor is destroyed once all
/// shared handles are gone too.
pub struct ActorOwn<A: Actor> {
    tx: Option<UnboundedSender<Signal<A>>>,
    info: Arc<ActorInfo>,
}

impl<A: Actor> ActorOwn<A> {
    pub(crate) fn new(tx: UnboundedSender<Signal<A>>, info: Arc<ActorInfo>) -> Self {
        Self { tx: Some(tx), info }
    }

    /// Identity of the actor this handle owns.
    pub fn info(&self) -> &ActorInfo {
        &self.info
    }

    /// Create a weak reference to this actor.
    pub fn id(&self) -> ActorId<A> {
        ActorId {
            tx: self.tx.as_ref().map(UnboundedSender::downgrade),
            info: Arc::clone(&self.info),
        }
    }

    /// Create a counted shared handle for teardown fan-in.
    pub fn share(&self) -> ActorShared<A> {
        ActorShared {
            tx: self.tx.clone(),
            info: Arc::clone(&self.info),
        }
    }

    /// Post a closure to the actor. Safe from any thread; FIFO is
    /// preserved per (sender thread, target actor) pair.
    pub fn send_closure<F>(&self, f: F)
    where
        F: FnOnce(&mut A, &mut ActorContext) + Send + 'static,
    {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Signal::Event(Box::new(f)));
        }
    }

    /// Post a closure that is guaranteed to run on a later scheduler loop
    /// iteration. Every post goes through the mailbox in this runtime, so
    /// this is ordering-equivalent to [`send_closure`](Self::send_closure);
    /// it exists for callers that must not rely on any direct-dispatch
    /// fast path.
    pub fn send_closure_later<F>(&self, f: F)
    where
        F: FnOnce(&mut A, &mut ActorContext) + Send + 'static,
    {
        self.send_closure(f);
    }

    /// Stop the actor explicitly. The actor transitions to `Stopped`
    /// after the closure it is currently running, `tear_down` runs, and
    /// remaining queued closures are dropped silently.
    pub fn stop(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Signal::Stop);
        }
    }
}

impl<A: Actor> Drop for ActorOwn<A> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Signal::Hangup);
        }
    }
}

impl<A: Actor> std::fmt::Debug for ActorOwn<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActorOwn({})", self.info)
    }
}

/// Weak reference to an actor.
///
/// An `ActorId` never keeps the actor alive. Posting through an
/// `ActorId` whose actor has been released is a defined no-op.
pub struct ActorId<A: Actor> {
    tx: Option<WeakUnboundedSender<Signal<A>>>,
    info: Arc<ActorInfo>,
}

impl<A: Actor> ActorId<A> {
    /// Identity of the referenced actor.
    pub fn info(&self) -> &ActorInfo {
        &self.info
    }

    /// Check whether the actor is still reachable. A `true` result is
    /// immediately stale; use it for diagnostics only.
    pub fn is_alive(&self) -> bool {
        self.tx
            .as_ref()
            .and_then(WeakUnboundedSender::upgrade)
            .is_some()
    }

    /// Post a closure to the actor; a no-op if the actor is gone.
    pub fn send_closure<F>(&self, f: F)
    where
        F: FnOnce(&mut A, &mut ActorContext) + Send + 'static,
    {
        if let Some(tx) = self.tx.as_ref().and_then(WeakUnboundedSender::upgrade) {
            let _ = tx.send(Signal::Event(Box::new(f)));
        }
    }

    /// See [`ActorOwn::send_closure_later`].
    pub fn send_closure_later<F>(&self, f: F)
    where
        F: FnOnce(&mut A, &mut ActorContext) + Send + 'static,
    {
        self.send_closure(f);
    }
}

impl<A: Actor> Clone for ActorId<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            info: Arc::clone(&self.info),
        }
    }
}

impl<A: Actor> std::fmt::Debug for ActorId<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActorId({})", self.info)
    }
}

/// Counted shared handle used for graceful teardown fan-in.
///
/// A shared handle keeps the actor's mailbox open. Dropping one delivers
/// `hangup_shared`, letting the target count surviving holders; the
/// actor is destroyed only when the owner and every shared handle are
/// gone.
pub struct ActorShared<A: Actor> {
    tx: Option<UnboundedSender<Signal<A>>>,
    info: Arc<ActorInfo>,
}

impl<A: Actor> ActorShared<A> {
    /// Identity of the referenced actor.
    pub fn info(&self) -> &ActorInfo {
        &self.info
    }

    /// Post a closure to the actor; a no-op if the actor has stopped.
    pub fn send_closure<F>(&self, f: F)
    where
        F: FnOnce(&mut A, &mut ActorContext) + Send + 'static,
    {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Signal::Event(Box::new(f)));
        }
    }
}

impl<A: Actor> Clone for ActorShared<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            info: Arc::clone(&self.info),
        }
    }
}

impl<A: Actor> Drop for ActorShared<A> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Signal::HangupShared);
        }
    }
}

impl<A: Actor> std::fmt::Debug for ActorShared<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActorShared({})", self.info)
    }
}
