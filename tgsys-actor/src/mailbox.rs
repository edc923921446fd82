//! Closure mailbox shared between actor handles and the scheduler loop.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
// (none)

// Layer 3: Internal
use crate::actor::{Actor, ActorContext};

/// A unit of work delivered to an actor: a one-shot closure over the
/// actor state and its context.
pub(crate) type Event<A> = Box<dyn FnOnce(&mut A, &mut ActorContext) + Send + 'static>;

/// Everything a handle can post into an actor's mailbox. Delivery is
/// FIFO per sending thread; the scheduler loop consumes one signal per
/// iteration.
pub(crate) enum Signal<A: Actor> {
    /// Run a closure against the actor.
    Event(Event<A>),
    /// Explicit stop request from the owning handle.
    Stop,
    /// The owning handle dropped without an explicit stop.
    Hangup,
    /// One shared handle dropped.
    HangupShared,
}
