//! Core `Actor` trait with lifecycle hooks.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
// (none)

// Layer 3: Internal
use super::context::ActorContext;

/// A single-threaded unit of computation with a closure mailbox.
///
/// All hooks have default implementations, so the minimal actor is an
/// empty `impl Actor for MyType {}`. Behavior is usually delivered as
/// closures via [`ActorOwn::send_closure`](crate::ActorOwn::send_closure)
/// rather than through hook overrides.
///
/// Hooks run on the actor's scheduler thread and are never re-entered:
/// two hooks or closures for the same actor never run concurrently.
///
/// # Lifecycle
///
/// - `start_up` - once, before the first closure.
/// - `wakeup` - after a closure that called
///   [`ActorContext::schedule_wakeup`], before the mailbox is polled
///   again.
/// - `timeout_expired` - when the armed timer fires; the default forwards
///   to `wakeup`.
/// - `hangup` - when the owning handle drops without an explicit stop;
///   the default stops the actor.
/// - `hangup_shared` - when one [`ActorShared`](crate::ActorShared)
///   handle drops; used for teardown fan-in.
/// - `tear_down` - once, after the stop request, before destruction.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use tgsys_actor::{Actor, ActorContext};
///
/// struct Ticker {
///     ticks: u32,
/// }
///
/// impl Actor for Ticker {
///     fn start_up(&mut self, ctx: &mut ActorContext) {
///         ctx.set_timeout_in(Duration::from_secs(1));
///     }
///
///     fn timeout_expired(&mut self, ctx: &mut ActorContext) {
///         self.ticks += 1;
///         ctx.set_timeout_in(Duration::from_secs(1));
///     }
/// }
/// ```
pub trait Actor: Sized + Send + 'static {
    /// Called once before the first closure is processed.
    fn start_up(&mut self, _ctx: &mut ActorContext) {}

    /// Called after a closure requested a wakeup via
    /// [`ActorContext::schedule_wakeup`].
    fn wakeup(&mut self, _ctx: &mut ActorContext) {}

    /// Called when the armed timer fires. The timer is disarmed before
    /// this hook runs; re-arm it here for periodic behavior.
    fn timeout_expired(&mut self, ctx: &mut ActorContext) {
        self.wakeup(ctx);
    }

    /// Called when the owning handle was released without an explicit
    /// stop request.
    fn hangup(&mut self, ctx: &mut ActorContext) {
        ctx.stop();
    }

    /// Called when one shared handle was released. Actors coordinating a
    /// teardown fan-in count these calls against the handles they gave
    /// out.
    fn hangup_shared(&mut self, _ctx: &mut ActorContext) {}

    /// Called once after the stop request, before the actor is destroyed.
    fn tear_down(&mut self, _ctx: &mut ActorContext) {}
}
