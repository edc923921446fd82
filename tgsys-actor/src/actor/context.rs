//! Per-actor execution context.

// Layer 1: Standard library
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party
use chrono::{DateTime, Utc};
use tokio::time::Instant;

// Layer 3: Internal
use super::state::ActorState;

/// Immutable identity of an actor: a stable debug name, a process-unique
/// numeric id and the scheduler thread it is pinned to.
#[derive(Debug, Clone)]
pub struct ActorInfo {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    pub(crate) scheduler_id: usize,
    pub(crate) created_at: DateTime<Utc>,
}

impl ActorInfo {
    /// Stable debug name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique actor id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the scheduler thread this actor is pinned to.
    pub fn scheduler_id(&self) -> usize {
        self.scheduler_id
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Display for ActorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.name, self.id, self.scheduler_id)
    }
}

/// Mutable execution context handed to every actor hook and closure.
///
/// The context carries the actor's lifecycle state, its single pending
/// timer, and the stop/wakeup requests that the scheduler loop honours
/// after the current closure returns.
#[derive(Debug)]
pub struct ActorContext {
    info: Arc<ActorInfo>,
    state: ActorState,
    timeout: Option<Instant>,
    stop_requested: bool,
    wakeup_requested: bool,
}

impl ActorContext {
    pub(crate) fn new(info: Arc<ActorInfo>) -> Self {
        Self {
            info,
            state: ActorState::Uninitialized,
            timeout: None,
            stop_requested: false,
            wakeup_requested: false,
        }
    }

    /// Identity of this actor.
    pub fn info(&self) -> &ActorInfo {
        &self.info
    }

    /// Stable debug name.
    pub fn name(&self) -> &str {
        self.info.name()
    }

    /// Scheduler thread this actor runs on.
    pub fn scheduler_id(&self) -> usize {
        self.info.scheduler_id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Arm the timer to fire after `timeout`, replacing any pending timer.
    pub fn set_timeout_in(&mut self, timeout: Duration) {
        self.timeout = Some(Instant::now() + timeout);
    }

    /// Arm the timer to fire at `deadline`, replacing any pending timer.
    pub fn set_timeout_at(&mut self, deadline: Instant) {
        self.timeout = Some(deadline);
    }

    /// Disarm the pending timer, if any.
    pub fn cancel_timeout(&mut self) {
        self.timeout = None;
    }

    /// Check whether a timer is armed.
    pub fn has_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    /// Request a `wakeup` hook call after the current closure returns,
    /// before the mailbox is polled again.
    pub fn schedule_wakeup(&mut self) {
        self.wakeup_requested = true;
    }

    /// Stop this actor after the current closure returns. `tear_down`
    /// runs before destruction; remaining queued closures are dropped.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    pub(crate) fn set_state(&mut self, state: ActorState) {
        self.state = state;
    }

    pub(crate) fn pending_timeout(&self) -> Option<Instant> {
        self.timeout
    }

    pub(crate) fn clear_timeout(&mut self) {
        self.timeout = None;
    }

    pub(crate) fn is_stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub(crate) fn take_wakeup(&mut self) -> bool {
        std::mem::take(&mut self.wakeup_requested)
    }
}
