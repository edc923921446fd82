//! Actor lifecycle state.

/// Lifecycle state of an actor.
///
/// State transitions are strictly forward:
/// `Uninitialized` → `Running` → `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Created but not yet scheduled; `start_up` has not run.
    Uninitialized,
    /// Processing closures on its scheduler thread.
    Running,
    /// Stopped; `tear_down` has run or is about to run, remaining
    /// closures are dropped silently.
    Stopped,
}

impl ActorState {
    /// Check if the actor is currently processing closures.
    pub fn is_running(&self) -> bool {
        matches!(self, ActorState::Running)
    }

    /// Check if the actor has stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self, ActorState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(!ActorState::Uninitialized.is_running());
        assert!(ActorState::Running.is_running());
        assert!(!ActorState::Running.is_stopped());
        assert!(ActorState::Stopped.is_stopped());
    }
}
