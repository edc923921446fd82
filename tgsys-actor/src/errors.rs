//! Scheduler-level error types.

// Layer 1: Standard library
use std::io;

// Layer 2: Third-party
use thiserror::Error;

// Layer 3: Internal
use tgsys_utils::CoreError;

/// Errors surfaced by the actor scheduler.
#[derive(Error, Debug)]
pub enum ActorError {
    /// The scheduler no longer accepts new actors.
    #[error("Scheduler is shutting down")]
    SchedulerShutdown,

    /// A scheduler id outside the configured thread range was requested.
    #[error("Invalid scheduler id {id}: {count} scheduler threads exist")]
    InvalidSchedulerId { id: usize, count: usize },

    /// An OS thread for the scheduler could not be started.
    #[error("Failed to start scheduler thread: {0}")]
    ThreadSpawn(#[from] io::Error),
}

impl ActorError {
    /// Check if the error was caused by shutdown already being in
    /// progress.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, ActorError::SchedulerShutdown)
    }
}

impl From<ActorError> for CoreError {
    fn from(err: ActorError) -> Self {
        CoreError::state(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ActorError::InvalidSchedulerId { id: 9, count: 3 };
        assert!(err.to_string().contains('9'));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_shutdown_classification() {
        assert!(ActorError::SchedulerShutdown.is_shutdown());
        assert!(!ActorError::InvalidSchedulerId { id: 0, count: 0 }.is_shutdown());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: CoreError = ActorError::SchedulerShutdown.into();
        assert!(err.is_state_error());
    }
}
