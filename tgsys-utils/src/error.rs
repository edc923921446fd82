//! The status record carried across the client facade.
//!
//! Every user-visible failure in tgsys is a `CoreError`: an integer code, a
//! human-readable message and an optional cause chain. Codes in the
//! 400-499 range are caller errors, 500-599 are state errors, and code 0
//! marks an internal/logic error that should never reach a well-behaved
//! caller.

// Layer 1: Standard library
use std::fmt;

// Layer 2: Third-party
use thiserror::Error;

/// Result alias used throughout the tgsys crates.
pub type CoreResult<T> = Result<T, CoreError>;

/// A failure record with an HTTP-style code, a message and an optional
/// cause.
///
/// `CoreError` is the single shape errors take once they cross a crate
/// boundary; the per-crate `thiserror` enums convert into it via `From`
/// impls at the seam.
///
/// # Examples
///
/// ```rust
/// use tgsys_utils::CoreError;
///
/// let err = CoreError::bad_request("Request identifier must be non-zero");
/// assert_eq!(err.code, 400);
/// assert!(err.is_caller_error());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct CoreError {
    /// Error code: 400-499 caller, 500-599 state, 0 internal.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional underlying error.
    pub cause: Option<Box<CoreError>>,
}

impl CoreError {
    /// Create an error with an explicit code.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// Caller error (code 400): the request itself is invalid.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// State error (code 500): the system cannot serve the request in its
    /// current state.
    pub fn state(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// Internal/logic error (code 0).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    /// Attach a cause, keeping this error's code and message.
    pub fn with_cause(mut self, cause: CoreError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Check if this is a caller error (400 family).
    pub fn is_caller_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// Check if this is a state error (500 family).
    pub fn is_state_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// Check if this is an internal/logic error.
    pub fn is_internal(&self) -> bool {
        self.code == 0
    }

    /// Render the full cause chain, outermost first.
    pub fn full_message(&self) -> String {
        let mut out = String::new();
        let mut current = Some(self);
        while let Some(err) = current {
            if !out.is_empty() {
                out.push_str(": ");
            }
            let _ = fmt::Write::write_fmt(&mut out, format_args!("[{}] {}", err.code, err.message));
            current = err.cause.as_deref();
        }
        out
    }
}
