//! # tgsys-utils - Foundation primitives for the tgsys client core
//!
//! Shared building blocks used by every other tgsys crate:
//!
//! - [`error`] - `CoreError`/`CoreResult`, the status record carried across
//!   the client facade (HTTP-style 400/500 code families, code 0 for
//!   internal errors)
//! - [`buffer`] - bounds-checked little-endian byte codec used by the
//!   binlog record framing
//! - [`clock`] - process-local monotonic clock
//! - [`log`] - process-wide log sink with an installable message callback
//!   and a `tracing` bridge
//!
//! This crate intentionally has no async dependencies; it sits below the
//! actor runtime.

pub mod buffer;
pub mod clock;
pub mod error;
pub mod log;

// Re-export commonly used types
pub use buffer::{BufferError, ByteReader, ByteWriter};
pub use error::{CoreError, CoreResult};
