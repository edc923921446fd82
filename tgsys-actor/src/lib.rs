//! # tgsys-actor - Thread-affine actor scheduler
//!
//! A cooperative message-passing runtime: actors are single-threaded units
//! of computation with a FIFO closure mailbox, a replaceable timer, and a
//! fixed affinity to one scheduler thread. The scheduler hosts N+1 OS
//! threads (N workers plus one designated "main"), each running a
//! current-thread tokio runtime that drives the actors pinned to it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tgsys_actor::{Actor, ActorContext, Scheduler, SchedulerConfig};
//!
//! struct Counter {
//!     count: u64,
//! }
//!
//! impl Actor for Counter {}
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default())?;
//! let counter = scheduler.create_actor("counter", Counter { count: 0 });
//!
//! // Closures are delivered FIFO per (sender thread, target actor).
//! counter.send_closure(|actor, _ctx| actor.count += 1);
//!
//! scheduler.finish();
//! ```
//!
//! # Guarantees
//!
//! - Two closures for the same actor never run concurrently.
//! - Closures posted from one thread to one actor run in posting order.
//! - Posting to a dropped actor is a silent no-op.
//! - A panic inside an actor closure is fatal to the process.
//!
//! # Module Organization
//!
//! - [`actor`] - `Actor` trait, lifecycle hooks, execution context
//! - [`handle`] - typed actor handles (`ActorOwn`, `ActorId`, `ActorShared`)
//! - [`scheduler`] - the N+1-thread scheduler and its shutdown protocol
//! - [`promise`] - single-shot typed promises
//! - [`config`] - scheduler configuration
//! - [`errors`] - error types

pub mod actor;
pub mod config;
pub mod errors;
pub mod handle;
pub mod promise;
pub mod scheduler;

pub(crate) mod mailbox;

// Re-export commonly used types
pub use actor::{Actor, ActorContext, ActorInfo, ActorState};
pub use config::SchedulerConfig;
pub use errors::ActorError;
pub use handle::{ActorId, ActorOwn, ActorShared};
pub use promise::{Promise, PromiseFuture};
pub use scheduler::Scheduler;
