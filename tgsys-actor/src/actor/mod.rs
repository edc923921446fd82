//! Actor trait, lifecycle state and execution context.

pub mod context;
pub mod state;
pub mod traits;

pub use context::{ActorContext, ActorInfo};
pub use state::ActorState;
pub use traits::Actor;
