//! # tgsys-client - Multi-instance client facade
//!
//! The request/response/update surface of the tgsys core. Many logical
//! client instances are multiplexed behind one process: requests go in
//! through [`ClientManager::send`], responses and asynchronous updates
//! come back out through [`ClientManager::receive`], and a documented
//! subset of side-effect-free requests runs synchronously through
//! [`ClientManager::execute`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use tgsys_client::{api::Function, ClientManager};
//!
//! let manager = ClientManager::new();
//! let client_id = manager.create_client_id();
//! manager.send(client_id, 1, Function::TestSquareInt { value: 3 });
//!
//! while let Some(response) = manager.receive(10.0) {
//!     if response.request_id == 0 {
//!         // asynchronous update for response.client_id
//!     } else {
//!         // answer to request response.request_id
//!     }
//! }
//! ```
//!
//! The [`json`] module provides the equivalent string surface
//! (`@type`-tagged objects, `@extra` round-trip, `@client_id` on
//! multi-client responses), and [`ffi`] exports it as the C-style JSON
//! ABI used by every non-native binding.

pub mod api;
pub mod client;
pub mod execute;
pub mod ffi;
pub mod json;
pub mod manager;
pub mod text_entities;

pub(crate) mod instance;

// Re-export commonly used types
pub use api::{ClientId, Function, Object, RequestId};
pub use client::Client;
pub use json::ClientJson;
pub use manager::{ClientManager, Response};
