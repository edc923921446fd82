//! Legacy per-instance native surface.
//!
//! One `Client` owns one instance (and, unlike the shared
//! [`ClientManager`](crate::ClientManager), its own scheduler), so its
//! `receive` sees only its own responses. Kept for embedders that
//! predate the multi-client facade.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
// (none)

// Layer 3: Internal
use crate::api::{Function, Object};
use crate::manager::ClientManager;

/// A request to one client instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Caller-chosen identifier echoed in the matching response; must
    /// be non-zero.
    pub id: u64,
    /// The request itself.
    pub function: Function,
}

/// A response to a request, or an incoming update.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Identifier of the answered request, or 0 for updates.
    pub id: u64,
    /// The response or update object.
    pub object: Object,
}

/// One client instance behind the legacy per-instance surface.
pub struct Client {
    manager: ClientManager,
    client_id: crate::api::ClientId,
}

impl Client {
    /// Create a fresh instance with its own scheduler.
    pub fn new() -> Self {
        let manager = ClientManager::new();
        let client_id = manager.create_client_id();
        Self { manager, client_id }
    }

    /// Enqueue a request; safe from any thread.
    pub fn send(&self, request: Request) {
        self.manager.send(self.client_id, request.id, request.function);
    }

    /// Return one pending response or update, waiting up to `timeout`
    /// seconds. Single-consumer, like the facade it wraps.
    pub fn receive(&self, timeout: f64) -> Option<Response> {
        self.manager.receive(timeout).map(|response| Response {
            id: response.request_id,
            object: response.object,
        })
    }

    /// Synchronously execute a request of the documented subset.
    pub fn execute(request: Request) -> Response {
        Response {
            id: request.id,
            object: ClientManager::execute(request.function),
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_is_static() {
        let response = Client::execute(Request {
            id: 3,
            function: Function::GetLogVerbosityLevel,
        });
        assert_eq!(response.id, 3);
        assert!(matches!(response.object, Object::LogVerbosityLevel { .. }));
    }
}
