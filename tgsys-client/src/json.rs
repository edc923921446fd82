//! The JSON bridge.
//!
//! Canonical object notation: `@type` names the constructor (string
//! preferred, numeric id accepted), `@extra` is carried round-trip
//! unchanged, and multi-client responses gain `@client_id`. Parse
//! failures are tunnelled through `testReturnError` so the error comes
//! back on the normal response channel with the original `@extra`.

// Layer 1: Standard library
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

// Layer 2: Third-party
use parking_lot::Mutex;
use serde_json::Value;

// Layer 3: Internal
use crate::api::{constructor_name, ClientId, Function, Object};
use crate::client::{Client, Request};
use crate::manager::ClientManager;

fn return_error_function(message: impl Into<String>) -> Function {
    Function::TestReturnError {
        error: Object::Error {
            code: 400,
            message: message.into(),
        },
    }
}

/// Parse a JSON request into a typed function plus the re-encoded
/// `@extra` value (empty when absent). Failures become an in-band
/// `testReturnError`.
pub(crate) fn to_request(request: &str) -> (Function, String) {
    let value: Value = match serde_json::from_str(request) {
        Ok(value) => value,
        Err(err) => {
            return (
                return_error_function(format!("Failed to parse request as JSON object: {err}")),
                String::new(),
            );
        }
    };
    let Value::Object(mut map) = value else {
        return (return_error_function("Expected a JSON object"), String::new());
    };

    let extra = map
        .get("@extra")
        .map(|extra| serde_json::to_string(extra).unwrap_or_default())
        .unwrap_or_default();

    match map.get("@type").cloned() {
        Some(Value::String(_)) => {}
        Some(Value::Number(number)) => {
            let id = number.as_i64().unwrap_or_default() as u32;
            match constructor_name(id) {
                Some(name) => {
                    map.insert("@type".to_string(), Value::String(name.to_string()));
                }
                None => {
                    return (
                        return_error_function(format!("Unknown constructor id {id:#010x}")),
                        extra,
                    );
                }
            }
        }
        _ => {
            return (
                return_error_function("Expected a string or number \"@type\" field"),
                extra,
            );
        }
    }

    match serde_json::from_value::<Function>(Value::Object(map)) {
        Ok(function) => (function, extra),
        Err(err) => (
            return_error_function(format!("Failed to parse JSON object as a request: {err}")),
            extra,
        ),
    }
}

/// Serialize a response object, splicing `@extra` back in verbatim and
/// adding `@client_id` when nonzero.
pub(crate) fn from_response(object: &Object, extra: &str, client_id: ClientId) -> String {
    let mut out = serde_json::to_string(object).unwrap_or_else(|err| {
        tracing::error!(%err, "response serialization failed");
        r#"{"@type":"error","code":500,"message":"Response serialization failed"}"#.to_string()
    });
    debug_assert!(out.ends_with('}'));
    if !extra.is_empty() || client_id != 0 {
        out.pop();
        if !extra.is_empty() {
            out.push_str(",\"@extra\":");
            out.push_str(extra);
        }
        if client_id != 0 {
            out.push_str(",\"@client_id\":");
            out.push_str(&client_id.to_string());
        }
        out.push('}');
    }
    out
}

/// JSON view over one legacy [`Client`], with the `@extra` side table
/// keyed by internally generated request ids.
pub struct ClientJson {
    client: Client,
    extra: Mutex<HashMap<u64, String>>,
    next_request_id: AtomicU64,
}

impl ClientJson {
    /// Create the instance.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            extra: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Enqueue a JSON request.
    pub fn send(&self, request: &str) {
        let (function, extra) = to_request(request);
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        if !extra.is_empty() {
            self.extra.lock().insert(request_id, extra);
        }
        self.client.send(Request {
            id: request_id,
            function,
        });
    }

    /// Return one pending response or update as JSON.
    pub fn receive(&self, timeout: f64) -> Option<String> {
        let response = self.client.receive(timeout)?;
        let extra = if response.id != 0 {
            self.extra.lock().remove(&response.id).unwrap_or_default()
        } else {
            String::new()
        };
        Some(from_response(&response.object, &extra, 0))
    }

    /// Synchronously execute a JSON request.
    pub fn execute(request: &str) -> String {
        let (function, extra) = to_request(request);
        let response = Client::execute(Request { id: 0, function });
        from_response(&response.object, &extra, 0)
    }
}

impl Default for ClientJson {
    fn default() -> Self {
        Self::new()
    }
}

// Multi-client JSON surface over the global manager.

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn extra_table() -> &'static Mutex<HashMap<u64, String>> {
    static EXTRA: OnceLock<Mutex<HashMap<u64, String>>> = OnceLock::new();
    EXTRA.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Allocate an instance id on the global manager.
pub fn json_create_client_id() -> ClientId {
    ClientManager::global().create_client_id()
}

/// Enqueue a JSON request for `client_id` on the global manager.
pub fn json_send(client_id: ClientId, request: &str) {
    let (function, extra) = to_request(request);
    let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
    if !extra.is_empty() {
        extra_table().lock().insert(request_id, extra);
    }
    ClientManager::global().send(client_id, request_id, function);
}

/// Return one pending response or update of any instance as JSON,
/// tagged with its `@client_id`.
pub fn json_receive(timeout: f64) -> Option<String> {
    let response = ClientManager::global().receive(timeout)?;
    let extra = if response.request_id != 0 {
        extra_table()
            .lock()
            .remove(&response.request_id)
            .unwrap_or_default()
    } else {
        String::new()
    };
    Some(from_response(&response.object, &extra, response.client_id))
}

/// Synchronously execute a JSON request.
pub fn json_execute(request: &str) -> String {
    let (function, extra) = to_request(request);
    from_response(&ClientManager::execute(function), &extra, 0)
}
