//! The multi-instance client facade.

// Layer 1: Standard library
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};

// Layer 2: Third-party
use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;

// Layer 3: Internal
use crate::api::{ClientId, Function, Object, RequestId};
use crate::execute::execute_function;
use crate::instance::ClientInstance;
use tgsys_actor::{ActorOwn, Scheduler, SchedulerConfig};
use tgsys_utils::log::LogMessageCallback;
use tgsys_utils::{clock, log};

/// A response to a request, or an incoming update from an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Instance the response belongs to.
    pub client_id: ClientId,
    /// Request this response answers, or 0 for an unsolicited update.
    pub request_id: RequestId,
    /// The response or update object.
    pub object: Object,
}

pub(crate) enum ClientSlot {
    Live(ActorOwn<ClientInstance>),
    Closed,
}

pub(crate) struct ManagerInner {
    scheduler: Scheduler,
    clients: DashMap<ClientId, ClientSlot>,
    next_client_id: AtomicI32,
    responses_tx: Sender<Response>,
    responses_rx: Receiver<Response>,
    receive_lock: Mutex<()>,
}

impl ManagerInner {
    pub(crate) fn mark_closed(&self, client_id: ClientId) {
        self.clients.insert(client_id, ClientSlot::Closed);
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        // Release every live instance (tear_down runs on the scheduler),
        // then stop the scheduler threads.
        self.clients.clear();
        self.scheduler.finish();
    }
}

/// Multiplexes many logical client instances behind one process.
///
/// `send` is callable from any thread; `receive` must not be called
/// from two threads concurrently. An instance's actor tree is lazily
/// constructed on the first request addressed to its id.
#[derive(Clone)]
pub struct ClientManager {
    inner: Arc<ManagerInner>,
}

impl ClientManager {
    /// Create a manager with its own scheduler threads.
    pub fn new() -> Self {
        let scheduler = match Scheduler::new(SchedulerConfig::default()) {
            Ok(scheduler) => scheduler,
            Err(err) => {
                log::log_message(1, &format!("cannot start client scheduler: {err}"));
                std::process::abort();
            }
        };
        let (responses_tx, responses_rx) = crossbeam_channel::unbounded();
        Self {
            inner: Arc::new(ManagerInner {
                scheduler,
                clients: DashMap::new(),
                next_client_id: AtomicI32::new(1),
                responses_tx,
                responses_rx,
                receive_lock: Mutex::new(()),
            }),
        }
    }

    /// The process-wide manager used by the JSON ABI. Lives until
    /// process exit.
    pub fn global() -> &'static ClientManager {
        static GLOBAL: OnceLock<ClientManager> = OnceLock::new();
        GLOBAL.get_or_init(ClientManager::new)
    }

    /// Allocate a previously unused instance id, always positive.
    pub fn create_client_id(&self) -> ClientId {
        self.inner.next_client_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Enqueue a request for `client_id`. Invalid ids and a zero
    /// `request_id` produce an error response through the normal queue.
    pub fn send(&self, client_id: ClientId, request_id: RequestId, function: Function) {
        if request_id == 0 {
            return self.push_error(client_id, request_id, 400, "Request identifier must be non-zero");
        }
        if client_id <= 0 || client_id >= self.inner.next_client_id.load(Ordering::SeqCst) {
            return self.push_error(client_id, request_id, 400, "Invalid client identifier");
        }

        let slot = self
            .inner
            .clients
            .entry(client_id)
            .or_insert_with(|| ClientSlot::Live(self.spawn_instance(client_id)));
        match &*slot {
            ClientSlot::Live(instance) => {
                instance.send_closure(move |instance, ctx| {
                    instance.handle_request(ctx, request_id, function);
                });
            }
            ClientSlot::Closed => {
                drop(slot);
                self.push_error(client_id, request_id, 500, "Request aborted");
            }
        }
    }

    /// Return one pending response or update, waiting up to
    /// `timeout_seconds`. Single-consumer: must not be called from two
    /// threads concurrently.
    pub fn receive(&self, timeout_seconds: f64) -> Option<Response> {
        let _guard = self.inner.receive_lock.lock();
        self.inner
            .responses_rx
            .recv_timeout(clock::duration_from_secs(timeout_seconds))
            .ok()
    }

    /// Synchronously execute a request of the documented subset. Any
    /// other request is refused with a caller error.
    pub fn execute(function: Function) -> Object {
        if !function.can_be_executed_synchronously() {
            return Object::Error {
                code: 400,
                message: "The method can't be executed synchronously".to_string(),
            };
        }
        execute_function(function)
    }

    /// Install a process-wide log message callback; see
    /// [`tgsys_utils::log::set_log_message_callback`].
    pub fn set_log_message_callback(max_level: i32, callback: Option<LogMessageCallback>) {
        log::set_log_message_callback(max_level, callback);
    }

    fn spawn_instance(&self, client_id: ClientId) -> ActorOwn<ClientInstance> {
        let instance = ClientInstance::new(
            client_id,
            self.inner.responses_tx.clone(),
            Arc::downgrade(&self.inner),
        );
        let own = self
            .inner
            .scheduler
            .create_actor(&format!("client-{client_id}"), instance);
        let self_id = own.id();
        own.send_closure(move |instance, _ctx| instance.set_self_id(self_id));
        own
    }

    fn push_error(&self, client_id: ClientId, request_id: RequestId, code: i32, message: &str) {
        let _ = self.inner.responses_tx.send(Response {
            client_id,
            request_id,
            object: Object::Error {
                code,
                message: message.to_string(),
            },
        });
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
