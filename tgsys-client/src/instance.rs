//! The root actor of one client instance.

// Layer 1: Standard library
use std::sync::Weak;

// Layer 2: Third-party
use crossbeam_channel::Sender;

// Layer 3: Internal
use crate::api::{ClientId, Function, Object, RequestId};
use crate::execute::execute_function;
use crate::manager::{ManagerInner, Response};
use tgsys_actor::{Actor, ActorContext, ActorId};

/// Per-client root actor: dispatches requests, produces responses and
/// updates, and drives the close sequence.
pub(crate) struct ClientInstance {
    client_id: ClientId,
    responses: Sender<Response>,
    manager: Weak<ManagerInner>,
    self_id: Option<ActorId<ClientInstance>>,
    closing: bool,
}

impl ClientInstance {
    pub(crate) fn new(
        client_id: ClientId,
        responses: Sender<Response>,
        manager: Weak<ManagerInner>,
    ) -> Self {
        Self {
            client_id,
            responses,
            manager,
            self_id: None,
            closing: false,
        }
    }

    pub(crate) fn set_self_id(&mut self, self_id: ActorId<ClientInstance>) {
        self.self_id = Some(self_id);
    }

    fn respond(&self, request_id: RequestId, object: Object) {
        let _ = self.responses.send(Response {
            client_id: self.client_id,
            request_id,
            object,
        });
    }

    fn send_update(&self, object: Object) {
        self.respond(0, object);
    }

    fn authorization_state(&self) -> Object {
        if self.closing {
            Object::AuthorizationStateClosed
        } else {
            Object::AuthorizationStateWaitTdlibParameters
        }
    }

    pub(crate) fn handle_request(
        &mut self,
        ctx: &mut ActorContext,
        request_id: RequestId,
        function: Function,
    ) {
        if self.closing {
            return self.respond(
                request_id,
                Object::Error {
                    code: 500,
                    message: "Request aborted".to_string(),
                },
            );
        }
        if function.can_be_executed_synchronously() {
            return self.respond(request_id, execute_function(function));
        }
        match function {
            Function::TestSquareInt { value } => self.respond(
                request_id,
                Object::TestInt {
                    value: value.wrapping_mul(value),
                },
            ),
            Function::TestCallEmpty => self.respond(request_id, Object::Ok),
            Function::GetAuthorizationState => {
                self.respond(request_id, self.authorization_state());
            }
            Function::Close => self.close(ctx, request_id),
            Function::GetOption { .. } => self.respond(
                request_id,
                Object::Error {
                    code: 400,
                    message: "Initialization parameters are needed: call setTdlibParameters first"
                        .to_string(),
                },
            ),
            _ => self.respond(
                request_id,
                Object::Error {
                    code: 400,
                    message: "Function is not supported".to_string(),
                },
            ),
        }
    }

    fn close(&mut self, ctx: &mut ActorContext, request_id: RequestId) {
        tracing::info!(client_id = self.client_id, "closing client instance");
        self.closing = true;
        // Mark the slot first so the facade starts failing new sends,
        // then answer, then end the update stream.
        if let Some(manager) = self.manager.upgrade() {
            manager.mark_closed(self.client_id);
        }
        self.respond(request_id, Object::Ok);
        self.send_update(Object::UpdateAuthorizationState {
            authorization_state: Box::new(Object::AuthorizationStateClosed),
        });
        // Stop on a later loop iteration so requests already queued
        // behind the close still receive their "Request aborted" answer.
        match &self.self_id {
            Some(self_id) => self_id.send_closure_later(|_instance, ctx| ctx.stop()),
            None => ctx.stop(),
        }
    }
}

impl Actor for ClientInstance {
    fn start_up(&mut self, _ctx: &mut ActorContext) {
        tracing::debug!(client_id = self.client_id, "client instance started");
        self.send_update(Object::UpdateAuthorizationState {
            authorization_state: Box::new(Object::AuthorizationStateWaitTdlibParameters),
        });
    }

    fn tear_down(&mut self, _ctx: &mut ActorContext) {
        tracing::debug!(client_id = self.client_id, "client instance destroyed");
    }
}
