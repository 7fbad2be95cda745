//! Request routing: authentication, handler selection, error translation.
//!
//! Each incoming request passes through a fixed pipeline: authenticate
//! (unless the matched handler is the identity bootstrap), select the
//! first registered handler whose predicate claims the request, invoke
//! it, and translate any failure into a typed error response. The
//! dispatcher is the single point where uncaught handler failures become
//! 500 responses; nothing below it lets an error cross the protocol
//! boundary as a fault.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{Request, Response};

use crate::{
    identity::{AuthorizationOutcome, ConnectionIdProvider, IdentityError, authorize},
    store::RoomStoreError,
};

/// Errors a handler can surface.
///
/// Everything here becomes a typed response at the dispatcher:
/// `NotAllowed` maps to 403, `BadRequest` to 400, the rest to 500.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Authenticated caller lacks host authority for the action.
    #[error("not allowed: {0}")]
    NotAllowed(String),

    /// The request is malformed at the business level, e.g. it names a
    /// room that does not exist.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Room store operation failed.
    #[error(transparent)]
    Store(#[from] RoomStoreError),

    /// Identity registry operation failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Unexpected fault during handling.
    #[error("internal: {0}")]
    Internal(String),
}

/// A unit implementing the behavior for exactly one request kind.
///
/// `can_handle` must be a pure predicate over the request's discriminator;
/// the dispatcher scans handlers in registration order and the first match
/// wins. Handlers are side-effect-isolated so they can be tested alone
/// against stub providers and stores.
pub trait RequestHandler: Send + Sync {
    /// Whether this handler claims the request.
    fn can_handle(&self, request: &Request) -> bool;

    /// Whether the dispatcher must authenticate the caller first. Only
    /// the identity bootstrap handler returns `false`.
    fn needs_authentication(&self) -> bool;

    /// Execute the request. `source_ipv4`/`source_ipv6` carry the peer
    /// address as observed by the transport, when known.
    fn handle(
        &self,
        request: &Request,
        source_ipv4: Option<Ipv4Addr>,
        source_ipv6: Option<Ipv6Addr>,
    ) -> Result<Response, HandlerError>;
}

/// Handler built from three function values.
///
/// Exists for ad hoc handlers, mainly test doubles; the nine production
/// handlers are proper types in [`crate::handlers`].
pub struct FnHandler<C, H>
where
    C: Fn(&Request) -> bool + Send + Sync,
    H: Fn(&Request, Option<Ipv4Addr>, Option<Ipv6Addr>) -> Result<Response, HandlerError>
        + Send
        + Sync,
{
    can_handle: C,
    needs_authentication: bool,
    handle: H,
}

impl<C, H> FnHandler<C, H>
where
    C: Fn(&Request) -> bool + Send + Sync,
    H: Fn(&Request, Option<Ipv4Addr>, Option<Ipv6Addr>) -> Result<Response, HandlerError>
        + Send
        + Sync,
{
    /// Assemble a handler from its three parts.
    pub fn new(can_handle: C, needs_authentication: bool, handle: H) -> Self {
        Self { can_handle, needs_authentication, handle }
    }
}

impl<C, H> RequestHandler for FnHandler<C, H>
where
    C: Fn(&Request) -> bool + Send + Sync,
    H: Fn(&Request, Option<Ipv4Addr>, Option<Ipv6Addr>) -> Result<Response, HandlerError>
        + Send
        + Sync,
{
    fn can_handle(&self, request: &Request) -> bool {
        (self.can_handle)(request)
    }

    fn needs_authentication(&self) -> bool {
        self.needs_authentication
    }

    fn handle(
        &self,
        request: &Request,
        source_ipv4: Option<Ipv4Addr>,
        source_ipv6: Option<Ipv6Addr>,
    ) -> Result<Response, HandlerError> {
        (self.handle)(request, source_ipv4, source_ipv6)
    }
}

/// Routes each request to exactly one handler, enforcing authentication
/// first.
pub struct MessageDispatcher {
    identity: Arc<dyn ConnectionIdProvider>,
    handlers: Vec<Box<dyn RequestHandler>>,
}

impl MessageDispatcher {
    /// Create a dispatcher with no registered handlers.
    pub fn new(identity: Arc<dyn ConnectionIdProvider>) -> Self {
        Self { identity, handlers: Vec::new() }
    }

    /// Append a handler. Registration order is selection order.
    pub fn register(&mut self, handler: Box<dyn RequestHandler>) {
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run a request through the pipeline and produce its response.
    pub fn dispatch(
        &self,
        request: &Request,
        source_ipv4: Option<Ipv4Addr>,
        source_ipv6: Option<Ipv6Addr>,
    ) -> Response {
        let handler = self.handlers.iter().find(|h| h.can_handle(request));

        // Authentication comes before the no-handler check: unmatched
        // requests with bad credentials are rejected as unauthorized,
        // not as bad requests. Only a matched bootstrap handler skips it.
        let needs_authentication =
            handler.as_ref().is_none_or(|h| h.needs_authentication());

        if needs_authentication {
            let outcome = match authorize(
                self.identity.as_ref(),
                request.connection_id.as_deref(),
                request.password.as_deref(),
            ) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "identity registry failure during authorization");
                    return Response::internal_server_error("identity registry unavailable");
                },
            };

            match outcome {
                AuthorizationOutcome::Authorized => {},
                AuthorizationOutcome::NotFound => {
                    return Response::unknown_connection_id("connection id is not registered");
                },
                AuthorizationOutcome::NotAuthorized => {
                    return Response::authorization_failure("bad or missing credentials");
                },
            }
        }

        let Some(handler) = handler else {
            tracing::debug!(
                discriminator = request.body.discriminator(),
                "no handler claimed request"
            );
            return Response::bad_request("no handler recognizes this request");
        };

        match handler.handle(request, source_ipv4, source_ipv6) {
            Ok(response) => response,
            Err(HandlerError::NotAllowed(message)) => Response::not_allowed(message),
            Err(HandlerError::BadRequest(message)) => Response::bad_request(message),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    discriminator = request.body.discriminator(),
                    "handler failure"
                );
                Response::internal_server_error("request handling failed")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use hearth_proto::RequestBody;

    use super::*;
    use crate::identity::MemoryIdentityProvider;

    fn claim_disconnect(request: &Request) -> bool {
        matches!(request.body, RequestBody::Disconnect)
    }

    fn dispatcher_with(
        identity: &MemoryIdentityProvider,
        handlers: Vec<Box<dyn RequestHandler>>,
    ) -> MessageDispatcher {
        let mut dispatcher = MessageDispatcher::new(Arc::new(identity.clone()));
        for handler in handlers {
            dispatcher.register(handler);
        }
        dispatcher
    }

    #[test]
    fn unmatched_request_with_valid_credentials_is_bad_request() {
        let identity = MemoryIdentityProvider::new();
        let id = identity.issue().unwrap();
        let dispatcher = dispatcher_with(&identity, vec![]);

        let request = Request::authenticated(id.connection_id, id.password, RequestBody::Disconnect);
        let response = dispatcher.dispatch(&request, None, None);
        assert_eq!(response.error_status(), Some(400));
    }

    #[test]
    fn unknown_connection_id_is_404() {
        let identity = MemoryIdentityProvider::new();
        let dispatcher = dispatcher_with(&identity, vec![]);

        let request =
            Request::authenticated("deadbeefdeadbeef", "pw", RequestBody::Disconnect);
        let response = dispatcher.dispatch(&request, None, None);
        assert_eq!(response.error_status(), Some(404));
    }

    #[test]
    fn bad_password_is_401() {
        let identity = MemoryIdentityProvider::new();
        let id = identity.issue().unwrap();
        let dispatcher = dispatcher_with(&identity, vec![]);

        let request = Request::authenticated(id.connection_id, "wrong", RequestBody::Disconnect);
        let response = dispatcher.dispatch(&request, None, None);
        assert_eq!(response.error_status(), Some(401));
    }

    #[test]
    fn bootstrap_handler_skips_authentication() {
        let identity = MemoryIdentityProvider::new();
        let handler = FnHandler::new(
            |request: &Request| matches!(request.body, RequestBody::GetConnectionId),
            false,
            |_, _, _| Ok(Response::Disconnected),
        );
        let dispatcher = dispatcher_with(&identity, vec![Box::new(handler)]);

        let request = Request::unauthenticated(RequestBody::GetConnectionId);
        let response = dispatcher.dispatch(&request, None, None);
        assert!(!response.is_error());
    }

    #[test]
    fn first_matching_handler_in_registration_order_wins() {
        let identity = MemoryIdentityProvider::new();
        let id = identity.issue().unwrap();

        let first = FnHandler::new(claim_disconnect, true, |_, _, _| {
            Ok(Response::RoomDestroyed { room_id: "first".to_string() })
        });
        let second = FnHandler::new(claim_disconnect, true, |_, _, _| {
            Ok(Response::RoomDestroyed { room_id: "second".to_string() })
        });
        let dispatcher =
            dispatcher_with(&identity, vec![Box::new(first), Box::new(second)]);

        let request = Request::authenticated(id.connection_id, id.password, RequestBody::Disconnect);
        let response = dispatcher.dispatch(&request, None, None);
        assert_eq!(response, Response::RoomDestroyed { room_id: "first".to_string() });
    }

    #[test]
    fn not_allowed_error_maps_to_403() {
        let identity = MemoryIdentityProvider::new();
        let id = identity.issue().unwrap();

        let handler = FnHandler::new(claim_disconnect, true, |_, _, _| {
            Err(HandlerError::NotAllowed("host only".to_string()))
        });
        let dispatcher = dispatcher_with(&identity, vec![Box::new(handler)]);

        let request = Request::authenticated(id.connection_id, id.password, RequestBody::Disconnect);
        let response = dispatcher.dispatch(&request, None, None);
        assert_eq!(response.error_status(), Some(403));
    }

    #[test]
    fn other_handler_errors_map_to_500() {
        let identity = MemoryIdentityProvider::new();
        let id = identity.issue().unwrap();

        let handler = FnHandler::new(claim_disconnect, true, |_, _, _| {
            Err(HandlerError::Internal("boom".to_string()))
        });
        let dispatcher = dispatcher_with(&identity, vec![Box::new(handler)]);

        let request = Request::authenticated(id.connection_id, id.password, RequestBody::Disconnect);
        let response = dispatcher.dispatch(&request, None, None);
        assert_eq!(response.error_status(), Some(500));
    }
}
