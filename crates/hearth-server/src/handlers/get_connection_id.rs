//! Identity bootstrap: issue a fresh connection identity.

use std::{
    net::{Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use hearth_proto::{Request, RequestBody, Response};

use crate::{
    dispatcher::{HandlerError, RequestHandler},
    identity::ConnectionIdProvider,
};

/// Handles `GetConnectionId`, the only unauthenticated request kind.
pub struct GetConnectionIdHandler {
    identity: Arc<dyn ConnectionIdProvider>,
}

impl GetConnectionIdHandler {
    /// Build a handler issuing identities from `identity`.
    pub fn new(identity: Arc<dyn ConnectionIdProvider>) -> Self {
        Self { identity }
    }
}

impl RequestHandler for GetConnectionIdHandler {
    fn can_handle(&self, request: &Request) -> bool {
        matches!(request.body, RequestBody::GetConnectionId)
    }

    fn needs_authentication(&self) -> bool {
        false
    }

    fn handle(
        &self,
        _request: &Request,
        _source_ipv4: Option<Ipv4Addr>,
        _source_ipv6: Option<Ipv6Addr>,
    ) -> Result<Response, HandlerError> {
        let id = self.identity.issue()?;
        tracing::debug!(connection_id = %id.connection_id, "issued connection identity");

        Ok(Response::ConnectionIdAssigned {
            connection_id: id.connection_id,
            password: id.password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handlers::testing::Fixture,
        identity::{AuthorizationOutcome, authorize},
    };

    #[test]
    fn issues_identity_that_authorizes() {
        let fixture = Fixture::new();
        let handler = GetConnectionIdHandler::new(fixture.identity.clone());

        let request = Request::unauthenticated(RequestBody::GetConnectionId);
        assert!(handler.can_handle(&request));
        assert!(!handler.needs_authentication());

        let response = handler.handle(&request, None, None).unwrap();
        let Response::ConnectionIdAssigned { connection_id, password } = response else {
            panic!("unexpected response: {response:?}");
        };

        let outcome = authorize(
            fixture.identity.as_ref(),
            Some(&connection_id),
            Some(&password),
        )
        .unwrap();
        assert_eq!(outcome, AuthorizationOutcome::Authorized);
    }

    #[test]
    fn consecutive_issues_are_distinct() {
        let fixture = Fixture::new();
        let handler = GetConnectionIdHandler::new(fixture.identity.clone());
        let request = Request::unauthenticated(RequestBody::GetConnectionId);

        let first = handler.handle(&request, None, None).unwrap();
        let second = handler.handle(&request, None, None).unwrap();
        assert_ne!(first, second);
    }
}
