use http::{Request, Response};

use crate::core::access_log::AccessLog;
use crate::core::middleware::{Authenticator, Authorizer, Forwarder, Logger, Middleware};
use crate::core::{AuthenticationChecker, AuthorizationChecker};
use crate::upstream::Upstream;
use crate::Body;

/// The gatekeeper pipeline.
///
/// `Logger -> Authenticator -> Authorizer -> Forwarder`: authentication may
/// answer 401/403, authorization may answer 403, and only then does the
/// request reach the upstream.
pub struct MiddlewareChain<U> {
    root: Logger<Authenticator<Authorizer<Forwarder<U>>>>,
}

impl<U> MiddlewareChain<U>
where
    U: Upstream + 'static,
{
    pub fn new(
        authentication: AuthenticationChecker,
        authorization: AuthorizationChecker,
        realm: impl Into<String>,
        access_log: AccessLog,
        upstream: U,
    ) -> Self {
        let forwarder = Forwarder::new(upstream);

        let authorizer = Authorizer::new(authorization, forwarder);

        let authenticator = Authenticator::new(authentication, realm, authorizer);

        let logger = Logger::new(access_log, authenticator);

        Self { root: logger }
    }

    pub async fn apply(&self, request: Request<Body>) -> Response<Body> {
        self.root.apply(request).await
    }
}
