use async_trait::async_trait;
use http::{Request, Response};

use crate::common::{debug, info};
use crate::core::middleware::Middleware;
use crate::core::request::decoded_path;
use crate::core::{response, AuthorizationChecker, Principal};
use crate::Body;

pub struct Authorizer<MW> {
    checker: AuthorizationChecker,
    next: MW,
}

impl<MW> Authorizer<MW> {
    pub fn new(checker: AuthorizationChecker, next: MW) -> Self {
        Self { checker, next }
    }
}

#[async_trait]
impl<MW> Middleware for Authorizer<MW>
where
    MW: Middleware + 'static,
{
    async fn apply(&self, request: Request<Body>) -> Response<Body> {
        // Without an authenticated principal the name is empty, which is
        // always denied.
        let user = match request.extensions().get::<Principal>() {
            Some(principal) if principal.is_authenticated() => principal.name().to_owned(),
            _ => String::new(),
        };
        let method = request.method().as_str();
        let raw_path = request.uri().path();

        // Rules name the path the backend will serve, not its encoding.
        let Some(path) = decoded_path(raw_path) else {
            info!(%user, %method, %raw_path, "Authorization failed, undecodable path");
            return response::forbidden_authorization();
        };

        if self.checker.check(&user, method, &path) {
            debug!(%user, %method, %path, "Authorization passed");
            self.next.apply(request).await
        } else {
            info!(%user, %method, %path, "Authorization failed");
            response::forbidden_authorization()
        }
    }
}
