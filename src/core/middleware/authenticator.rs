use async_trait::async_trait;
use http::{HeaderValue, Request, Response};

use crate::common::{debug, info, warn};
use crate::core::middleware::Middleware;
use crate::core::request::IDENTITY_HEADER;
use crate::core::{response, AuthenticationChecker, AuthenticationStatus, Principal};
use crate::Body;

pub struct Authenticator<MW> {
    checker: AuthenticationChecker,
    realm: String,
    next: MW,
}

impl<MW> Authenticator<MW> {
    pub fn new(checker: AuthenticationChecker, realm: impl Into<String>, next: MW) -> Self {
        Self {
            checker,
            realm: realm.into(),
            next,
        }
    }
}

#[async_trait]
impl<MW> Middleware for Authenticator<MW>
where
    MW: Middleware + 'static,
{
    async fn apply(&self, mut request: Request<Body>) -> Response<Body> {
        // Never trust an identity the client brought along.
        request.headers_mut().remove(IDENTITY_HEADER);

        let (status, username) = self.checker.check(&request);
        match status {
            AuthenticationStatus::NotAttempted => {
                debug!("Authentication not attempted");
                response::unauthorized(&self.realm)
            }
            AuthenticationStatus::NotBasic | AuthenticationStatus::Failed => {
                info!(user = %username, ?status, "Authentication failed");
                response::forbidden_authentication(status)
            }
            AuthenticationStatus::Passed => {
                let identity = match HeaderValue::from_str(&username) {
                    Ok(identity) => identity,
                    Err(_) => {
                        warn!(user = ?username, "Username is not a valid header value");
                        return response::forbidden_authentication(AuthenticationStatus::Failed);
                    }
                };
                debug!(user = %username, "Authentication passed");

                let principal = Principal::user(username);
                request.headers_mut().insert(IDENTITY_HEADER, identity);
                request.extensions_mut().insert(principal.clone());

                let mut response = self.next.apply(request).await;
                response.extensions_mut().insert(principal);
                response
            }
        }
    }
}
