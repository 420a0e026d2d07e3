use async_trait::async_trait;
use http::{Request, Response};

use crate::common::error;
use crate::core::middleware::Middleware;
use crate::core::{response, Outcome};
use crate::upstream::Upstream;
use crate::Body;

/// Last stage: hands the request to the upstream and relays its response.
pub struct Forwarder<U> {
    upstream: U,
}

impl<U> Forwarder<U> {
    pub fn new(upstream: U) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl<U> Middleware for Forwarder<U>
where
    U: Upstream + 'static,
{
    async fn apply(&self, request: Request<Body>) -> Response<Body> {
        let path = request.uri().path().to_owned();

        match self.upstream.forward(request).await {
            Ok(mut response) => {
                response.extensions_mut().insert(Outcome::Forwarded);
                response
            }
            Err(err) => {
                error!(cause = %err, %path, "Forward to upstream");
                response::bad_gateway()
            }
        }
    }
}
