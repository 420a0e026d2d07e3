use async_trait::async_trait;
use http::{Request, Response};

use crate::core::access_log::{AccessLog, AccessRecord};
use crate::core::middleware::Middleware;
use crate::core::request::client_ip;
use crate::core::{Outcome, Principal};
use crate::Body;

pub struct Logger<MW> {
    access_log: AccessLog,
    next: MW,
}

impl<MW> Logger<MW> {
    pub fn new(access_log: AccessLog, next: MW) -> Self {
        Self { access_log, next }
    }
}

#[async_trait]
impl<MW> Middleware for Logger<MW>
where
    MW: Middleware + 'static,
{
    async fn apply(&self, request: Request<Body>) -> Response<Body> {
        let start = tokio::time::Instant::now();
        let received_at = chrono::Utc::now();
        let remote_ip = client_ip(&request);
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        let version = request.version();

        let response = self.next.apply(request).await;
        let principal = response
            .extensions()
            .get::<Principal>()
            .cloned()
            .unwrap_or_default();

        self.access_log.record(AccessRecord {
            received_at,
            remote_ip,
            method,
            path,
            version,
            user: principal.name().to_owned(),
            status: response.status(),
            outcome: response.extensions().get::<Outcome>().copied(),
            elapsed: start.elapsed(),
        });

        response
    }
}
