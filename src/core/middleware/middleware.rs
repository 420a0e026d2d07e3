use async_trait::async_trait;
use http::{Request, Response};

use crate::Body;

/// One stage of the gatekeeper pipeline.
///
/// A stage either answers the request itself (short circuit) or passes it on
/// to the next stage. Failures are always turned into a response here; no
/// error escapes to the connection.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn apply(&self, request: Request<Body>) -> Response<Body>;
}
