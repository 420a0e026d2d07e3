use std::sync::Arc;

use async_trait::async_trait;
use http::{Request, Response};

use crate::{Body, Result};

mod backend;
pub use self::backend::HttpUpstream;

/// Where authorized requests go.
///
/// Implementations forward the request as is and hand back the upstream's
/// response untouched. An `Err` means the upstream could not be reached.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>>;
}

#[async_trait]
impl<U> Upstream for Arc<U>
where
    U: Upstream + ?Sized,
{
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>> {
        (**self).forward(request).await
    }
}
