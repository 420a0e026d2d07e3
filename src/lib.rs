#![allow(clippy::module_inception)]

mod server;

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod upstream;

pub use crate::error::{Error, ErrorKind};
pub type Result<T, E = crate::error::Error> = std::result::Result<T, E>;

/// Body type flowing through the gatekeeper, in both directions.
pub type Body = http_body_util::combinators::UnsyncBoxBody<bytes::Bytes, hyper::Error>;

pub use crate::common::full;

pub(crate) mod common {
    pub(crate) type Result<T, E = crate::error::Error> = std::result::Result<T, E>;

    pub(crate) type Error = crate::error::Error;
    pub(crate) type ErrorKind = crate::error::ErrorKind;

    pub(crate) type Time = chrono::DateTime<chrono::Utc>;

    pub use tracing::{debug, error, info, trace, warn};

    /// Wrap a complete in-memory payload as a [`Body`](crate::Body).
    pub fn full(chunk: impl Into<bytes::Bytes>) -> crate::Body {
        use http_body_util::BodyExt;

        http_body_util::Full::new(chunk.into())
            .map_err(|never| match never {})
            .boxed_unsync()
    }
}
