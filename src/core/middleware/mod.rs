mod chain;
pub use self::chain::MiddlewareChain;

mod middleware;
pub use self::middleware::Middleware;

mod authenticator;
pub use self::authenticator::Authenticator;

mod authorizer;
pub use self::authorizer::Authorizer;

mod logger;
pub use self::logger::Logger;

mod forwarder;
pub use self::forwarder::Forwarder;
