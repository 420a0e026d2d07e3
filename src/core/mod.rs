mod gatekeeper;
pub use self::gatekeeper::{Builder, Gatekeeper};

mod config;
pub use self::config::{AuthorizationSource, Config, CredentialSource};

mod store;
pub use self::store::Shared;

mod credential;
pub use self::credential::{hash, CredentialStore};

mod rule;
pub use self::rule::{canonical_rule, AuthorizationStore, DefaultAction, RuleSet};

mod authentication;
pub use self::authentication::{AuthenticationChecker, AuthenticationStatus};

mod authorization;
pub use self::authorization::AuthorizationChecker;

mod principal;
pub use self::principal::{Principal, User};

mod outcome;
pub use self::outcome::Outcome;

pub mod access_log;
pub mod middleware;
pub mod request;

mod response;
