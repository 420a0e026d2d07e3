use std::fmt;

use crate::core::AuthenticationStatus;

/// Terminal state a request reached in the gatekeeper.
///
/// Attached to every response as an extension so the access log can report
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Authentication did not pass. `NotAttempted` is answered with a 401
    /// challenge, everything else with 403.
    Unauthenticated(AuthenticationStatus),
    /// Authenticated, but the user's rules deny the request.
    Denied,
    /// Handed to the upstream and its response relayed.
    Forwarded,
    /// Authorized, but the upstream could not be reached.
    UpstreamFailed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Unauthenticated(AuthenticationStatus::NotAttempted) => {
                f.write_str("Authentication missing")
            }
            Outcome::Unauthenticated(_) => f.write_str("Authentication failed"),
            Outcome::Denied => f.write_str("Authorization failed"),
            Outcome::Forwarded => f.write_str("Forwarded"),
            Outcome::UpstreamFailed => f.write_str("Upstream failed"),
        }
    }
}
