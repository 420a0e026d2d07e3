use http::header::{self, HeaderValue};
use http::{Response, StatusCode};

use crate::common::full;
use crate::core::{AuthenticationStatus, Outcome};
use crate::Body;

pub(crate) const UNAUTHORIZED: &str = "401 Unauthorized";
pub(crate) const FORBIDDEN_AUTHENTICATION: &str = "403 Forbidden (authentication)";
pub(crate) const FORBIDDEN_AUTHORIZATION: &str = "403 Forbidden (authorization)";
pub(crate) const BAD_GATEWAY: &str = "502 Bad Gateway";

/// 401 with a `WWW-Authenticate: Basic realm="..."` challenge.
pub(crate) fn unauthorized(realm: &str) -> Response<Body> {
    let mut response = plain_text(
        StatusCode::UNAUTHORIZED,
        UNAUTHORIZED,
        Outcome::Unauthenticated(AuthenticationStatus::NotAttempted),
    );
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, challenge(realm));
    response
}

/// 403 for any attempted but failed authentication. The body is the same
/// for every failure cause.
pub(crate) fn forbidden_authentication(status: AuthenticationStatus) -> Response<Body> {
    plain_text(
        StatusCode::FORBIDDEN,
        FORBIDDEN_AUTHENTICATION,
        Outcome::Unauthenticated(status),
    )
}

pub(crate) fn forbidden_authorization() -> Response<Body> {
    plain_text(
        StatusCode::FORBIDDEN,
        FORBIDDEN_AUTHORIZATION,
        Outcome::Denied,
    )
}

pub(crate) fn bad_gateway() -> Response<Body> {
    plain_text(
        StatusCode::BAD_GATEWAY,
        BAD_GATEWAY,
        Outcome::UpstreamFailed,
    )
}

fn plain_text(status: StatusCode, text: &str, outcome: Outcome) -> Response<Body> {
    let mut response = Response::new(full(format!("{}\n", text)));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    response.extensions_mut().insert(outcome);
    response
}

fn challenge(realm: &str) -> HeaderValue {
    let realm = realm.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_carries_realm() {
        let response = unauthorized("Elasticsearch");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Elasticsearch\""
        );
        assert_eq!(
            response.extensions().get::<Outcome>(),
            Some(&Outcome::Unauthenticated(AuthenticationStatus::NotAttempted))
        );
    }

    #[test]
    fn challenge_escapes_quotes() {
        assert_eq!(challenge("my \"realm\""), "Basic realm=\"my \\\"realm\\\"\"");
        assert_eq!(challenge("bad\nrealm"), "Basic");
    }

    #[test]
    fn forbidden_has_no_challenge() {
        let response = forbidden_authentication(AuthenticationStatus::Failed);

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
