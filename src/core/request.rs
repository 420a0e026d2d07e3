use std::net::{IpAddr, SocketAddr};

use http::header::{self, HeaderName};
use http::Request;
use percent_encoding::percent_decode_str;

/// Header carrying the authenticated username to the upstream.
///
/// Only the gatekeeper sets it. A value sent by the client is removed before
/// authentication runs.
pub const IDENTITY_HEADER: HeaderName = HeaderName::from_static("x-authenticated-user");

/// Peer address of the connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

pub(crate) fn client_ip<B>(request: &Request<B>) -> Option<IpAddr> {
    request
        .extensions()
        .get::<RemoteAddr>()
        .map(|RemoteAddr(addr)| addr.ip())
}

/// Remove `Connection` and the hop-by-hop headers it names, plus the fixed
/// hop-by-hop set.
pub(crate) fn strip_hop_by_hop(headers: &mut http::HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }

    for name in HOP_HEADERS.iter() {
        headers.remove(name);
    }
}

/// Percent-decoded request path with `.`/`..` segments resolved and repeated
/// slashes collapsed, the form authorization rules are matched against.
///
/// `None` when the decoded path is not valid UTF-8.
pub(crate) fn decoded_path(path: &str) -> Option<String> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut clean = String::with_capacity(decoded.len() + 1);
    for segment in &segments {
        clean.push('/');
        clean.push_str(segment);
    }
    // Keep a trailing slash, it names a different resource.
    if clean.is_empty() || decoded.ends_with('/') {
        clean.push('/');
    }

    Some(clean)
}

static HOP_HEADERS: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("proxy-connection"),
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];
