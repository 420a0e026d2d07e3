use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::uri::{Authority, Scheme, Uri};
use http::{Request, Response, Version};
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::common::{trace, Error, ErrorKind, Result};
use crate::core::request::{client_ip, strip_hop_by_hop};
use crate::upstream::Upstream;
use crate::Body;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Single host reverse proxy to a plain http backend.
///
/// The backend's path is joined with the request path, hop-by-hop headers are
/// dropped in both directions and the client address is appended to
/// `X-Forwarded-For`. Everything else passes through untouched.
pub struct HttpUpstream {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    base_query: Option<String>,
}

impl HttpUpstream {
    pub fn new(backend: &str) -> Result<Self> {
        let invalid = |description: String| {
            Error::from(ErrorKind::InvalidBackend {
                url: backend.to_owned(),
                description,
            })
        };

        let uri: Uri = backend.parse().map_err(|err: http::uri::InvalidUri| invalid(err.to_string()))?;
        let scheme = uri
            .scheme()
            .cloned()
            .ok_or_else(|| invalid("missing scheme".to_owned()))?;
        if scheme != Scheme::HTTP {
            return Err(invalid(format!("unsupported scheme {}", scheme)));
        }
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| invalid("missing host".to_owned()))?;

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            scheme,
            authority,
            base_path: uri.path().to_owned(),
            base_query: uri.query().map(str::to_owned),
        })
    }

    fn target(&self, uri: &Uri) -> Result<Uri> {
        let path = join_path(&self.base_path, uri.path());
        let query: Vec<&str> = [self.base_query.as_deref(), uri.query()]
            .into_iter()
            .flatten()
            .filter(|query| !query.is_empty())
            .collect();
        let path_and_query = if query.is_empty() {
            path
        } else {
            format!("{}?{}", path, query.join("&"))
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|err| Error::from(ErrorKind::Internal(format!("upstream uri: {}", err))))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, mut request: Request<Body>) -> Result<Response<Body>> {
        let target = self.target(request.uri())?;
        let client_ip = client_ip(&request);

        *request.uri_mut() = target;
        *request.version_mut() = Version::HTTP_11;

        let headers = request.headers_mut();
        strip_hop_by_hop(headers);
        // Derived from the target uri by the client.
        headers.remove(header::HOST);
        if let Some(ip) = client_ip {
            append_forwarded_for(headers, ip);
        }

        trace!(uri = %request.uri(), method = %request.method(), "Forward");

        let response = self.client.request(request).await?;
        let mut response = response.map(|body| body.boxed_unsync());
        strip_hop_by_hop(response.headers_mut());

        Ok(response)
    }
}

impl fmt::Debug for HttpUpstream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpUpstream")
            .field("scheme", &self.scheme)
            .field("authority", &self.authority)
            .field("base_path", &self.base_path)
            .finish()
    }
}

fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    let forwarded = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };

    if let Ok(value) = HeaderValue::from_str(&forwarded) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(backend: &str, uri: &str) -> String {
        tokio_test::block_on(async move {
            let upstream = HttpUpstream::new(backend).unwrap();
            upstream.target(&uri.parse().unwrap()).unwrap().to_string()
        })
    }

    #[test]
    fn joins_backend_and_request() {
        assert_eq!(
            target("http://localhost:9200", "/_cluster/health"),
            "http://localhost:9200/_cluster/health"
        );
        assert_eq!(
            target("http://localhost:9200/es/", "/_search?q=x"),
            "http://localhost:9200/es/_search?q=x"
        );
        assert_eq!(
            target("http://localhost:9200/es", "/_search"),
            "http://localhost:9200/es/_search"
        );
        assert_eq!(
            target("http://localhost:9200/?pretty", "/_search?q=x"),
            "http://localhost:9200/_search?pretty&q=x"
        );
    }

    #[test]
    fn rejects_bad_backend() {
        tokio_test::block_on(async move {
            for backend in ["localhost:9200", "https://localhost:9200", "/just/a/path", "http://"] {
                let err = HttpUpstream::new(backend).unwrap_err();
                assert!(
                    matches!(err.kind(), ErrorKind::InvalidBackend { .. }),
                    "{}: {:?}",
                    backend,
                    err
                );
            }
        });
    }

    #[test]
    fn forwarded_for_appends() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1".parse().unwrap());
        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.1");

        append_forwarded_for(&mut headers, "10.0.0.2".parse().unwrap());
        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.1, 10.0.0.2");
    }
}
