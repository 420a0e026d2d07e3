use std::convert::Infallible;
use std::fs::File;
use std::future::Future;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use http::Request;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;
use tracing::info_span;
use tracing_futures::Instrument;

use crate::common::{debug, error, info, trace, warn, Error, ErrorKind, Result};
use crate::core::request::RemoteAddr;
use crate::core::Gatekeeper;
use crate::upstream::Upstream;

// Pause after a failed accept so a full fd table does not spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

// Server configuration.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    // Max concurrent connections.
    max_connections: Option<u32>,
    // Listen host, empty means every interface.
    listen_host: Option<String>,
    // Listen port.
    listen_port: Option<String>,
    // Backend url requests are forwarded to.
    backend: Option<String>,
    // tls server certificate file path
    tls_certificate: Option<PathBuf>,
    // tls server private key file path
    tls_key: Option<PathBuf>,
}

impl Config {
    const DEFAULT_MAX_CONNECTIONS: u32 = 1024 * 10;
    const DEFAULT_LISTEN_HOST: &'static str = "0.0.0.0";
    const DEFAULT_LISTEN_PORT: &'static str = crate::server::DEFAULT_PORT;
    pub const DEFAULT_BACKEND: &'static str = "http://localhost:9200";

    pub fn set_max_connections(&mut self, val: Option<u32>) {
        if let Some(val) = val {
            self.max_connections = Some(std::cmp::max(val, 1));
        }
    }
    pub fn set_listen_host(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.listen_host = Some(val)
        }
    }
    pub fn set_listen_port(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.listen_port = Some(val)
        }
    }
    pub fn set_backend(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.backend = Some(val)
        }
    }
    pub fn set_tls_certificate(&mut self, val: &mut Option<PathBuf>) {
        if let Some(val) = val.take() {
            self.tls_certificate = Some(val)
        }
    }
    pub fn set_tls_key(&mut self, val: &mut Option<PathBuf>) {
        if let Some(val) = val.take() {
            self.tls_key = Some(val)
        }
    }

    /// Set host and port from a `host:port` address. A bare `:port` listens on
    /// every interface.
    pub fn set_frontend(&mut self, val: &mut Option<String>) -> Result<()> {
        let Some(frontend) = val.take() else {
            return Ok(());
        };
        let (host, port) = frontend.rsplit_once(':').ok_or_else(|| {
            Error::from(ErrorKind::InvalidConfig(format!(
                "frontend {:?}: expected host:port",
                frontend
            )))
        })?;
        if port.parse::<u16>().is_err() {
            return Err(Error::from(ErrorKind::InvalidConfig(format!(
                "frontend {:?}: invalid port",
                frontend
            ))));
        }

        let host = if host.is_empty() {
            Config::DEFAULT_LISTEN_HOST
        } else {
            host
        };
        self.listen_host = Some(host.to_owned());
        self.listen_port = Some(port.to_owned());
        Ok(())
    }

    pub(crate) fn override_merge(&mut self, other: &mut Config) {
        self.set_max_connections(other.max_connections);
        self.set_listen_host(&mut other.listen_host);
        self.set_listen_port(&mut other.listen_port);
        self.set_backend(&mut other.backend);
        self.set_tls_certificate(&mut other.tls_certificate);
        self.set_tls_key(&mut other.tls_key);
    }

    fn max_connections(&self) -> u32 {
        match self.max_connections {
            Some(val) => val,
            None => Config::DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub(crate) fn listen_addr(&self) -> String {
        let host = match self.listen_host.as_deref() {
            Some(host) if !host.is_empty() => host,
            _ => Config::DEFAULT_LISTEN_HOST,
        };
        format!(
            "{}:{}",
            host,
            self.listen_port
                .as_deref()
                .unwrap_or(Config::DEFAULT_LISTEN_PORT),
        )
    }

    pub(crate) fn backend(&self) -> &str {
        self.backend.as_deref().unwrap_or(Config::DEFAULT_BACKEND)
    }

    /// Tls is served when both certificate and key are configured.
    pub(crate) fn tls_acceptor(&self) -> Result<Option<TlsAcceptor>> {
        let (certificate, key) = match (&self.tls_certificate, &self.tls_key) {
            (None, None) => return Ok(None),
            (Some(certificate), Some(key)) => (certificate, key),
            _ => {
                return Err(Error::from(ErrorKind::InvalidConfig(
                    "tls requires both certificate and key".to_owned(),
                )))
            }
        };

        let certs = load_certs(certificate)?;
        let key = load_key(key)?;

        let mut tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Some(TlsAcceptor::from(Arc::new(tls_config))))
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| Error::path(path, err))
}

fn load_certs(path: &Path) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<io::Result<Vec<_>>>()
        .map_err(|err| Error::path(path, err))?;
    if certs.is_empty() {
        return Err(Error::from(ErrorKind::Tls(format!(
            "{}: no certificate found",
            path.display()
        ))));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|err| Error::path(path, err))?
        .ok_or_else(|| {
            Error::from(ErrorKind::Tls(format!(
                "{}: no private key found",
                path.display()
            )))
        })
}

type ShutdownSignal = ();
type ShutdownCompleteSignal = ();

// Handle graceful shutdown.
struct GracefulShutdown {
    notify_shutdown: broadcast::Sender<ShutdownSignal>,
    shutdown_complete_tx: mpsc::Sender<ShutdownCompleteSignal>,
    shutdown_complete_rx: mpsc::Receiver<ShutdownCompleteSignal>,
}

impl GracefulShutdown {
    fn new() -> Self {
        let (notify_shutdown, _) = broadcast::channel(1);
        let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);

        Self {
            notify_shutdown,
            shutdown_complete_tx,
            shutdown_complete_rx,
        }
    }

    // Notify handlers of the shutdown and wait for it to be completed.
    async fn shutdown(mut self) {
        // Notify shutdown to all handler.
        drop(self.notify_shutdown);

        // Drop final Sender so the Receiver below can complete.
        drop(self.shutdown_complete_tx);

        // Wait for in-flight connections to finish.
        let _ = self.shutdown_complete_rx.recv().await;
    }
}

pub(crate) struct Server {
    config: Config,
    graceful_shutdown: GracefulShutdown,
}

impl Server {
    // Construct Server from config.
    pub(crate) fn new(config: Config) -> Self {
        Self {
            config,
            graceful_shutdown: GracefulShutdown::new(),
        }
    }

    pub(crate) async fn run<U>(
        mut self,
        gatekeeper: Arc<Gatekeeper<U>>,
        listener: TcpListener,
        shutdown: impl Future,
    ) -> Result<()>
    where
        U: Upstream + 'static,
    {
        // Tls setup errors abort before accepting anything.
        let tls_acceptor = self.config.tls_acceptor()?;

        tokio::select! {
            result = self.serve(gatekeeper, listener, tls_acceptor) => {
                if let Err(err) = result {
                    error!(cause = %err, "Failed to accept");
                }
            }
            _ = shutdown => {
                info!("Shutdown signal received");
            }
        }

        info!("Notify shutdown to all handlers");

        self.graceful_shutdown.shutdown().await;

        info!("Shutdown successfully completed");

        Ok(())
    }

    async fn serve<U>(
        &mut self,
        gatekeeper: Arc<Gatekeeper<U>>,
        listener: TcpListener,
        tls_acceptor: Option<TlsAcceptor>,
    ) -> Result<()>
    where
        U: Upstream + 'static,
    {
        info!(
            tls = tls_acceptor.is_some(),
            backend = self.config.backend(),
            "Server running. {:?}",
            self.config
        );

        let listener = SemaphoreListener::new(listener, self.config.max_connections());

        match tls_acceptor {
            None => loop {
                let Some((socket, handler)) = self.accept(&listener, gatekeeper.clone()).await? else {
                    continue;
                };
                let span = info_span!("connection", addr = %handler.remote_addr);

                tokio::spawn(handler.run(socket).instrument(span));
            },
            Some(tls_acceptor) => loop {
                let Some((socket, handler)) = self.accept(&listener, gatekeeper.clone()).await? else {
                    continue;
                };
                let acceptor = tls_acceptor.clone();
                let span = info_span!("connection", addr = %handler.remote_addr, tls = true);

                let connection = async move {
                    let stream = match acceptor.accept(socket).await {
                        Ok(stream) => stream,
                        Err(err) => {
                            error!("TLS: {}", err);
                            return;
                        }
                    };
                    trace!("TLS Handshake success");
                    handler.run(stream).await;
                };

                tokio::spawn(connection.instrument(span));
            },
        }
    }

    // Ok(None) is a failed accept worth retrying, like EMFILE or
    // ECONNABORTED. Only a closed connection limit ends the loop.
    async fn accept<U>(
        &mut self,
        listener: &SemaphoreListener,
        gatekeeper: Arc<Gatekeeper<U>>,
    ) -> Result<Option<(TcpStream, Handler<U>)>> {
        let (socket, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) if listener.is_closed() => return Err(err),
            Err(err) => {
                warn!(cause = %err, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                return Ok(None);
            }
        };
        debug!(
            addr = %peer_addr,
            available = listener.max_connections.available_permits(),
            "Connection accepted"
        );

        let handler = Handler {
            gatekeeper,
            remote_addr: peer_addr,
            shutdown: ShutdownSubscriber::new(
                self.graceful_shutdown.notify_shutdown.subscribe(),
                self.graceful_shutdown.shutdown_complete_tx.clone(),
            ),
            max_connections: listener.max_connections.clone(),
        };

        Ok(Some((socket, handler)))
    }
}

// Serves one connection. Requests on it run through the gatekeeper one at a
// time, in order.
struct Handler<U> {
    gatekeeper: Arc<Gatekeeper<U>>,
    remote_addr: SocketAddr,
    shutdown: ShutdownSubscriber,
    max_connections: Arc<Semaphore>,
}

impl<U> Handler<U>
where
    U: Upstream + 'static,
{
    async fn run<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if let Err(err) = self.serve(stream).await {
            debug!(cause = %err, "Connection closed");
        }
    }

    async fn serve<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let gatekeeper = Arc::clone(&self.gatekeeper);
        let remote_addr = self.remote_addr;

        let service = service_fn(move |request: Request<Incoming>| {
            let gatekeeper = Arc::clone(&gatekeeper);
            async move {
                let mut request = request.map(|body| body.boxed_unsync());
                request.extensions_mut().insert(RemoteAddr(remote_addr));

                Ok::<_, Infallible>(gatekeeper.handle(request).await)
            }
        });

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => return result.map_err(Error::from),
            _ = self.shutdown.recv() => {
                trace!("Finish in-flight request before shutdown");
                connection.as_mut().graceful_shutdown();
            }
        }

        connection.await.map_err(Error::from)
    }
}

impl<U> Drop for Handler<U> {
    fn drop(&mut self) {
        self.max_connections.add_permits(1);
    }
}

struct SemaphoreListener {
    inner: TcpListener,
    max_connections: Arc<Semaphore>,
}

impl SemaphoreListener {
    fn new(listener: TcpListener, max_connections: u32) -> Self {
        Self {
            inner: listener,
            max_connections: Arc::new(Semaphore::new(max_connections as usize)),
        }
    }

    async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        self.limited(self.inner.accept()).await
    }

    // Runs `accept` under a connection permit. The permit goes back to the
    // semaphore when `accept` fails, otherwise the Handler releases it.
    async fn limited<T>(&self, accept: impl Future<Output = io::Result<T>>) -> Result<T> {
        let permit = Arc::clone(&self.max_connections)
            .acquire_owned()
            .await
            .map_err(|err| Error::from(ErrorKind::Internal(err.to_string())))?;
        let accepted = accept.await?;
        permit.forget();
        Ok(accepted)
    }

    fn is_closed(&self) -> bool {
        self.max_connections.is_closed()
    }
}

struct ShutdownSubscriber {
    shutdown: bool,
    notify: broadcast::Receiver<ShutdownSignal>,
    // Notify completing shutdown process by dropping.
    _complete_tx: mpsc::Sender<ShutdownCompleteSignal>,
}

impl ShutdownSubscriber {
    fn new(
        notify: broadcast::Receiver<ShutdownSignal>,
        complete_tx: mpsc::Sender<ShutdownCompleteSignal>,
    ) -> Self {
        Self {
            shutdown: false,
            notify,
            _complete_tx: complete_tx,
        }
    }

    async fn recv(&mut self) {
        if self.shutdown {
            return;
        }

        match self.notify.recv().await {
            Ok(_) | Err(broadcast::error::RecvError::Closed) => (), // ok
            Err(err) => error!("shutdown notify receive error {}", err),
        }

        self.shutdown = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_address() {
        let mut config = Config::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:9600");

        config.set_frontend(&mut Some(":9700".into())).unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:9700");

        config
            .set_frontend(&mut Some("127.0.0.1:9800".into()))
            .unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:9800");

        for invalid in ["9600", "localhost:http", "localhost:"] {
            let err = config.set_frontend(&mut Some(invalid.into())).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::InvalidConfig(_)), "{}", invalid);
        }
    }

    #[test]
    fn override_merge_prefers_other() {
        let mut config: Config = serde_yaml::from_str(
            r#"
listen_port: "9601"
backend: http://es:9200
max_connections: 10
"#,
        )
        .unwrap();
        let mut other = Config::default();
        other.set_backend(&mut Some("http://other:9200".into()));
        other.set_max_connections(Some(0));

        config.override_merge(&mut other);

        assert_eq!(config.backend(), "http://other:9200");
        assert_eq!(config.max_connections(), 1);
        assert_eq!(config.listen_addr(), "0.0.0.0:9601");
    }

    #[test]
    fn tls_requires_certificate_and_key() {
        let mut config = Config::default();
        assert!(config.tls_acceptor().unwrap().is_none());

        config.set_tls_key(&mut Some("localhost.key".into()));
        let err = config.tls_acceptor().err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::InvalidConfig(_)));

        config.set_tls_certificate(&mut Some("/no/such/localhost.pem".into()));
        let err = config.tls_acceptor().err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::Path { .. }));
    }

    #[test]
    fn failed_accept_returns_permit() {
        tokio_test::block_on(async move {
            let listener =
                SemaphoreListener::new(TcpListener::bind("127.0.0.1:0").await.unwrap(), 1);

            let emfile = io::Error::other("too many open files");
            let err = listener
                .limited(async move { Err::<(), _>(emfile) })
                .await
                .unwrap_err();
            assert!(err.to_string().contains("too many open files"));
            assert_eq!(listener.max_connections.available_permits(), 1);
            assert!(!listener.is_closed());

            // A successful accept holds the permit until the Handler drops.
            listener.limited(async { Ok(()) }).await.unwrap();
            assert_eq!(listener.max_connections.available_permits(), 0);
        });
    }
}
