use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tokio::net::TcpListener;

use crate::common::{info, warn, Error, Result};
use crate::config::Config;
use crate::core::{self, access_log::AccessLog, Gatekeeper};
use crate::server::frontend::Server;
use crate::upstream::{HttpUpstream, Upstream};

// Upper bound for draining the access log on shutdown.
const ACCESS_LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct Initializer {
    pub config: Config,
    listener: Option<TcpListener>,
}

impl Initializer {
    pub async fn load_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = fs::File::open(path)
            .await
            .map_err(|err| Error::path(path, err))?;
        let config = serde_yaml::from_reader::<_, Config>(f.into_std().await)?;

        Ok(Initializer::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            listener: None,
        }
    }

    /// Serve on an already bound listener instead of binding the configured
    /// address.
    pub fn set_listener(&mut self, listener: TcpListener) {
        self.listener = Some(listener);
    }

    /// Load the stores, bind and serve until `shutdown` completes.
    ///
    /// Every load error surfaces here, before the first connection is
    /// accepted.
    pub async fn run_guardian(self, shutdown: impl Future) -> Result<()> {
        let Initializer { config, listener } = self;

        let upstream = HttpUpstream::new(config.server.backend())?;
        let builder = core::Builder::from_config(&config.guardian).await?;

        let (access_log, access_log_handle) = AccessLog::spawn(AccessLog::DEFAULT_CAPACITY);
        let gatekeeper = Arc::new(builder.access_log(access_log.clone()).build(upstream));

        let listener = match listener {
            Some(listener) => listener,
            None => TcpListener::bind(config.server.listen_addr()).await?,
        };
        info!(addr = %listener.local_addr()?, "Listening");

        let reload = tokio::spawn(reload_on_hangup(
            Arc::clone(&gatekeeper),
            config.guardian.clone(),
        ));

        let server = Server::new(config.server);
        let result = server.run(gatekeeper, listener, shutdown).await;

        reload.abort();
        let _ = reload.await;

        let dropped = access_log.dropped();
        if dropped > 0 {
            warn!(dropped, "Access log records dropped");
        }
        // Every sender is gone once the gatekeeper and this handle are dropped.
        drop(access_log);
        if tokio::time::timeout(ACCESS_LOG_DRAIN_TIMEOUT, access_log_handle)
            .await
            .is_err()
        {
            warn!("Access log not drained before shutdown");
        }

        result
    }
}

#[cfg(unix)]
async fn reload_on_hangup<U>(gatekeeper: Arc<Gatekeeper<U>>, config: core::Config)
where
    U: Upstream + 'static,
{
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(err) => {
            warn!(cause = %err, "SIGHUP handler not installed, reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("SIGHUP received, reloading stores");
        gatekeeper.reload(&config).await;
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup<U>(_gatekeeper: Arc<Gatekeeper<U>>, _config: core::Config)
where
    U: Upstream + 'static,
{
}
