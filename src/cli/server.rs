use std::path::PathBuf;

use clap::Args;

use crate::common::debug;
use crate::config::{Config, Initializer, ServerConfig};
use crate::core;
use crate::Result;

/// Running guardian server
#[derive(Args, Debug)]
pub struct ServerCommand {
    /// Configuration file path
    #[arg(long, short = 'C', env = "GUARDIAN_CONFIG")]
    config: Option<PathBuf>,
    /// Backend url requests are forwarded to [default: http://localhost:9200]
    #[arg(long, env = "GUARDIAN_BACKEND")]
    backend: Option<String>,
    /// Listen address, a bare ":port" listens on every interface [default: :9600]
    #[arg(long, env = "GUARDIAN_FRONTEND")]
    frontend: Option<String>,
    /// Basic auth realm [default: Elasticsearch]
    #[arg(long, env = "GUARDIAN_REALM")]
    realm: Option<String>,
    /// Credential file path, lines of "username:sha256hex"
    #[arg(long, env = "GUARDIAN_CPATH")]
    cpath: Option<PathBuf>,
    /// Authorization file path, lines of "username:allow|deny:VERB PATH:..."
    #[arg(long, env = "GUARDIAN_APATH")]
    apath: Option<PathBuf>,
    /// Max concurrent connections
    #[arg(long, env = "GUARDIAN_MAX_CONNECTIONS")]
    max_connections: Option<u32>,
    /// Tls server certificate file path
    #[arg(long, env = "GUARDIAN_TLS_CERT")]
    tls_cert: Option<PathBuf>,
    /// Tls server private key file path
    #[arg(long, env = "GUARDIAN_TLS_KEY")]
    tls_key: Option<PathBuf>,
}

impl ServerCommand {
    /// Config file values overridden by command line values.
    pub async fn initializer(self) -> Result<Initializer> {
        let ServerCommand {
            config,
            mut backend,
            mut frontend,
            mut realm,
            mut cpath,
            mut apath,
            max_connections,
            mut tls_cert,
            mut tls_key,
        } = self;

        let mut initializer = match config {
            Some(path) => Initializer::load_config_file(path).await?,
            None => Initializer::from_config(Config::default()),
        };

        let mut server = {
            let mut server = ServerConfig::default();

            server.set_max_connections(max_connections);
            server.set_backend(&mut backend);
            server.set_frontend(&mut frontend)?;
            server.set_tls_certificate(&mut tls_cert);
            server.set_tls_key(&mut tls_key);
            server
        };

        let mut guardian = {
            let mut guardian = core::Config::default();

            guardian.set_realm(&mut realm);
            guardian.set_credentials_path(&mut cpath);
            guardian.set_authorizations_path(&mut apath);
            guardian
        };

        initializer.config.server.override_merge(&mut server);
        initializer.config.guardian.override_merge(&mut guardian);

        debug!("{:?}", initializer);

        Ok(initializer)
    }

    pub async fn run(self) -> Result<()> {
        self.initializer()
            .await?
            .run_guardian(tokio::signal::ctrl_c())
            .await
    }
}
