use http::{Request, Response};

use crate::common::{error, info, Result};
use crate::core::access_log::AccessLog;
use crate::core::middleware::MiddlewareChain;
use crate::core::{
    AuthenticationChecker, AuthorizationChecker, AuthorizationStore, Config, CredentialStore,
    Shared,
};
use crate::upstream::Upstream;
use crate::Body;

#[derive(Default)]
pub struct Builder {
    credentials: CredentialStore,
    authorizations: AuthorizationStore,
    realm: Option<String>,
    access_log: Option<AccessLog>,
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    /// Load both stores from `config`. Any load error aborts the build.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let credentials = config.credentials.load().await?;
        let authorizations = config.authorizations.load().await?;
        info!(
            users = credentials.len(),
            rules = authorizations.len(),
            realm = config.realm(),
            "Stores loaded"
        );

        Ok(Builder::new()
            .credentials(credentials)
            .authorizations(authorizations)
            .realm(config.realm()))
    }

    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn authorizations(mut self, authorizations: AuthorizationStore) -> Self {
        self.authorizations = authorizations;
        self
    }

    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn access_log(mut self, access_log: AccessLog) -> Self {
        self.access_log = Some(access_log);
        self
    }

    pub fn build<U>(self, upstream: U) -> Gatekeeper<U>
    where
        U: Upstream + 'static,
    {
        let credentials = Shared::new(self.credentials);
        let authorizations = Shared::new(self.authorizations);

        let chain = MiddlewareChain::new(
            AuthenticationChecker::new(credentials.clone()),
            AuthorizationChecker::new(authorizations.clone()),
            self.realm
                .unwrap_or_else(|| Config::DEFAULT_REALM.to_owned()),
            self.access_log.unwrap_or_else(AccessLog::disabled),
            upstream,
        );

        Gatekeeper {
            credentials,
            authorizations,
            chain,
        }
    }
}

/// Authenticates, authorizes and forwards requests.
///
/// Owns the live credential and authorization stores; both can be replaced
/// while requests are in flight.
pub struct Gatekeeper<U> {
    credentials: Shared<CredentialStore>,
    authorizations: Shared<AuthorizationStore>,
    chain: MiddlewareChain<U>,
}

impl<U> Gatekeeper<U>
where
    U: Upstream + 'static,
{
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        self.chain.apply(request).await
    }

    pub fn credentials(&self) -> &Shared<CredentialStore> {
        &self.credentials
    }

    pub fn authorizations(&self) -> &Shared<AuthorizationStore> {
        &self.authorizations
    }

    /// Reload both stores from their sources.
    ///
    /// Each store is swapped only if it loads cleanly; on error the store in
    /// use stays active.
    pub async fn reload(&self, config: &Config) {
        match config.credentials.load().await {
            Ok(credentials) => {
                info!(users = credentials.len(), "Credentials reloaded");
                self.credentials.swap(credentials);
            }
            Err(err) => error!(cause = %err, "Reload credentials, keeping previous"),
        }

        match config.authorizations.load().await {
            Ok(authorizations) => {
                info!(rules = authorizations.len(), "Authorizations reloaded");
                self.authorizations.swap(authorizations);
            }
            Err(err) => error!(cause = %err, "Reload authorizations, keeping previous"),
        }
    }
}
