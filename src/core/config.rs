use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::common::{warn, Error, ErrorKind, Result};
use crate::core::{AuthorizationStore, CredentialStore, RuleSet};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    // Basic auth realm sent with the 401 challenge.
    realm: Option<String>,
    #[serde(default)]
    pub credentials: CredentialSource,
    #[serde(default)]
    pub authorizations: AuthorizationSource,
}

impl Config {
    pub const DEFAULT_REALM: &'static str = "Elasticsearch";

    pub fn realm(&self) -> &str {
        self.realm.as_deref().unwrap_or(Config::DEFAULT_REALM)
    }

    pub fn set_realm(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.realm = Some(val)
        }
    }

    pub fn set_credentials_path(&mut self, val: &mut Option<PathBuf>) {
        if let Some(val) = val.take() {
            self.credentials.path = Some(val)
        }
    }

    pub fn set_authorizations_path(&mut self, val: &mut Option<PathBuf>) {
        if let Some(val) = val.take() {
            self.authorizations.path = Some(val)
        }
    }

    pub(crate) fn override_merge(&mut self, other: &mut Config) {
        self.set_realm(&mut other.realm);
        // A path given on the command line replaces inline entries. A file
        // naming both is left as is and rejected at load.
        if other.credentials.path.is_some() {
            self.credentials.users = None;
        }
        if other.authorizations.path.is_some() {
            self.authorizations.rules = None;
        }
        self.set_credentials_path(&mut other.credentials.path);
        self.set_authorizations_path(&mut other.authorizations.path);
    }
}

/// Either a `username:password_hash` file or inline `username -> hash` entries.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CredentialSource {
    pub path: Option<PathBuf>,
    pub users: Option<HashMap<String, String>>,
}

impl CredentialSource {
    pub async fn load(&self) -> Result<CredentialStore> {
        match (&self.path, &self.users) {
            (Some(_), Some(_)) => Err(Error::from(ErrorKind::AmbiguousSource {
                store: "credentials",
            })),
            (Some(path), None) => CredentialStore::from_path(path).await,
            (None, Some(users)) => Ok(CredentialStore::from_map(users.clone())),
            (None, None) => {
                warn!("No credentials configured, every request will be rejected");
                Ok(CredentialStore::default())
            }
        }
    }
}

/// Either a `username:allow|deny:VERB PATH...` file or inline rule sets.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AuthorizationSource {
    pub path: Option<PathBuf>,
    pub rules: Option<HashMap<String, RuleSet>>,
}

impl AuthorizationSource {
    pub async fn load(&self) -> Result<AuthorizationStore> {
        match (&self.path, &self.rules) {
            (Some(_), Some(_)) => Err(Error::from(ErrorKind::AmbiguousSource {
                store: "authorizations",
            })),
            (Some(path), None) => AuthorizationStore::from_path(path).await,
            (None, Some(rules)) => Ok(AuthorizationStore::from_map(rules.clone())),
            (None, None) => {
                warn!("No authorizations configured, every request will be denied");
                Ok(AuthorizationStore::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash;

    #[test]
    fn inline_sources() {
        tokio_test::block_on(async move {
            let config: Config = serde_yaml::from_str(&format!(
                r#"
realm: Search
credentials:
  users:
    foo: {}
authorizations:
  rules:
    foo:
      default: allow
      exceptions:
        - GET /_cluster/health
"#,
                hash("bar")
            ))
            .unwrap();

            assert_eq!(config.realm(), "Search");

            let credentials = config.credentials.load().await.unwrap();
            assert!(credentials.verify("foo", "bar"));

            let authorizations = config.authorizations.load().await.unwrap();
            assert_eq!(
                authorizations.get("foo"),
                Some(&RuleSet::allow(["GET /_cluster/health"]))
            );
        });
    }

    #[test]
    fn ambiguous_source() {
        tokio_test::block_on(async move {
            let source = CredentialSource {
                path: Some("credentials.txt".into()),
                users: Some(HashMap::new()),
            };
            let err = source.load().await.unwrap_err();
            assert!(matches!(
                err.kind(),
                ErrorKind::AmbiguousSource {
                    store: "credentials"
                }
            ));
        });
    }

    #[test]
    fn empty_sources_fail_closed() {
        tokio_test::block_on(async move {
            let config = Config::default();

            assert_eq!(config.realm(), Config::DEFAULT_REALM);
            assert!(config.credentials.load().await.unwrap().is_empty());
            assert!(config.authorizations.load().await.unwrap().is_empty());
        });
    }

    #[test]
    fn command_line_path_replaces_inline() {
        let mut config = Config {
            credentials: CredentialSource {
                path: None,
                users: Some(HashMap::new()),
            },
            ..Default::default()
        };
        let mut other = Config::default();
        other.set_credentials_path(&mut Some("credentials.txt".into()));

        config.override_merge(&mut other);

        assert_eq!(
            config.credentials.path,
            Some(PathBuf::from("credentials.txt"))
        );
        assert!(config.credentials.users.is_none());
    }

    #[test]
    fn file_naming_path_and_inline_stays_ambiguous() {
        tokio_test::block_on(async move {
            let mut config: Config = serde_yaml::from_str(
                r#"
credentials:
  path: credentials.txt
  users:
    foo: "0000"
authorizations:
  path: authorizations.txt
  rules:
    foo:
      default: allow
"#,
            )
            .unwrap();

            // No flags given.
            config.override_merge(&mut Config::default());

            assert!(config.credentials.users.is_some());
            assert!(config.authorizations.rules.is_some());
            let err = config.credentials.load().await.unwrap_err();
            assert!(matches!(
                err.kind(),
                ErrorKind::AmbiguousSource {
                    store: "credentials"
                }
            ));
            let err = config.authorizations.load().await.unwrap_err();
            assert!(matches!(
                err.kind(),
                ErrorKind::AmbiguousSource {
                    store: "authorizations"
                }
            ));
        });
    }
}
