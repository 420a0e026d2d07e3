use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::common::{debug, Error, ErrorKind, Result};

/// What a [`RuleSet`] does with requests not listed in its exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAction {
    /// Exceptions are a blacklist.
    Allow,
    /// Exceptions are a whitelist.
    #[default]
    Deny,
}

impl FromStr for DefaultAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(DefaultAction::Allow),
            "deny" => Ok(DefaultAction::Deny),
            other => Err(format!("default rule must be `allow` or `deny`, got {:?}", other)),
        }
    }
}

impl fmt::Display for DefaultAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DefaultAction::Allow => f.write_str("allow"),
            DefaultAction::Deny => f.write_str("deny"),
        }
    }
}

/// Per user policy: a default action plus exact `"VERB PATH"` exceptions.
///
/// The default value (deny, no exceptions) is the "empty" rule set, which a
/// user without any configured policy gets and which denies everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuleSet {
    #[serde(rename = "default")]
    default_action: DefaultAction,
    #[serde(default)]
    exceptions: HashSet<String>,
}

impl RuleSet {
    pub fn new<I, S>(default_action: DefaultAction, exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            default_action,
            exceptions: exceptions.into_iter().map(Into::into).collect(),
        }
    }

    /// Everything allowed except `exceptions`.
    pub fn allow<I, S>(exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuleSet::new(DefaultAction::Allow, exceptions)
    }

    /// Everything denied except `exceptions`.
    pub fn deny<I, S>(exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuleSet::new(DefaultAction::Deny, exceptions)
    }

    pub fn default_action(&self) -> DefaultAction {
        self.default_action
    }

    pub fn exceptions(&self) -> impl Iterator<Item = &str> {
        self.exceptions.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.default_action == DefaultAction::Deny && self.exceptions.is_empty()
    }

    /// Exact, case sensitive membership of `"<verb> <path>"`.
    pub fn has_rule(&self, verb: &str, path: &str) -> bool {
        self.exceptions.contains(&canonical_rule(verb, path))
    }

    pub fn allows(&self, verb: &str, path: &str) -> bool {
        match self.default_action {
            DefaultAction::Allow => !self.has_rule(verb, path),
            DefaultAction::Deny => self.has_rule(verb, path),
        }
    }
}

pub fn canonical_rule(verb: &str, path: &str) -> String {
    let mut rule = String::with_capacity(verb.len() + path.len() + 1);
    rule.push_str(verb);
    rule.push(' ');
    rule.push_str(path);
    rule
}

/// Username to [`RuleSet`] mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationStore {
    rules: HashMap<String, RuleSet>,
}

impl AuthorizationStore {
    pub fn from_map<I, U>(rules: I) -> Self
    where
        I: IntoIterator<Item = (U, RuleSet)>,
        U: Into<String>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|(user, rule_set)| (user.into(), rule_set))
                .collect(),
        }
    }

    /// Read newline separated `username:allow|deny:VERB PATH:VERB PATH...` records.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        AuthorizationStore::parse(&text)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| Error::path(path, err))?;

        let store = AuthorizationStore::parse(&text)?;
        debug!(path = %path.display(), users = store.len(), "Authorizations loaded");

        Ok(store)
    }

    pub(crate) fn parse(text: &str) -> Result<Self> {
        let mut rules = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let malformed = |description: String| {
                Error::from(ErrorKind::MalformedAuthorization {
                    line: index + 1,
                    description,
                })
            };

            let mut fields = line.split(':');
            let (user, default_action) = match (fields.next(), fields.next()) {
                (Some(user), Some(default_action)) if !user.is_empty() => (user, default_action),
                _ => {
                    return Err(malformed(
                        "expected `username:allow|deny[:VERB PATH...]`".to_owned(),
                    ))
                }
            };
            let default_action = default_action
                .trim()
                .parse::<DefaultAction>()
                .map_err(malformed)?;
            let exceptions = fields.map(str::trim).filter(|rule| !rule.is_empty());

            rules.insert(user.to_owned(), RuleSet::new(default_action, exceptions));
        }

        Ok(Self { rules })
    }

    pub fn get(&self, username: &str) -> Option<&RuleSet> {
        self.rules.get(username)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_empty() {
        assert!(RuleSet::default().is_empty());
        assert!(RuleSet::deny(Vec::<String>::new()).is_empty());
        assert!(!RuleSet::allow(Vec::<String>::new()).is_empty());
        assert!(!RuleSet::deny(["GET /foo"]).is_empty());
    }

    #[test]
    fn has_rule_is_exact() {
        let rules = RuleSet::allow(["GET /foobar"]);

        assert!(rules.has_rule("GET", "/foobar"));
        assert!(!rules.has_rule("GET", "bar"));
        assert!(!rules.has_rule("get", "/foobar"));
        assert!(!rules.has_rule("GET", "/foobar/"));
    }

    #[test]
    fn exceptions_match_decoded_paths() {
        use crate::core::request::decoded_path;

        let blacklist = RuleSet::allow(["GET /_cluster/health"]);
        let whitelist = RuleSet::deny(["GET /_cluster/health"]);

        for raw in [
            "/_cluster/%68ealth",
            "/_cluster/./health",
            "/_cluster//health",
            "/_nodes/../_cluster/health",
            "/%5Fcluster/health",
        ] {
            // Matching is exact, so only the decoded form hits.
            assert!(blacklist.allows("GET", raw), "{}", raw);

            let path = decoded_path(raw).unwrap();
            assert!(!blacklist.allows("GET", &path), "{}", raw);
            assert!(whitelist.allows("GET", &path), "{}", raw);
        }

        let path = decoded_path("/_cluster/health/").unwrap();
        assert!(blacklist.allows("GET", &path));
        assert!(!whitelist.allows("GET", &path));
    }

    #[test]
    fn whitelist() {
        let rules = RuleSet::deny(["GET /foobar"]);

        assert!(rules.allows("GET", "/foobar"));
        assert!(!rules.allows("GET", "/foobars"));
        assert!(!rules.allows("POST", "/foobar"));
    }

    #[test]
    fn blacklist() {
        let rules = RuleSet::allow(["GET /foobar"]);

        assert!(!rules.allows("GET", "/foobar"));
        assert!(rules.allows("GET", "/foobars"));
        assert!(rules.allows("POST", "/foobar"));
    }

    #[test]
    fn parse_records() {
        let store = AuthorizationStore::from_reader(
            "foo:allow:GET /_cluster/health\nbaz:deny:GET /_cluster/health:POST /_search\nqux:allow\n"
                .as_bytes(),
        )
        .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(
            store.get("foo"),
            Some(&RuleSet::allow(["GET /_cluster/health"]))
        );
        assert_eq!(
            store.get("baz"),
            Some(&RuleSet::deny(["GET /_cluster/health", "POST /_search"]))
        );
        assert_eq!(store.get("qux"), Some(&RuleSet::allow(Vec::<String>::new())));
        assert_eq!(store.get("nobody"), None);
    }

    #[test]
    fn parse_rejects_missing_default() {
        let err = AuthorizationStore::from_reader("foo:allow\nbar\n".as_bytes()).unwrap_err();

        match err.kind() {
            ErrorKind::MalformedAuthorization { line, .. } => assert_eq!(*line, 2),
            kind => panic!("unexpected error {:?}", kind),
        }
    }

    #[test]
    fn parse_rejects_unknown_default() {
        let err = AuthorizationStore::from_reader("foo:maybe:GET /".as_bytes()).unwrap_err();

        match err.kind() {
            ErrorKind::MalformedAuthorization { line, description } => {
                assert_eq!(*line, 1);
                assert!(description.contains("maybe"));
            }
            kind => panic!("unexpected error {:?}", kind),
        }
    }

    #[test]
    fn deserialize_rule_set() {
        let rules: RuleSet =
            serde_yaml::from_str("default: allow\nexceptions:\n  - GET /_cluster/health\n")
                .unwrap();
        assert_eq!(rules, RuleSet::allow(["GET /_cluster/health"]));

        let rules: RuleSet = serde_yaml::from_str("default: deny\n").unwrap();
        assert!(rules.is_empty());
    }
}
