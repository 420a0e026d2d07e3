use crate::core::{AuthorizationStore, Shared};

/// Evaluates a user's [`RuleSet`](crate::core::RuleSet) against a request.
#[derive(Debug, Clone)]
pub struct AuthorizationChecker {
    authorizations: Shared<AuthorizationStore>,
}

impl AuthorizationChecker {
    pub fn new(authorizations: Shared<AuthorizationStore>) -> Self {
        Self { authorizations }
    }

    /// Whether `username` may send `verb` to `path`.
    ///
    /// Fails closed: an empty username, or a user without configured rules,
    /// is denied everything. Matching is exact; callers wanting prefix
    /// semantics have to normalize `path` first.
    pub fn check(&self, username: &str, verb: &str, path: &str) -> bool {
        if username.is_empty() {
            return false;
        }

        let authorizations = self.authorizations.load();
        match authorizations.get(username) {
            Some(rules) if !rules.is_empty() => rules.allows(verb, path),
            _ => false,
        }
    }
}
