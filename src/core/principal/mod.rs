mod user;
pub use user::User;

/// Identity attached to a request once the gatekeeper has looked at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    AnonymousUser,
    User(User),
}

impl Principal {
    pub fn user(name: impl Into<String>) -> Self {
        Principal::User(User { name: name.into() })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::User(_))
    }

    /// Authenticated username, empty for anonymous requests.
    pub fn name(&self) -> &str {
        match self {
            Principal::AnonymousUser => "",
            Principal::User(user) => &user.name,
        }
    }
}

impl Default for Principal {
    fn default() -> Self {
        Principal::AnonymousUser
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_empty_name() {
        let principal = Principal::default();

        assert!(!principal.is_authenticated());
        assert_eq!(principal.name(), "");
    }

    #[test]
    fn user() {
        let principal = Principal::user("foo");

        assert!(principal.is_authenticated());
        assert_eq!(principal.name(), "foo");
    }
}
