use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::common::{debug, Error, ErrorKind, Result};

/// Hex encoded SHA-256 digest of a plaintext password.
///
/// This is the only form in which passwords are stored.
pub fn hash(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Username to password hash mapping.
///
/// Built once from a source and never mutated afterwards; reloading builds a
/// fresh store (see [`Shared`](crate::core::Shared)).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    /// Build from a ready-made `username -> password_hash` mapping.
    pub fn from_map<I, U, H>(users: I) -> Self
    where
        I: IntoIterator<Item = (U, H)>,
        U: Into<String>,
        H: Into<String>,
    {
        Self {
            users: users
                .into_iter()
                .map(|(user, hash)| (user.into(), hash.into()))
                .collect(),
        }
    }

    /// Build from `username -> plaintext` pairs, hashing each password.
    pub fn from_plaintext<I, U, P>(users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: AsRef<str>,
    {
        CredentialStore::from_map(
            users
                .into_iter()
                .map(|(user, password)| (user.into(), hash(password.as_ref()))),
        )
    }

    /// Read newline separated `username:password_hash` records.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        CredentialStore::parse(&text)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| Error::path(path, err))?;

        let store = CredentialStore::parse(&text)?;
        debug!(path = %path.display(), users = store.len(), "Credentials loaded");

        Ok(store)
    }

    pub(crate) fn parse(text: &str) -> Result<Self> {
        let mut users = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split(':');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(user), Some(hash), None) if !user.is_empty() && !hash.is_empty() => {
                    // Later records for the same user win.
                    users.insert(user.to_owned(), hash.to_owned());
                }
                _ => {
                    return Err(Error::from(ErrorKind::MalformedCredential {
                        line: index + 1,
                        description: "expected `username:password_hash`".to_owned(),
                    }))
                }
            }
        }

        Ok(Self { users })
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.users.get(username).map(String::as_str)
    }

    /// Check a plaintext password against the stored hash of `username`.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.get(username) {
            Some(stored) => hash(password).as_bytes().ct_eq(stored.as_bytes()).into(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

// Hashes stay out of logs.
impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut users: Vec<&str> = self.users.keys().map(String::as_str).collect();
        users.sort_unstable();
        f.debug_struct("CredentialStore")
            .field("users", &users)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    const FOO_BAR: &str = "fcde2b2edba56bf408601fb721fe9b5c338d10ee429ea04fae5511b68fbf8fb9";
    const BAZ_BOO: &str = "6446d58d6dfafd58586d3ea85a53f4a6b3cc057f933a22bb58e188a74ac8f663";

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "won't happen"))
        }
    }

    #[test]
    fn hash_golden_vectors() {
        assert_eq!(
            hash("sample"),
            "af2bdbe1aa9b6ec1e2ade1d694f41fc71a831d0268e9891562113d8a62add1bf"
        );
        assert_eq!(hash("bar"), FOO_BAR);
        assert_eq!(hash("boo"), BAZ_BOO);
        assert_eq!(hash("sample"), hash("sample"));
    }

    #[test]
    fn from_plaintext_stores_hashes() {
        let store = CredentialStore::from_plaintext([("foo", "bar"), ("baz", "boo")]);

        assert_eq!(store.get("foo"), Some(FOO_BAR));
        assert_eq!(store.get("baz"), Some(BAZ_BOO));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn from_reader() {
        let text = format!("foo:{}\nbaz:{}\n", FOO_BAR, BAZ_BOO);
        let store = CredentialStore::from_reader(text.as_bytes()).unwrap();

        assert_eq!(store.get("foo"), Some(FOO_BAR));
        assert_eq!(store.get("baz"), Some(BAZ_BOO));
    }

    #[test]
    fn from_reader_propagates_read_error() {
        let err = CredentialStore::from_reader(FailingReader).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
    }

    #[test]
    fn malformed_line_fails_with_line_number() {
        let text = format!("foo:{}\nbaz\n", FOO_BAR);
        let err = CredentialStore::from_reader(text.as_bytes()).unwrap_err();

        match err.kind() {
            ErrorKind::MalformedCredential { line, .. } => assert_eq!(*line, 2),
            kind => panic!("unexpected error {:?}", kind),
        }
    }

    #[test]
    fn extra_separator_is_malformed() {
        let err = CredentialStore::from_reader("foo:abc:def".as_bytes()).unwrap_err();
        assert!(err.is_malformed_source());

        let err = CredentialStore::from_reader(":abc".as_bytes()).unwrap_err();
        assert!(err.is_malformed_source());
    }

    #[test]
    fn last_record_wins() {
        let text = format!("foo:{}\nfoo:{}\n", FOO_BAR, BAZ_BOO);
        let store = CredentialStore::from_reader(text.as_bytes()).unwrap();

        assert_eq!(store.get("foo"), Some(BAZ_BOO));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn verify() {
        let store = CredentialStore::from_plaintext([("foo", "bar")]);

        assert!(store.verify("foo", "bar"));
        assert!(!store.verify("foo", "bogus"));
        assert!(!store.verify("nobody", "bar"));
        assert!(!store.verify("", ""));
    }

    #[test]
    fn from_path() {
        tokio_test::block_on(async move {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("credentials.txt");
            std::fs::write(&path, format!("foo:{}\n", FOO_BAR)).unwrap();

            let store = CredentialStore::from_path(&path).await.unwrap();
            assert_eq!(store.get("foo"), Some(FOO_BAR));

            let err = CredentialStore::from_path(dir.path().join("missing.txt"))
                .await
                .unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::Path { .. }));
        });
    }

    #[test]
    fn debug_omits_hashes() {
        let store = CredentialStore::from_plaintext([("foo", "bar")]);
        let debug = format!("{:?}", store);

        assert!(debug.contains("foo"));
        assert!(!debug.contains(FOO_BAR));
    }
}
