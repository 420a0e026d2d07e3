use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use backtrace::Backtrace;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    backtrace: Option<Backtrace>,
}

#[derive(Debug)]
pub enum ErrorKind {
    Io(io::Error),
    // A file named by configuration could not be opened or read.
    Path { path: PathBuf, source: io::Error },
    Yaml(serde_yaml::Error),
    // line is 1-based.
    MalformedCredential { line: usize, description: String },
    MalformedAuthorization { line: usize, description: String },
    // Both a file path and inline data were given for the same store.
    AmbiguousSource { store: &'static str },
    InvalidBackend { url: String, description: String },
    InvalidConfig(String),
    Tls(String),
    Hyper(hyper::Error),
    Upstream(hyper_util::client::legacy::Error),
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ErrorKind::Io(err) => err.fmt(f),
            ErrorKind::Path { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            ErrorKind::Yaml(err) => write!(f, "config: {}", err),
            ErrorKind::MalformedCredential { line, description } => {
                write!(f, "credentials line {}: {}", line, description)
            }
            ErrorKind::MalformedAuthorization { line, description } => {
                write!(f, "authorizations line {}: {}", line, description)
            }
            ErrorKind::AmbiguousSource { store } => write!(
                f,
                "{} source specifies both a path and inline entries",
                store
            ),
            ErrorKind::InvalidBackend { url, description } => {
                write!(f, "invalid backend url {:?}: {}", url, description)
            }
            ErrorKind::InvalidConfig(description) => write!(f, "invalid config: {}", description),
            ErrorKind::Tls(description) => write!(f, "tls: {}", description),
            ErrorKind::Hyper(err) => err.fmt(f),
            ErrorKind::Upstream(err) => write!(f, "upstream: {}", err),
            ErrorKind::Internal(description) => write!(f, "internal error: {}", description),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::from(ErrorKind::Io(err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::from(ErrorKind::Yaml(err))
    }
}

impl From<hyper::Error> for Error {
    fn from(err: hyper::Error) -> Self {
        Error::from(ErrorKind::Hyper(err))
    }
}

impl From<hyper_util::client::legacy::Error> for Error {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Error::from(ErrorKind::Upstream(err))
    }
}

impl From<tokio_rustls::rustls::Error> for Error {
    fn from(err: tokio_rustls::rustls::Error) -> Self {
        Error::from(ErrorKind::Tls(err.to_string()))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::with_backtrace(kind)
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_ref()
    }

    /// Whether the error comes from malformed credential or authorization data.
    pub fn is_malformed_source(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedCredential { .. } | ErrorKind::MalformedAuthorization { .. }
        )
    }

    pub(crate) fn path(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::from(ErrorKind::Path {
            path: path.into(),
            source,
        })
    }

    fn with_backtrace(kind: ErrorKind) -> Self {
        Self {
            kind,
            backtrace: Some(Backtrace::new()),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Io(err) => Some(err),
            ErrorKind::Path { source, .. } => Some(source),
            ErrorKind::Yaml(err) => Some(err),
            ErrorKind::Hyper(err) => Some(err),
            ErrorKind::Upstream(err) => Some(err),
            _ => None,
        }
    }
}
