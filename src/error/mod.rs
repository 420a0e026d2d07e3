mod internal;

pub use self::internal::{Error, ErrorKind};
