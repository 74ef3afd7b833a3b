//! Error type for the geodb library.
use std::fmt;

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The kinds of failure a `geodb` operation can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An argument failed validation: bad CIDR syntax, an out-of-range
    /// prefix length, a reserved/special address, a malformed country code.
    InvalidArgument(String),

    /// A lookup (AS number, country code, network) found nothing.
    NotFound(String),

    /// An insert collided with an entry that already exists.
    AlreadyPresent(String),

    /// A bounded collection, such as `NetworkList`, is full.
    CapacityExceeded(String),

    /// An internal allocation failed or a derived size overflowed.
    OutOfMemory(String),

    /// Failure reading or writing the underlying file.
    Io(String),

    /// The on-disk data is not a valid database: bad magic, unsupported
    /// version, truncated section, offset out of bounds.
    Format(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::AlreadyPresent(msg) => write!(f, "already present: {}", msg),
            Error::CapacityExceeded(msg) => write!(f, "capacity exceeded: {}", msg),
            Error::OutOfMemory(msg) => write!(f, "out of memory: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Format(msg) => write!(f, "format error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::InvalidArgument("prefix out of range".to_string());
        assert_eq!(err.to_string(), "invalid argument: prefix out of range");
    }

    #[test]
    fn io_error_roundtrips_through_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
