use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error reported by a random source.
pub type RandomError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value failed a presence, type or range check.
    #[error("{0}")]
    InvalidArgument(String),

    /// A salt or hash string does not have the bcrypt structure.
    #[error("malformed hash: {0}")]
    MalformedHash(String),

    #[error(transparent)]
    Engine(#[from] bcrypt::BcryptError),

    #[error("{0}")]
    Randomness(#[source] RandomError),

    /// The background worker died before settling the call.
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Stable classification of [`Error`] for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    MalformedHash,
    EngineFailure,
    RandomnessFailure,
    Worker,
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedHash(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::MalformedHash(_) => ErrorKind::MalformedHash,
            Error::Engine(_) => ErrorKind::EngineFailure,
            Error::Randomness(_) => ErrorKind::RandomnessFailure,
            Error::Worker(_) => ErrorKind::Worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_displays_message_verbatim() {
        let err = Error::invalid("rounds must be a number");
        assert_eq!(err.to_string(), "rounds must be a number");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn engine_errors_pass_through_unchanged() {
        let source = bcrypt::BcryptError::CostNotAllowed(2);
        let expected = source.to_string();
        let err = Error::from(source);
        assert_eq!(err.kind(), ErrorKind::EngineFailure);
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn randomness_error_keeps_source() {
        let err = Error::Randomness("entropy pool exhausted".into());
        assert_eq!(err.to_string(), "entropy pool exhausted");
        assert!(std::error::Error::source(&err).is_some());
    }
}
