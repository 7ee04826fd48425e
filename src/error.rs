use crate::cost::Cost;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{cost} exceeds limit of {threshold}{message}")]
    LimitExceeded {
        cost: Cost,
        threshold: Cost,
        message: String,
    },

    #[error("exceeded per query limit: {0}")]
    PerQueryLimitExceeded(Box<Error>),

    #[error("exceeded global limit: {0}")]
    GlobalLimitExceeded(Box<Error>),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid cost: {0}")]
    InvalidCost(Cost),

    #[error("Limit manager is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Series error: {0}")]
    Series(String),
}

impl Error {
    pub fn error_code(&self) -> i32 {
        match self {
            Error::LimitExceeded { .. } => -1,
            Error::PerQueryLimitExceeded(_) => -2,
            Error::GlobalLimitExceeded(_) => -3,
            Error::InvalidLimit(_) => -4,
            Error::Config(_) => -5,
            Error::Metrics(_) => -6,
            Error::Series(_) => -7,
            Error::InvalidCost(_) => -8,
            Error::Closed => -9,
        }
    }

    /// True for any error raised because a cost budget was used up.
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(
            self,
            Error::LimitExceeded { .. }
                | Error::PerQueryLimitExceeded(_)
                | Error::GlobalLimitExceeded(_)
        )
    }
}

impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Error::Metrics(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_message_format() {
        let err = Error::LimitExceeded {
            cost: 15.0,
            threshold: 5.0,
            message: String::new(),
        };
        assert_eq!(err.to_string(), "15 exceeds limit of 5");

        let err = Error::LimitExceeded {
            cost: 2.5,
            threshold: 2.0,
            message: ", narrow the query".to_string(),
        };
        assert_eq!(err.to_string(), "2.5 exceeds limit of 2, narrow the query");
    }

    #[test]
    fn test_wrapped_limit_errors() {
        let inner = Error::LimitExceeded {
            cost: 6.0,
            threshold: 5.0,
            message: String::new(),
        };
        let local = Error::PerQueryLimitExceeded(Box::new(inner.clone()));
        let global = Error::GlobalLimitExceeded(Box::new(inner));

        assert_eq!(local.to_string(), "exceeded per query limit: 6 exceeds limit of 5");
        assert_eq!(global.to_string(), "exceeded global limit: 6 exceeds limit of 5");
        assert!(local.is_limit_exceeded());
        assert!(global.is_limit_exceeded());
        assert!(!Error::Series("boom".into()).is_limit_exceeded());
        assert_ne!(local.error_code(), global.error_code());
    }
}
