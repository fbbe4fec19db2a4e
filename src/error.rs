use thiserror::Error;

use crate::models::Scheme;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    // Contract violations: a caller bug, never a recoverable runtime condition
    #[error("card already exists for line {0}")]
    CardExists(String),

    #[error("no card exists for line {0}")]
    CardMissing(String),

    #[error("line {0} is not in the script")]
    UnknownLine(String),

    #[error("invalid rating '{0}' (use again, hard, good or easy)")]
    InvalidRating(String),

    #[error("store is bound to the {stored} scheme but {configured} is configured")]
    SchemeMismatch { stored: Scheme, configured: Scheme },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

impl Error {
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::CardExists(_)
                | Error::CardMissing(_)
                | Error::UnknownLine(_)
                | Error::InvalidRating(_)
                | Error::SchemeMismatch { .. }
                | Error::InvalidParameters(_)
        )
    }
}
