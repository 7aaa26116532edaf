use offerdb_core::CoreError;
use offerdb_db::DbError;
use offerdb_scraper::{ExtractError, FetchError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error(transparent)]
    Transition(#[from] CoreError),

    #[error("score {0} is outside 1..=10")]
    InvalidScore(u8),
}

/// Why one candidate could not be turned into a structured deal. The
/// candidate moves to `error` with this message; the batch carries on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructuringError {
    #[error("missing merchant name")]
    MissingMerchant,

    #[error("missing offer title")]
    MissingTitle,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("batch {0} not found")]
    BatchNotFound(i64),

    #[error("structured deal {0} not found")]
    DealNotFound(i64),

    #[error("score {0} is outside 1..=10")]
    InvalidScore(u8),

    #[error("invalid deal: {0}")]
    InvalidDeal(#[from] StructuringError),

    #[error("invalid JSON document: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
