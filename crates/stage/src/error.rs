use model::mapping::{AccessError, MappingError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bulk size must be a positive integer")]
    ZeroBulkSize,

    #[error("destination table must not be empty")]
    EmptyTable,

    #[error("connection target must not be empty")]
    EmptyTarget,
}

/// Errors raised by a destination while a transfer session is open.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to connect to destination: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Bulk protocol error: {0}")]
    Protocol(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Record malformed for mapping: {0}")]
    MalformedRecord(#[from] AccessError),
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to open transfer session for table '{table}': {source}")]
    OpenSession {
        table: String,
        #[source]
        source: TransferError,
    },

    #[error("Transfer of batch {batch} to table '{table}' failed: {source}")]
    Transfer {
        batch: u64,
        table: String,
        #[source]
        source: TransferError,
    },

    #[error(
        "Batch {batch} short write to table '{table}': streamed {expected} rows, destination reported {written}"
    )]
    ShortWrite {
        batch: u64,
        table: String,
        expected: usize,
        written: u64,
    },

    #[error("Bulk load cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("Invalid stage configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Column mapping resolution failed: {0}")]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("Stage has faulted and no longer accepts records")]
    Faulted,

    #[error("Stage worker task failed: {0}")]
    Join(String),
}
