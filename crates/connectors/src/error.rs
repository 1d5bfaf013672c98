use thiserror::Error;

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The connection url did not parse.
    #[error("Invalid connection url: {0}")]
    InvalidUrl(String),

    /// TLS connector construction or handshake failed.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// The driver refused the connection.
    #[error("Postgres connection failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// All errors coming from the database/protocol layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Any driver error during the COPY exchange.
    #[error("SQL error: {0}")]
    Sql(#[from] tokio_postgres::Error),

    /// Writing rows failed at the application level.
    #[error("Write error: {0}")]
    Write(String),
}
