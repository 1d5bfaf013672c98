use crate::{
    error::DbError,
    postgres::encoder::{CopyValueEncoder, PgCopyValueEncoder},
};
use bytes::Bytes;
use futures_util::SinkExt;
use model::core::value::Value;
use std::pin::Pin;
use tokio_postgres::{Client, CopyInSink};
use tracing::debug;

/// One in-flight `COPY ... FROM STDIN` exchange. Owns the client for the
/// duration of the transfer; dropping it without `finish` aborts the COPY
/// and closes the connection.
pub struct PgBulkCopy {
    // Kept alive so the connection outlives the sink.
    _client: Client,
    sink: Pin<Box<CopyInSink<Bytes>>>,
    encoder: PgCopyValueEncoder,
    columns: usize,
}

impl PgBulkCopy {
    /// Issues the COPY statement and hands back the row sink.
    pub async fn begin(client: Client, table: &str, columns: &[String]) -> Result<Self, DbError> {
        let statement = copy_from_stdin(table, columns);
        debug!("COPY statement: {}", statement);

        let sink = client.copy_in(&statement).await?;
        Ok(Self {
            _client: client,
            sink: Box::pin(sink),
            encoder: PgCopyValueEncoder::new(),
            columns: columns.len(),
        })
    }

    /// Encodes and sends one row, values in COPY column order.
    pub async fn send_row(&mut self, values: &[Value]) -> Result<(), DbError> {
        if values.len() != self.columns {
            return Err(DbError::Write(format!(
                "row has {} values but COPY declared {} columns",
                values.len(),
                self.columns
            )));
        }

        let mut line = String::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&self.encoder.encode_value(value));
        }
        line.push('\n');

        self.sink.as_mut().send(Bytes::from(line)).await?;
        Ok(())
    }

    /// Completes the COPY and returns the server-reported row count.
    pub async fn finish(mut self) -> Result<u64, DbError> {
        let written = self.sink.as_mut().finish().await?;
        Ok(written)
    }
}

fn copy_from_stdin(table: &str, columns: &[String]) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '\\N')",
        quote_ident(table),
        column_list
    )
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_statement_quotes_identifiers() {
        let sql = copy_from_stdin("readings", &["id".to_string(), "taken at".to_string()]);
        assert_eq!(
            sql,
            "COPY \"readings\" (\"id\", \"taken at\") FROM STDIN WITH (FORMAT csv, NULL '\\N')"
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
