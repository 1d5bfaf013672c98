use crate::{
    batcher::Batch,
    destination::{BulkDestination, SessionRequest},
    error::{LoaderError, TransferError},
    rows::RowStream,
};
use model::mapping::AccessorTable;
use std::{any::type_name, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Drains batches one at a time into the destination. The single-worker
/// drain is the stage's backpressure mechanism: a new transfer does not
/// start until the previous session is fully released.
pub struct BulkLoader<T> {
    stage_name: String,
    table: String,
    bulk_size: usize,
    mapping: AccessorTable<T>,
    destination: Arc<dyn BulkDestination>,
}

impl<T: Send + Sync + 'static> BulkLoader<T> {
    pub fn new(
        stage_name: String,
        table: String,
        bulk_size: usize,
        mapping: AccessorTable<T>,
        destination: Arc<dyn BulkDestination>,
    ) -> Self {
        Self {
            stage_name,
            table,
            bulk_size,
            mapping,
            destination,
        }
    }

    /// Consumes the batch stream until upstream closes, a transfer fails,
    /// or the stage is cancelled. On failure the receiver is dropped, so no
    /// later batch is ever attempted.
    pub async fn run(
        self,
        mut batches: mpsc::Receiver<Batch<T>>,
        cancel: CancellationToken,
    ) -> Result<(), LoaderError> {
        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => return Err(LoaderError::Cancelled),
                batch = batches.recv() => match batch {
                    Some(batch) => batch,
                    None => return Ok(()),
                },
            };

            tokio::select! {
                // Dropping the drain future releases the in-flight session
                // before cancellation propagates.
                _ = cancel.cancelled() => return Err(LoaderError::Cancelled),
                result = self.drain(batch) => result?,
            }
        }
    }

    /// Transfers one batch through a fresh session: open, stream every row,
    /// release on both success and failure.
    async fn drain(&self, batch: Batch<T>) -> Result<(), LoaderError> {
        let rows = batch.len();

        debug!(
            stage = %self.stage_name,
            batch = batch.seq(),
            rows,
            record = type_name::<T>(),
            table = %self.table,
            "Starting bulk transfer"
        );

        // The adapter exposes the resolved pairings before any row is read;
        // they are registered on the session ahead of streaming.
        let rows_source = RowStream::new(batch.records(), &self.mapping);
        let request = SessionRequest {
            table: self.table.clone(),
            columns: rows_source.column_pairs(),
            bulk_size_hint: self.bulk_size,
        };

        let mut session = self.destination.open_session(&request).await.map_err(
            |source| LoaderError::OpenSession {
                table: self.table.clone(),
                source,
            },
        )?;

        let streamed = async {
            for row in rows_source {
                let values = row.map_err(TransferError::from)?;
                session.write_row(values).await?;
            }
            Ok::<(), TransferError>(())
        }
        .await;

        match streamed {
            Ok(()) => {
                let written = session
                    .finish()
                    .await
                    .map_err(|source| LoaderError::Transfer {
                        batch: batch.seq(),
                        table: self.table.clone(),
                        source,
                    })?;

                if written != rows as u64 {
                    return Err(LoaderError::ShortWrite {
                        batch: batch.seq(),
                        table: self.table.clone(),
                        expected: rows,
                        written,
                    });
                }

                info!(
                    stage = %self.stage_name,
                    batch = batch.seq(),
                    rows,
                    record = type_name::<T>(),
                    table = %self.table,
                    "Bulk transfer completed"
                );
                Ok(())
            }
            Err(source) => {
                session.abort().await;
                Err(LoaderError::Transfer {
                    batch: batch.seq(),
                    table: self.table.clone(),
                    source,
                })
            }
        }
    }
}
