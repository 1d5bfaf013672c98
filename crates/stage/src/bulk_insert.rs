use crate::{
    batcher::{Batch, Batcher},
    config::StageConfig,
    destination::BulkDestination,
    error::StageError,
    loader::BulkLoader,
};
use model::mapping::{MappingError, MappingProvider};
use std::{fmt, sync::Arc};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The composed batcher + loader unit exposed to the surrounding pipeline.
///
/// Records pushed into the stage accumulate into batches of `bulk_size`;
/// each batch streams through one scoped transfer session. Exactly one
/// transfer is in flight at a time; the next batch may queue while the
/// current one drains. Once a transfer fails the stage is faulted: the
/// intake closes and remaining batches are dropped.
pub struct BulkInsertStage<T> {
    input: mpsc::Sender<T>,
    worker: JoinHandle<Result<(), StageError>>,
    cancel: CancellationToken,
    name: String,
}

// Manual impl to avoid a `T: Debug` bound; records are never exposed.
impl<T> fmt::Debug for BulkInsertStage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkInsertStage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> BulkInsertStage<T> {
    /// Validates the configuration, resolves the column mapping once, and
    /// spawns the batcher and loader tasks.
    pub fn spawn(
        config: StageConfig,
        provider: &dyn MappingProvider<T>,
        destination: Arc<dyn BulkDestination>,
    ) -> Result<Self, StageError> {
        config.validate()?;

        let key = config.mapping_key();
        let mapping = provider.resolve(&key)?;
        if mapping.is_empty() {
            return Err(MappingError::EmptyColumns {
                label: key.label,
                table: key.table,
            }
            .into());
        }

        let name = config.resolved_name();
        let cancel = CancellationToken::new();

        let (record_tx, record_rx) = mpsc::channel::<T>(config.bulk_size);
        // Capacity 1: the next batch may complete while the current one
        // drains, but no further.
        let (batch_tx, batch_rx) = mpsc::channel::<Batch<T>>(1);

        let loader = BulkLoader::new(
            name.clone(),
            config.destination_table.clone(),
            config.bulk_size,
            mapping,
            destination,
        );

        let batcher_task = tokio::spawn(Batcher::new(config.bulk_size).run(record_rx, batch_tx));
        let loader_task = tokio::spawn(loader.run(batch_rx, cancel.clone()));

        let stage_name = name.clone();
        let worker = tokio::spawn(async move {
            // The batcher terminates once the intake closes or the loader
            // is gone; its result just reflects task health.
            batcher_task
                .await
                .map_err(|e| StageError::Join(e.to_string()))?;

            let result = loader_task
                .await
                .map_err(|e| StageError::Join(e.to_string()))?;

            if result.is_ok() {
                info!(stage = %stage_name, "Stage drained");
            }
            result.map_err(StageError::from)
        });

        Ok(Self {
            input: record_tx,
            worker,
            cancel,
            name,
        })
    }

    /// Accepts one record. Fails with `StageError::Faulted` once the loader
    /// has failed or the stage was cancelled.
    pub async fn push(&self, record: T) -> Result<(), StageError> {
        self.input
            .send(record)
            .await
            .map_err(|_| StageError::Faulted)
    }

    /// A cloneable intake handle for upstream pipelines.
    pub fn sender(&self) -> mpsc::Sender<T> {
        self.input.clone()
    }

    /// Requests cooperative cancellation: the in-flight transfer aborts and
    /// its session is released before `complete` reports the cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Closes the intake, flushes the partial remainder, drains all pending
    /// batches, and reports the stage outcome.
    pub async fn complete(self) -> Result<(), StageError> {
        drop(self.input);
        self.worker
            .await
            .map_err(|e| StageError::Join(e.to_string()))?
    }
}
