use crate::error::TransferError;
use async_trait::async_trait;
use connectors::postgres::{adapter::PgBulkCopy, connect::connect_client};
use model::{core::value::Value, mapping::ColumnPair};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tracing::debug;

/// Everything a destination needs to open one transfer session: the table,
/// the registered column mappings (in COPY column order), and the batch-size
/// hint from the stage configuration.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub table: String,
    pub columns: Vec<ColumnPair>,
    pub bulk_size_hint: usize,
}

/// A destination accepting the bulk-load protocol: open session ->
/// stream rows -> close session.
#[async_trait]
pub trait BulkDestination: Send + Sync {
    async fn open_session(
        &self,
        request: &SessionRequest,
    ) -> Result<Box<dyn BulkSession>, TransferError>;
}

/// One open transfer session: a connection plus a bulk-copy handle. Single
/// use; released through `finish`/`abort`, with `Drop` as the backstop when
/// the drain future is abandoned (cancellation).
#[async_trait]
pub trait BulkSession: Send {
    /// Streams one row, values in the registered column order.
    async fn write_row(&mut self, values: Vec<Value>) -> Result<(), TransferError>;

    /// Completes the transfer and returns the destination row count.
    async fn finish(self: Box<Self>) -> Result<u64, TransferError>;

    /// Releases the session after a failed transfer.
    async fn abort(self: Box<Self>);
}

/// Counts open sessions so tests (and operators) can observe that a stage
/// never holds more than one at a time.
#[derive(Clone, Default)]
pub struct SessionGauge {
    inner: Arc<GaugeInner>,
}

#[derive(Default)]
struct GaugeInner {
    open: AtomicUsize,
    peak: AtomicUsize,
}

impl SessionGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> SessionGuard {
        let open = self.inner.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(open, Ordering::SeqCst);
        SessionGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn open(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Highest number of sessions ever open at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

/// Decrements the gauge when the session is released, however that happens.
pub struct SessionGuard {
    inner: Arc<GaugeInner>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.inner.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// PostgreSQL destination: one connection and one `COPY ... FROM STDIN`
/// per session. COPY has no per-transfer batch-size knob, so the hint from
/// the request is informational here; no statement timeout is set, transfer
/// duration is unbounded.
pub struct PostgresDestination {
    target: String,
    gauge: SessionGauge,
}

impl PostgresDestination {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            gauge: SessionGauge::new(),
        }
    }

    pub fn gauge(&self) -> SessionGauge {
        self.gauge.clone()
    }
}

#[async_trait]
impl BulkDestination for PostgresDestination {
    async fn open_session(
        &self,
        request: &SessionRequest,
    ) -> Result<Box<dyn BulkSession>, TransferError> {
        debug!(
            table = %request.table,
            columns = request.columns.len(),
            bulk_size_hint = request.bulk_size_hint,
            "Opening bulk transfer session"
        );

        let client = connect_client(&self.target)
            .await
            .map_err(|e| TransferError::Connect(Box::new(e)))?;

        let columns: Vec<String> = request.columns.iter().map(|p| p.column.clone()).collect();
        let copy = PgBulkCopy::begin(client, &request.table, &columns)
            .await
            .map_err(|e| TransferError::Protocol(Box::new(e)))?;

        Ok(Box::new(PostgresSession {
            copy,
            _open: self.gauge.acquire(),
        }))
    }
}

struct PostgresSession {
    copy: PgBulkCopy,
    _open: SessionGuard,
}

#[async_trait]
impl BulkSession for PostgresSession {
    async fn write_row(&mut self, values: Vec<Value>) -> Result<(), TransferError> {
        self.copy
            .send_row(&values)
            .await
            .map_err(|e| TransferError::Protocol(Box::new(e)))
    }

    async fn finish(self: Box<Self>) -> Result<u64, TransferError> {
        let session = *self;
        let written = session
            .copy
            .finish()
            .await
            .map_err(|e| TransferError::Protocol(Box::new(e)))?;
        Ok(written)
    }

    async fn abort(self: Box<Self>) {
        // Dropping the handle closes the connection, which aborts the COPY
        // on the server side.
    }
}
