use std::mem;
use tokio::sync::mpsc;
use tracing::debug;

/// A bounded, ordered group of records queued for one bulk transfer.
/// Owned exclusively by the loader while it drains, dropped after.
#[derive(Debug)]
pub struct Batch<T> {
    seq: u64,
    records: Vec<T>,
}

impl<T> Batch<T> {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }
}

/// Groups single records into batches of at most `bulk_size`, preserving
/// arrival order. Buffering is pure and cannot fail; errors only arise
/// downstream in the loader.
pub struct Batcher<T> {
    bulk_size: usize,
    seq: u64,
    buf: Vec<T>,
}

impl<T> Batcher<T> {
    pub fn new(bulk_size: usize) -> Self {
        Self {
            bulk_size,
            seq: 0,
            buf: Vec::with_capacity(bulk_size),
        }
    }

    /// Buffers one record; yields a full batch once `bulk_size` have
    /// accumulated.
    pub fn push(&mut self, record: T) -> Option<Batch<T>> {
        self.buf.push(record);
        if self.buf.len() == self.bulk_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Yields the partial remainder on end-of-stream, if any.
    pub fn flush(&mut self) -> Option<Batch<T>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self) -> Batch<T> {
        let records = mem::replace(&mut self.buf, Vec::with_capacity(self.bulk_size));
        let seq = self.seq;
        self.seq += 1;
        Batch { seq, records }
    }
}

impl<T: Send + 'static> Batcher<T> {
    /// Feed loop: groups the record stream into batches until upstream
    /// closes, then flushes the remainder. Exits early when the loader side
    /// is gone (stage faulted) so buffering stays bounded after a fault.
    pub async fn run(mut self, mut records: mpsc::Receiver<T>, batches: mpsc::Sender<Batch<T>>) {
        loop {
            tokio::select! {
                _ = batches.closed() => {
                    debug!(buffered = self.buffered(), "Batch channel closed, stopping batcher");
                    return;
                }
                record = records.recv() => match record {
                    Some(record) => {
                        if let Some(batch) = self.push(record) {
                            if batches.send(batch).await.is_err() {
                                return;
                            }
                        }
                    }
                    None => break,
                },
            }
        }

        if let Some(batch) = self.flush() {
            let _ = batches.send(batch).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(batcher: &mut Batcher<u32>, input: impl IntoIterator<Item = u32>) -> Vec<Batch<u32>> {
        let mut batches: Vec<Batch<u32>> = input
            .into_iter()
            .filter_map(|r| batcher.push(r))
            .collect();
        if let Some(partial) = batcher.flush() {
            batches.push(partial);
        }
        batches
    }

    #[test]
    fn full_batches_plus_partial_remainder() {
        // N = 5, B = 3 -> [[0,1,2],[3,4]]
        let mut batcher = Batcher::new(3);
        let batches = collect(&mut batcher, 0..5);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].records(), &[0, 1, 2]);
        assert_eq!(batches[1].records(), &[3, 4]);
        assert_eq!(batches[0].seq(), 0);
        assert_eq!(batches[1].seq(), 1);
    }

    #[test]
    fn exact_multiple_yields_no_partial() {
        let mut batcher = Batcher::new(3);
        let batches = collect(&mut batcher, 0..3);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records(), &[0, 1, 2]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let mut batcher = Batcher::<u32>::new(3);
        assert!(collect(&mut batcher, []).is_empty());
    }

    #[test]
    fn order_is_preserved_with_no_loss_or_duplication() {
        let n = 1000u32;
        let bulk = 64;
        let mut batcher = Batcher::new(bulk);
        let batches = collect(&mut batcher, 0..n);

        let full = (n as usize) / bulk;
        let rem = (n as usize) % bulk;
        assert_eq!(batches.len(), full + usize::from(rem > 0));

        let flattened: Vec<u32> = batches.iter().flat_map(|b| b.records().to_vec()).collect();
        assert_eq!(flattened, (0..n).collect::<Vec<_>>());
        assert_eq!(
            batches.iter().map(|b| b.len()).sum::<usize>(),
            n as usize
        );
    }

    #[tokio::test]
    async fn run_flushes_remainder_on_upstream_close() {
        let (record_tx, record_rx) = mpsc::channel(8);
        let (batch_tx, mut batch_rx) = mpsc::channel(8);
        let handle = tokio::spawn(Batcher::new(3).run(record_rx, batch_tx));

        for i in 0..5u32 {
            record_tx.send(i).await.unwrap();
        }
        drop(record_tx);
        handle.await.unwrap();

        let first = batch_rx.recv().await.unwrap();
        let second = batch_rx.recv().await.unwrap();
        assert_eq!(first.records(), &[0, 1, 2]);
        assert_eq!(second.records(), &[3, 4]);
        assert!(batch_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn run_stops_when_loader_side_is_gone() {
        let (record_tx, record_rx) = mpsc::channel(8);
        let (batch_tx, batch_rx) = mpsc::channel::<Batch<u32>>(8);
        let handle = tokio::spawn(Batcher::new(3).run(record_rx, batch_tx));

        drop(batch_rx);
        handle.await.unwrap();

        // Intake is closed once the batcher exits.
        assert!(record_tx.send(1).await.is_err());
    }
}
