use crate::config::AuditConfig;
use crate::domain::attempt::AttemptLogEntry;
use crate::domain::ports::AttemptLogStoreRef;
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Asynchronous, batched writer for the attempt log.
///
/// Producers enqueue without waiting; a single background task writes batches
/// of `batch_size` entries or whatever is buffered every `flush_interval`.
/// When the queue is full the entry is written synchronously on the calling
/// path instead of being dropped.
pub struct AuditLogWriter {
    sender: mpsc::Sender<AttemptLogEntry>,
    store: AttemptLogStoreRef,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditLogWriter {
    /// Spawns the background worker. Must be called inside a Tokio runtime.
    pub fn start(store: AttemptLogStoreRef, config: &AuditConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(
            receiver,
            shutdown_rx,
            store.clone(),
            config.clone(),
        ));
        Self {
            sender,
            store,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Hands an entry to the worker, or writes it directly under backpressure.
    pub async fn record(&self, entry: AttemptLogEntry) {
        match self.sender.try_send(entry) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry)) => {
                tracing::debug!(operation = %entry.operation_id, "attempt log queue full, writing synchronously");
                self.write_now(&entry).await;
            }
            Err(mpsc::error::TrySendError::Closed(entry)) => {
                self.write_now(&entry).await;
            }
        }
    }

    async fn write_now(&self, entry: &AttemptLogEntry) {
        if let Err(e) = self.store.append(entry).await {
            tracing::error!(operation = %entry.operation_id, error = %e, "attempt log entry lost");
        }
    }

    /// Stops accepting queued entries, drains the queue and flushes the last
    /// partial batch. Entries recorded afterwards are written synchronously.
    pub async fn shutdown(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };
        let _ = self.shutdown.send(true);
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "attempt log worker panicked");
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<AttemptLogEntry>,
    mut shutdown: watch::Receiver<bool>,
    store: AttemptLogStoreRef,
    config: AuditConfig,
) {
    let batch_size = config.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);
    let start = tokio::time::Instant::now() + config.flush_interval;
    let mut ticker = tokio::time::interval_at(start, config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Some(entry) => {
                    batch.push(entry);
                    if batch.len() >= batch_size {
                        flush(&store, &mut batch).await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(&store, &mut batch).await;
                }
            }
            _ = shutdown.changed() => {
                // Producers now hit `Closed` and write synchronously.
                receiver.close();
                while let Some(entry) = receiver.recv().await {
                    batch.push(entry);
                    if batch.len() >= batch_size {
                        flush(&store, &mut batch).await;
                    }
                }
                break;
            }
        }
    }

    if !batch.is_empty() {
        flush(&store, &mut batch).await;
    }
    tracing::debug!("attempt log worker stopped");
}

/// Writes the buffered batch. On a failed batch write every entry is retried
/// on its own so one bad round trip does not lose the whole batch.
async fn flush(store: &AttemptLogStoreRef, batch: &mut Vec<AttemptLogEntry>) {
    let pending = std::mem::take(batch);
    match store.append_batch(&pending).await {
        Ok(()) => tracing::debug!(entries = pending.len(), "attempt log batch flushed"),
        Err(e) => {
            tracing::warn!(entries = pending.len(), error = %e, "attempt log batch failed, retrying entries one by one");
            for entry in &pending {
                if let Err(e) = store.append(entry).await {
                    tracing::error!(operation = %entry.operation_id, error = %e, "attempt log entry lost");
                }
            }
        }
    }
}
