use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self as tokio_time, MissedTickBehavior};

use crate::storage::{RequestLogEntry, SeaOrmStorage};

#[derive(Debug, Clone)]
pub struct StorageBusConfig {
    pub capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub retry_delay: Duration,
    pub enqueue_timeout: Duration,
}

impl Default for StorageBusConfig {
    fn default() -> Self {
        Self {
            capacity: 65_536,
            batch_size: 200,
            flush_interval: Duration::from_millis(200),
            retry_delay: Duration::from_millis(200),
            enqueue_timeout: Duration::from_secs(5),
        }
    }
}

/// Background batch writer for `request_log` rows. The request path
/// only ever touches [`StorageBus::enqueue`]; the write itself, including
/// any retry against a slow or momentarily unreachable database, happens
/// off the critical path in the spawned writer task.
///
/// `Clone` so the Forwarder can hand a handle into the task it spawns to
/// drain an SSE stream — that task outlives the `attempt()` call that
/// created it, so it cannot simply borrow the bus.
#[derive(Clone)]
pub struct StorageBus {
    tx: mpsc::Sender<RequestLogEntry>,
    enqueue_timeout: Duration,
    _handle: Arc<JoinHandle<()>>,
}

impl StorageBus {
    pub fn spawn(storage: SeaOrmStorage, config: StorageBusConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity);
        let enqueue_timeout = config.enqueue_timeout;
        let handle = tokio::spawn(writer(
            storage,
            rx,
            config.batch_size,
            config.flush_interval,
            config.retry_delay,
        ));
        Self {
            tx,
            enqueue_timeout,
            _handle: Arc::new(handle),
        }
    }

    /// Enqueues a row with a bounded context timeout. A full queue or a
    /// dead writer task is logged and swallowed; it never fails the
    /// request the row describes.
    pub async fn enqueue(&self, entry: RequestLogEntry) {
        match tokio_time::timeout(self.enqueue_timeout, self.tx.send(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                tracing::warn!("request_log writer task is gone; dropping row");
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.enqueue_timeout,
                    "request_log enqueue timed out; dropping row"
                );
            }
        }
    }
}

async fn writer(
    storage: SeaOrmStorage,
    mut rx: mpsc::Receiver<RequestLogEntry>,
    batch_size: usize,
    flush_interval: Duration,
    retry_delay: Duration,
) {
    let mut buffer = Vec::with_capacity(batch_size);
    let mut ticker = tokio_time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(entry) = rx.recv() => {
                buffer.push(entry);
                if buffer.len() >= batch_size {
                    flush(&storage, &mut buffer, retry_delay).await;
                }
            }
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush(&storage, &mut buffer, retry_delay).await;
                }
            }
            else => {
                if !buffer.is_empty() {
                    flush(&storage, &mut buffer, retry_delay).await;
                }
                break;
            }
        }
    }
}

async fn flush(storage: &SeaOrmStorage, buffer: &mut Vec<RequestLogEntry>, retry_delay: Duration) {
    let mut batch = Vec::new();
    std::mem::swap(buffer, &mut batch);

    loop {
        match storage.insert_request_log_batch(batch.clone()).await {
            Ok(()) => break,
            Err(err) => {
                tracing::warn!("request_log batch write failed: {err}");
                tokio_time::sleep(retry_delay).await;
            }
        }
    }
}
