//! Merge batch pipeline.
//!
//! Many producers (one per accepted push) feed a single consumer task over a
//! rendezvous queue. The consumer buffers records and flushes them through
//! [`RecordStore::conditional_upsert`] when either trigger fires:
//!
//! - the buffer reaches `batch_size`
//! - `flush_interval` elapses since the last flush and the buffer is non-empty
//!
//! A flush with any failed record keeps the whole buffer for the next
//! trigger. Records that already landed are rejected as stale on the retry,
//! so the retry is harmless.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──start──▶ Running ──cancel──▶ Stopped
//! ```
//!
//! `start` while running is a no-op; `start` after stop is an error. On
//! cancellation the consumer stops honouring ticks, keeps draining until every
//! in-flight producer has handed over its records, flushes the remainder once
//! and exits.

use crate::config::{PipelineConfig, MIN_FLUSH_INTERVAL};
use crate::error::{PipelineError, PipelineResult};
use keepsync_store::{RecordStore, SecretRecord, UpsertOutcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle state of a [`MergePipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed, not yet started.
    Created,
    /// Consumer task is accepting records.
    Running,
    /// Shut down; cannot be restarted.
    Stopped,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            CREATED => PipelineState::Created,
            RUNNING => PipelineState::Running,
            _ => PipelineState::Stopped,
        }
    }
}

/// Counters describing pipeline activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records handed to the consumer.
    pub records_received: u64,
    /// Flushes in which every record was applied.
    pub flushes: u64,
    /// Flushes in which at least one record failed.
    pub failed_flushes: u64,
    /// Records inserted or updated.
    pub records_written: u64,
    /// Records dropped as stale by the conflict rule.
    pub records_rejected: u64,
    /// Size of the most recent flush attempt.
    pub last_flush_size: usize,
}

struct Handoff {
    record: SecretRecord,
    taken: oneshot::Sender<()>,
}

/// Server-side fan-in worker applying pushed records in batches.
pub struct MergePipeline {
    config: PipelineConfig,
    store: Arc<dyn RecordStore>,
    state: AtomicU8,
    sender: Mutex<Option<mpsc::Sender<Handoff>>>,
    receiver: Mutex<Option<mpsc::Receiver<Handoff>>>,
    producers: TaskTracker,
    consumer: Mutex<Option<JoinHandle<()>>>,
    stats: Mutex<PipelineStats>,
}

impl MergePipeline {
    /// Creates a pipeline writing to `store`. Nothing runs until [`start`](Self::start).
    pub fn new(config: PipelineConfig, store: Arc<dyn RecordStore>) -> Arc<Self> {
        // Capacity 1 plus the per-item ack makes every send a rendezvous.
        let (tx, rx) = mpsc::channel(1);
        Arc::new(Self {
            config,
            store,
            state: AtomicU8::new(CREATED),
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            producers: TaskTracker::new(),
            consumer: Mutex::new(None),
            stats: Mutex::new(PipelineStats::default()),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> PipelineStats {
        self.stats.lock().clone()
    }

    /// Spawns the consumer task. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// `AlreadyStopped` if the pipeline has been shut down.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> PipelineResult<()> {
        match self
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {}
            Err(RUNNING) => {
                debug!("merge pipeline already running");
                return Ok(());
            }
            Err(_) => return Err(PipelineError::AlreadyStopped),
        }

        let rx = self
            .receiver
            .lock()
            .take()
            .ok_or(PipelineError::AlreadyStopped)?;

        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(async move { pipeline.consume(rx, cancel).await });
        *self.consumer.lock() = Some(handle);

        info!(
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval.as_millis() as u64,
            "merge pipeline started"
        );
        Ok(())
    }

    /// Queues records for merging and returns immediately.
    ///
    /// A producer task hands the records to the consumer one at a time, each
    /// hand-off completing only once the consumer has taken the record.
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// `NotRunning` before `start` or after shutdown has begun.
    pub fn submit(&self, records: Vec<SecretRecord>) -> PipelineResult<()> {
        if self.state() != PipelineState::Running {
            return Err(PipelineError::NotRunning);
        }
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(PipelineError::NotRunning)?;

        if records.is_empty() {
            return Ok(());
        }

        self.producers.spawn(async move {
            for record in records {
                let (taken, was_taken) = oneshot::channel();
                if sender.send(Handoff { record, taken }).await.is_err() {
                    warn!("merge queue closed while producer was enqueuing");
                    return;
                }
                if was_taken.await.is_err() {
                    warn!("merge consumer dropped a hand-off");
                    return;
                }
            }
        });
        Ok(())
    }

    /// Waits for the consumer task to finish after cancellation.
    ///
    /// Returns immediately if the pipeline was never started.
    pub async fn stopped(&self) {
        let handle = self.consumer.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "merge consumer task failed");
            }
        }
    }

    async fn consume(self: Arc<Self>, mut rx: mpsc::Receiver<Handoff>, cancel: CancellationToken) {
        // The config fields are public; a zero period would panic the ticker
        let period = self.config.flush_interval.max(MIN_FLUSH_INTERVAL);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buffer: Vec<SecretRecord> = Vec::with_capacity(self.config.batch_size);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(handoff) => {
                        self.take(&mut buffer, handoff);
                        if buffer.len() >= self.config.batch_size {
                            self.flush(&mut buffer).await;
                            ticker.reset();
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer).await;
                    }
                }
            }
        }

        // No new producers from here on; the queue closes once the ones
        // already admitted drop their senders.
        self.state.store(STOPPED, Ordering::SeqCst);
        self.sender.lock().take();
        self.producers.close();
        debug!(buffered = buffer.len(), "merge pipeline draining");

        while let Some(handoff) = rx.recv().await {
            self.take(&mut buffer, handoff);
            if buffer.len() >= self.config.batch_size {
                self.flush(&mut buffer).await;
            }
        }
        self.producers.wait().await;

        if !buffer.is_empty() {
            self.flush(&mut buffer).await;
        }
        if !buffer.is_empty() {
            warn!(lost = buffer.len(), "merge pipeline stopped with unflushed records");
        }
        info!("merge pipeline stopped");
    }

    fn take(&self, buffer: &mut Vec<SecretRecord>, handoff: Handoff) {
        buffer.push(handoff.record);
        // The producer may have given up; that's fine.
        let _ = handoff.taken.send(());
        self.stats.lock().records_received += 1;
    }

    /// Applies the buffer. Clears it only if every record went through.
    async fn flush(&self, buffer: &mut Vec<SecretRecord>) {
        let batch = buffer.clone();
        let size = batch.len();
        let store = Arc::clone(&self.store);

        let result = tokio::task::spawn_blocking(move || {
            let mut written = 0u64;
            let mut rejected = 0u64;
            let mut failures = Vec::new();
            for record in batch {
                let key = (record.owner.clone(), record.id.clone());
                match store.conditional_upsert(record) {
                    Ok(UpsertOutcome::Rejected) => rejected += 1,
                    Ok(_) => written += 1,
                    Err(e) => failures.push((key, e)),
                }
            }
            (written, rejected, failures)
        })
        .await;

        let mut stats = self.stats.lock();
        stats.last_flush_size = size;
        match result {
            Ok((written, rejected, failures)) if failures.is_empty() => {
                stats.flushes += 1;
                stats.records_written += written;
                stats.records_rejected += rejected;
                buffer.clear();
                debug!(size, written, rejected, "merge batch flushed");
            }
            Ok((_, _, failures)) => {
                stats.failed_flushes += 1;
                for ((owner, id), error) in &failures {
                    warn!(%owner, %id, %error, "merge upsert failed");
                }
                warn!(size, failed = failures.len(), "merge batch kept for retry");
            }
            Err(e) => {
                stats.failed_flushes += 1;
                warn!(size, error = %e, "merge flush task failed; batch kept for retry");
            }
        }
    }
}

impl std::fmt::Debug for MergePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergePipeline")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
