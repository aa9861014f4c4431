//! Periodic background sync.

use crate::client::Client;
use crate::config::MIN_SYNC_INTERVAL;
use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The current state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not started yet.
    Idle,
    /// Waiting for the next tick.
    Waiting,
    /// Pulling the delta since the local watermark.
    Downloading,
    /// Pushing unmerged records.
    Uploading,
    /// Stopped by cancellation, or never ran because the session is offline.
    Stopped,
    /// Ended because the session expired.
    Expired,
}

impl SyncState {
    /// Returns true while a sync leg is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Downloading | SyncState::Uploading)
    }

    /// Returns true once the loop has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Stopped | SyncState::Expired)
    }
}

/// Statistics about background sync.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Number of cycles run.
    pub cycles_completed: u64,
    /// Records applied from downloads.
    pub records_downloaded: u64,
    /// Records pushed by uploads.
    pub records_uploaded: u64,
    /// Legs that failed without ending the loop.
    pub failed_legs: u64,
    /// When the last cycle finished.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Leg {
    Download,
    Upload,
}

impl Leg {
    fn name(self) -> &'static str {
        match self {
            Leg::Download => "download",
            Leg::Upload => "upload",
        }
    }
}

/// Runs download-then-upload on a fixed period for an online session.
///
/// `SessionExpired` from either leg ends the loop and the session: the client
/// is logged out, the error is recorded, the orchestrator's cancellation token
/// is cancelled and [`run`](Self::run) returns the error. An unavailable remote is a no-op for that leg; any other
/// failure is logged and the loop carries on.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use keepsync_engine::{Client, SyncOrchestrator};
/// # async fn example(client: Arc<Client>) {
/// let orchestrator = Arc::new(SyncOrchestrator::new(client));
/// let handle = tokio::spawn({
///     let orchestrator = Arc::clone(&orchestrator);
///     async move { orchestrator.run().await }
/// });
/// // ...
/// orchestrator.stop();
/// let _ = handle.await;
/// # }
/// ```
pub struct SyncOrchestrator {
    client: Arc<Client>,
    interval: Duration,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancel: CancellationToken,
}

impl SyncOrchestrator {
    /// Creates an orchestrator ticking at the client's configured interval.
    pub fn new(client: Arc<Client>) -> Self {
        Self::with_cancel(client, CancellationToken::new())
    }

    /// Creates an orchestrator stopped by `cancel`.
    pub fn with_cancel(client: Arc<Client>, cancel: CancellationToken) -> Self {
        let interval = client.config().sync_interval.max(MIN_SYNC_INTERVAL);
        Self {
            client,
            interval,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancel,
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The token that stops the loop; cancelled by the loop itself on expiry.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Asks the loop to stop after the current leg.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs until stopped or the session expires.
    ///
    /// Returns immediately with `Ok` for an offline session. The first cycle
    /// runs right away, later ones one interval apart.
    ///
    /// # Errors
    ///
    /// `SessionExpired` if either leg reports it.
    pub async fn run(&self) -> SyncResult<()> {
        if !self.client.is_online() {
            info!("offline session, background sync disabled");
            self.set_state(SyncState::Stopped);
            return Ok(());
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.set_state(SyncState::Waiting);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("background sync stopped");
                    self.set_state(SyncState::Stopped);
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.cycle().await {
                self.client.logout();
                self.stats.write().last_error = Some(e.to_string());
                self.set_state(SyncState::Expired);
                self.cancel.cancel();
                warn!(error = %e, "session expired, background sync terminated");
                return Err(e);
            }
        }
    }

    /// One download-then-upload cycle. Errs only on session expiry.
    async fn cycle(&self) -> SyncResult<()> {
        self.set_state(SyncState::Downloading);
        let downloaded = self.settle(Leg::Download, self.client.download().await)?;

        self.set_state(SyncState::Uploading);
        let uploaded = self.settle(Leg::Upload, self.client.upload().await)?;

        let mut stats = self.stats.write();
        stats.cycles_completed += 1;
        stats.records_downloaded += downloaded as u64;
        stats.records_uploaded += uploaded as u64;
        stats.last_sync_time = Some(Instant::now());
        Ok(())
    }

    /// Turns a leg's outcome into a count, keeping only fatal errors.
    fn settle(&self, leg: Leg, result: SyncResult<usize>) -> SyncResult<usize> {
        match result {
            Ok(count) => {
                if count > 0 {
                    debug!(leg = leg.name(), count, "sync leg done");
                }
                Ok(count)
            }
            Err(SyncError::SessionExpired) => Err(SyncError::SessionExpired),
            Err(e) => {
                if e.is_transient() {
                    info!(leg = leg.name(), error = %e, "remote unavailable, skipping");
                } else {
                    warn!(leg = leg.name(), error = %e, "sync leg failed");
                }
                let mut stats = self.stats.write();
                stats.failed_legs += 1;
                stats.last_error = Some(e.to_string());
                Ok(0)
            }
        }
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
