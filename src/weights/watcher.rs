//! Weight file watcher.
//!
//! Polls for a controller-written weight file on a fixed cadence. Each
//! successful read is parsed into a full snapshot, the file is deleted
//! (consumed exactly once), and the snapshot is deposited in the mailbox
//! for the packet path to adopt at its own pace.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::spec::{parse_spec, WeightSnapshot};
use crate::error::Result;

/// Single-slot hand-off between the watcher and the scheduler.
///
/// The watcher deposits only into an empty slot and never blocks on the
/// consumer; the scheduler takes the slot at the top of a selection call.
/// A snapshot is adopted all-or-nothing, so a half-written table is never
/// observable.
#[derive(Clone, Default)]
pub struct Mailbox {
    slot: Arc<Mutex<Option<WeightSnapshot>>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a deposited snapshot is waiting to be adopted.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Deposit a snapshot if the slot is empty. Returns false (dropping
    /// the snapshot) if the previous one has not been consumed yet.
    pub fn offer(&self, snapshot: WeightSnapshot) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(snapshot);
        true
    }

    /// Take the pending snapshot, leaving the slot empty.
    pub fn take(&self) -> Option<WeightSnapshot> {
        self.slot.lock().take()
    }
}

/// Background weight-file poller.
pub struct WeightWatcher {
    path: PathBuf,
    interval: Duration,
    mailbox: Mailbox,
}

impl WeightWatcher {
    /// Create a watcher for `path`, publishing into `mailbox`.
    pub fn new(path: PathBuf, interval: Duration, mailbox: Mailbox) -> Self {
        Self {
            path,
            interval,
            mailbox,
        }
    }

    /// One poll step. Returns true if a snapshot was published.
    ///
    /// A missing file and a pending unconsumed snapshot are both quiet
    /// no-ops; a table that overflows its bounds is fatal and propagates.
    pub fn poll_once(&self) -> Result<bool> {
        if self.mailbox.is_pending() {
            return Ok(false);
        }

        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                // Controller may still be mid-write; try again next poll.
                debug!(path = %self.path.display(), error = %e, "Weight file unreadable");
                return Ok(false);
            }
        };

        let snapshot = parse_spec(&text)?;

        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to delete consumed weight file");
        }

        self.mailbox.offer(snapshot);
        info!(path = %self.path.display(), "Published new weight snapshot");
        Ok(true)
    }

    /// Run until shutdown. A fatal specification error ends the task with
    /// an error so the process can exit instead of running with a corrupt
    /// table.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once()?;
                }
                _ = shutdown.recv() => {
                    debug!("Weight watcher stopped");
                    return Ok(());
                }
            }
        }
    }
}
