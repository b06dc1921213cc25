//! NFQUEUE transport boundary.
//!
//! Everything netlink-flavored lives here: binding the queue, the blocking
//! receive/verdict loop, and the startup tuning knobs. The core above this
//! module only ever sees raw packet bytes and [`MangleOutcome`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nfq::{Queue, Verdict};
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::mangle::{MangleOutcome, Mangler};
use crate::types::MangleStats;

/// Blocking receive/verdict loop over one NFQUEUE.
///
/// Owns the mangler for its lifetime; one packet is fully handled (through
/// verdict) before the next is read.
pub struct QueueRunner {
    config: QueueConfig,
    mangler: Mangler,
    stop: Arc<AtomicBool>,
}

impl QueueRunner {
    /// Create a runner. Setting `stop` makes the loop exit between packets.
    pub fn new(config: QueueConfig, mangler: Mangler, stop: Arc<AtomicBool>) -> Self {
        Self {
            config,
            mangler,
            stop,
        }
    }

    /// Bind the queue and process packets until `stop` is raised or the
    /// transport fails terminally. Returns the final counters.
    pub fn run(mut self) -> Result<MangleStats> {
        let queue_num = self.config.queue_num;

        let mut queue = Queue::open().map_err(|e| QueueError::BindFailed {
            queue: queue_num,
            reason: e.to_string(),
        })?;
        queue.bind(queue_num).map_err(|e| QueueError::BindFailed {
            queue: queue_num,
            reason: e.to_string(),
        })?;

        // Deepen the kernel-side queue so bursts are delayed, not dropped.
        if let Err(e) = queue.set_queue_max_len(queue_num, self.config.max_len) {
            warn!(error = %e, "Failed to set queue depth");
        }
        if self.config.raise_priority {
            raise_priority();
        }

        info!(queue = queue_num, "Intercepting packets");

        let result = self.process_loop(&mut queue);

        if let Err(e) = queue.unbind(queue_num) {
            debug!(error = %e, "Unbind failed during teardown");
        }

        let stats = self.mangler.stats();
        info!(%stats, "Queue loop ended");
        result.map(|()| stats)
    }

    fn process_loop(&mut self, queue: &mut Queue) -> Result<()> {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(());
            }

            let mut msg = match queue.recv() {
                Ok(msg) => msg,
                Err(e) if e.raw_os_error() == Some(libc::ENOBUFS) => {
                    // Kernel dropped packets between reads; visibility loss,
                    // not a logic error.
                    warn!("Receive buffer overflowed, losing packets");
                    continue;
                }
                Err(e) => {
                    if self.stop.load(Ordering::Relaxed) {
                        return Ok(());
                    }
                    error!(error = %e, "Receive failed, stopping");
                    return Err(QueueError::ReceiveFailed(e.to_string()).into());
                }
            };

            match self.mangler.mangle(msg.get_payload()) {
                MangleOutcome::Rewrite(bytes) => msg.set_payload(bytes),
                MangleOutcome::Pass => {}
            }
            msg.set_verdict(Verdict::Accept);
            queue.verdict(msg)?;
        }
    }
}

/// Raise process priority so the mangler keeps up with the queue.
fn raise_priority() {
    let ret = unsafe { libc::nice(-20) };
    if ret == -1 {
        warn!("Failed to raise process priority (need CAP_SYS_NICE?)");
    } else {
        debug!(nice = ret, "Raised process priority");
    }
}
