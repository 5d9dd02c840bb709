//! Background compactor
//!
//! One thread per manager. Wakes on a fixed interval, checks the segment
//! count and runs at most one pass; passes never overlap.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::Result;

use super::SegmentManager;

/// Handle to a running background compactor
///
/// Dropping the handle stops the thread and waits for an in-flight pass
/// to finish.
pub struct CompactorHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CompactorHandle {
    /// Stop the compactor and wait for it to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Disconnecting the channel wakes the thread's select
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Compactor thread panicked");
            }
        }
    }
}

impl Drop for CompactorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SegmentManager {
    /// Start the background compactor for this manager
    ///
    /// The thread only holds a weak reference and exits on its own once
    /// the manager is dropped.
    pub fn start_compactor(self: &Arc<Self>) -> Result<CompactorHandle> {
        let interval = self.config.compaction_interval;
        let manager = Arc::downgrade(self);
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("segkv-compactor".to_string())
            .spawn(move || run(manager, interval, shutdown_rx))?;

        tracing::debug!("Started compactor (interval {:?})", interval);

        Ok(CompactorHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

fn run(manager: Weak<SegmentManager>, interval: Duration, shutdown: Receiver<()>) {
    let ticker = channel::tick(interval);

    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                match manager.maybe_compact() {
                    Ok(Some(_)) => {}
                    Ok(None) => tracing::trace!("Compaction check: nothing to do"),
                    Err(e) => tracing::error!("Background compaction failed: {}", e),
                }
            }
            recv(shutdown) -> _ => break,
        }
    }

    tracing::debug!("Compactor stopped");
}
