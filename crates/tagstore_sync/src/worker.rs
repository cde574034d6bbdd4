//! Background worker that turns pipeline triggers into sync cycles.

use crate::coordinator::SyncCoordinator;
use crate::transport::ReplicaTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tagstore_core::SyncTrigger;
use tagstore_storage::KvBackend;
use tracing::{debug, warn};

/// Runs sync cycles off the command path.
///
/// The pipeline fires a [`SyncTrigger`] after every successful mutating
/// commit; the worker drains the channel and runs one retrying cycle per
/// burst, so ten rapid mutations cost one cycle, not ten. Cycle failures
/// are logged and swallowed; the trigger from the next mutation retries
/// naturally.
pub struct SyncWorker {
    trigger_tx: Sender<SyncTrigger>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncWorker {
    /// Spawns the worker thread over a coordinator and the pipeline's
    /// trigger channel.
    ///
    /// Wire the returned worker's [`trigger_sender`](Self::trigger_sender)
    /// into the pipeline with `set_sync_trigger`.
    pub fn spawn<B, T>(
        coordinator: Arc<SyncCoordinator<B, T>>,
        trigger_tx: Sender<SyncTrigger>,
        trigger_rx: Receiver<SyncTrigger>,
    ) -> Self
    where
        B: KvBackend + 'static,
        T: ReplicaTransport + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);

        let handle = std::thread::Builder::new()
            .name("tagstore-sync".into())
            .spawn(move || run(coordinator, trigger_rx, thread_shutdown))
            .unwrap_or_else(|e| panic!("failed to spawn sync worker thread: {e}"));

        Self {
            trigger_tx,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Returns a sender for the worker's trigger channel.
    #[must_use]
    pub fn trigger_sender(&self) -> Sender<SyncTrigger> {
        self.trigger_tx.clone()
    }

    /// Manually requests a cycle, as a periodic timer or a reconnect
    /// handler would.
    pub fn trigger(&self) {
        if self.trigger_tx.send(SyncTrigger).is_err() {
            warn!("sync worker thread is gone; dropping trigger");
        }
    }

    /// Stops the worker and joins its thread.
    ///
    /// Triggers still queued are dropped. A cycle already in progress
    /// finishes first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the blocked recv; a closed channel also wakes it, so a send
        // failure here is fine.
        let _ = self.trigger_tx.send(SyncTrigger);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("sync worker thread panicked");
            }
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn run<B, T>(
    coordinator: Arc<SyncCoordinator<B, T>>,
    trigger_rx: Receiver<SyncTrigger>,
    shutdown: Arc<AtomicBool>,
) where
    B: KvBackend,
    T: ReplicaTransport,
{
    loop {
        match trigger_rx.recv() {
            Ok(SyncTrigger) => {}
            Err(RecvError) => break,
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        // Coalesce a burst of mutations into one cycle.
        let mut coalesced = 0;
        while trigger_rx.try_recv().is_ok() {
            coalesced += 1;
        }
        if coalesced > 0 {
            debug!(coalesced, "coalesced sync triggers");
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        if let Err(e) = coordinator.sync_with_retry() {
            // The caller already has their response; the next mutation's
            // trigger retries.
            warn!(error = %e, "background sync cycle failed");
        }
    }
    debug!("sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryReplica;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};
    use tagstore_core::{Command, CommandPipeline, NewTag};
    use tagstore_storage::MemoryBackend;

    fn wired_worker() -> (
        Arc<CommandPipeline<MemoryBackend>>,
        Arc<SyncCoordinator<MemoryBackend, InMemoryReplica>>,
        SyncWorker,
    ) {
        let pipeline = Arc::new(CommandPipeline::new(MemoryBackend::new()));
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&pipeline),
            InMemoryReplica::new(),
        ));
        let (tx, rx) = mpsc::channel();
        let worker = SyncWorker::spawn(Arc::clone(&coordinator), tx, rx);
        pipeline.set_sync_trigger(worker.trigger_sender());
        (pipeline, coordinator, worker)
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn mutation_triggers_a_background_cycle() {
        let (pipeline, coordinator, worker) = wired_worker();

        let response = pipeline.execute(Command::CreateTag(NewTag {
            name: "rust".into(),
            ..NewTag::default()
        }));
        assert!(response.success);

        assert!(wait_until(Duration::from_secs(2), || {
            coordinator.stats().cycles_completed > 0
        }));
        worker.shutdown();
    }

    #[test]
    fn shutdown_joins_cleanly() {
        let (_pipeline, _coordinator, worker) = wired_worker();
        worker.shutdown();
    }

    #[test]
    fn manual_trigger_runs_a_cycle() {
        let (_pipeline, coordinator, worker) = wired_worker();

        worker.trigger();
        assert!(wait_until(Duration::from_secs(2), || {
            coordinator.stats().cycles_completed > 0
        }));
        worker.shutdown();
    }
}
