//! Async runtime bridge for running scheduler operations off a UI thread

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::ApplicationDraft;
use crate::scheduler::{ApplicationScheduler, CreateOutcome, DeleteOutcome, SchedulerError};

/// Bridge between a UI event loop and the scheduler.
///
/// `submit_*` calls return immediately with a request id; the finished result arrives
/// later through [`SchedulerBridge::poll_updates`].
pub struct SchedulerBridge {
    /// Owned runtime (wrapped in Option for clean shutdown)
    runtime: Option<Runtime>,
    handle: Handle,
    scheduler: Arc<ApplicationScheduler>,
    next_request: AtomicU64,
    updates_tx: mpsc::UnboundedSender<SchedulerUpdate>,
    updates_rx: Mutex<mpsc::UnboundedReceiver<SchedulerUpdate>>,
}

/// Completion message for one submitted request.
#[derive(Debug)]
pub struct SchedulerUpdate {
    pub request_id: u64,
    pub kind: SchedulerUpdateKind,
}

#[derive(Debug)]
pub enum SchedulerUpdateKind {
    Created(Result<CreateOutcome, SchedulerError>),
    Deleted(Result<DeleteOutcome, SchedulerError>),
}

impl SchedulerBridge {
    /// Create a bridge with its own multi-threaded runtime.
    pub fn new(scheduler: ApplicationScheduler) -> io::Result<Self> {
        let runtime = Runtime::new()?;
        let handle = runtime.handle().clone();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        Ok(Self {
            runtime: Some(runtime),
            handle,
            scheduler: Arc::new(scheduler),
            next_request: AtomicU64::new(1),
            updates_tx,
            updates_rx: Mutex::new(updates_rx),
        })
    }

    pub fn submit_create(&self, draft: ApplicationDraft) -> u64 {
        let request_id = self.next_request_id();
        let scheduler = Arc::clone(&self.scheduler);
        let tx = self.updates_tx.clone();

        self.handle.spawn(async move {
            let result = scheduler.create(draft).await;
            // The receiver only disappears when the bridge is dropped.
            let _ = tx.send(SchedulerUpdate {
                request_id,
                kind: SchedulerUpdateKind::Created(result),
            });
        });
        request_id
    }

    pub fn submit_delete(&self, application_id: Uuid) -> u64 {
        let request_id = self.next_request_id();
        let scheduler = Arc::clone(&self.scheduler);
        let tx = self.updates_tx.clone();

        self.handle.spawn(async move {
            let result = scheduler.delete(application_id).await;
            let _ = tx.send(SchedulerUpdate {
                request_id,
                kind: SchedulerUpdateKind::Deleted(result),
            });
        });
        request_id
    }

    /// Drain finished requests without blocking and call the handler for each.
    pub fn poll_updates<F>(&self, mut handler: F)
    where
        F: FnMut(SchedulerUpdate),
    {
        let mut guard = match self.updates_rx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while let Ok(update) = guard.try_recv() {
            handler(update);
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_request.fetch_add(1, Ordering::Relaxed)
    }
}

impl Drop for SchedulerBridge {
    fn drop(&mut self) {
        // Shutdown the runtime without blocking
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
