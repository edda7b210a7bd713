//! Background sync.
//!
//! A worker thread runs one cycle at start, then waits for triggers:
//!
//! - the poll interval elapsing, when one is configured
//! - [`ChangeNotifier::notify`], for "changes" or "reconnect" signals from
//!   a push channel
//! - local writes, when `listen_for_changes` is set
//!
//! Notifications are debounced: each one restarts the quiet period and the
//! cycle runs when it ends.

use crate::coordinator::SyncCoordinator;
use crate::error::{SyncError, SyncResult};
use lowla_core::{ListenerId, LowlaEvent};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug)]
enum Trigger {
    Changes,
    Stop,
}

/// Requests a debounced sync cycle from a running [`SyncHandle`].
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: Sender<Trigger>,
}

impl ChangeNotifier {
    /// Signals that the server has changes. Returns false once the worker
    /// has stopped.
    pub fn notify(&self) -> bool {
        self.tx.send(Trigger::Changes).is_ok()
    }
}

/// A running background sync worker. Stops when dropped.
pub struct SyncHandle {
    coordinator: Arc<SyncCoordinator>,
    tx: Sender<Trigger>,
    worker: Option<JoinHandle<()>>,
    listener: Option<ListenerId>,
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("running", &self.worker.is_some())
            .field("listening", &self.listener.is_some())
            .finish()
    }
}

impl SyncHandle {
    /// Starts the worker using the coordinator's configuration.
    ///
    /// # Errors
    ///
    /// Fails if the thread cannot be spawned.
    pub fn start(coordinator: Arc<SyncCoordinator>) -> SyncResult<Self> {
        let (tx, rx) = mpsc::channel();
        let config = coordinator.config().clone();

        let worker_coordinator = Arc::clone(&coordinator);
        let worker = thread::Builder::new()
            .name("lowla-sync".into())
            .spawn(move || {
                worker_loop(&worker_coordinator, &rx, config.poll_interval, config.debounce);
            })
            .map_err(|e| SyncError::Worker(e.to_string()))?;

        let listener = config.listen_for_changes.then(|| {
            let local = tx.clone();
            coordinator.db().events().on(move |event| {
                if event == LowlaEvent::Pending {
                    let _ = local.send(Trigger::Changes);
                }
            })
        });

        tracing::info!(
            server = %coordinator.config().server_url,
            poll = ?coordinator.config().poll_interval,
            "background sync started"
        );
        Ok(Self {
            coordinator,
            tx,
            worker: Some(worker),
            listener,
        })
    }

    /// A handle for requesting cycles from other threads.
    pub fn notifier(&self) -> ChangeNotifier {
        ChangeNotifier {
            tx: self.tx.clone(),
        }
    }

    /// The coordinator driven by this worker.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Stops the worker after any cycle in progress and waits for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(id) = self.listener.take() {
            self.coordinator.db().events().off(id);
        }
        let _ = self.tx.send(Trigger::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("sync worker panicked");
            }
            tracing::info!("background sync stopped");
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    coordinator: &SyncCoordinator,
    rx: &Receiver<Trigger>,
    poll_interval: Option<Duration>,
    debounce: Duration,
) {
    coordinator.sync_now();
    let mut next_poll = poll_interval.map(|p| Instant::now() + p);
    let mut quiet_until: Option<Instant> = None;

    loop {
        let deadline = [next_poll, quiet_until].into_iter().flatten().min();
        let trigger = match deadline {
            Some(limit) => {
                let now = Instant::now();
                if now >= limit {
                    None
                } else {
                    match rx.recv_timeout(limit - now) {
                        Ok(trigger) => Some(trigger),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            }
            None => match rx.recv() {
                Ok(trigger) => Some(trigger),
                Err(_) => return,
            },
        };

        match trigger {
            Some(Trigger::Stop) => return,
            Some(Trigger::Changes) => quiet_until = Some(Instant::now() + debounce),
            None => {
                let now = Instant::now();
                let debounced = quiet_until.is_some_and(|t| t <= now);
                let polled = next_poll.is_some_and(|t| t <= now);
                if debounced || polled {
                    quiet_until = None;
                    coordinator.sync_now();
                    next_poll = poll_interval.map(|p| Instant::now() + p);
                }
            }
        }
    }
}
