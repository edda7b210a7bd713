//! The sync cycle: push, then pull.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpTransport};
use crate::pull::pull_changes;
use crate::push::push_changes;
use crate::state::{SyncState, SyncStats};
use crate::transport::SyncTransport;
use lowla_core::{LowlaDb, LowlaEvent};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;

/// Runs sync cycles for one store.
///
/// Only one cycle runs at a time. A request arriving while a cycle is in
/// flight sets a pending flag instead, and the running cycle is followed by
/// exactly one more no matter how many requests arrived. Push and pull
/// failures are logged and recorded in [`SyncStats`]; they never propagate
/// to the caller.
pub struct SyncCoordinator {
    db: LowlaDb,
    transport: Arc<dyn SyncTransport>,
    config: SyncConfig,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    /// (running, pending)
    guard: Mutex<(bool, bool)>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("server_url", &self.config.server_url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    /// Creates a coordinator over any transport.
    pub fn new(db: LowlaDb, transport: impl SyncTransport + 'static, config: SyncConfig) -> Self {
        Self {
            db,
            transport: Arc::new(transport),
            config,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            guard: Mutex::new((false, false)),
        }
    }

    /// Creates a coordinator speaking HTTP to `config.server_url`.
    ///
    /// # Errors
    ///
    /// Rejects an empty server URL.
    pub fn with_client<C: HttpClient + 'static>(
        db: LowlaDb,
        client: C,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let transport = HttpTransport::new(&config.server_url, client)?;
        Ok(Self::new(db, transport, config))
    }

    /// Creates a coordinator using the blocking `reqwest` client.
    ///
    /// # Errors
    ///
    /// Rejects an empty server URL or a client that cannot be built.
    #[cfg(feature = "reqwest")]
    pub fn connect(db: LowlaDb, config: SyncConfig) -> SyncResult<Self> {
        let client = crate::http::ReqwestClient::new(config.request_timeout)?;
        Self::with_client(db, client, config)
    }

    /// The store being synced.
    pub fn db(&self) -> &LowlaDb {
        &self.db
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &dyn SyncTransport {
        self.transport.as_ref()
    }

    /// Current phase.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Totals so far.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Runs a cycle now, plus one more if another request arrives meanwhile.
    ///
    /// Returns false without running anything when a cycle is already in
    /// flight on another thread; that cycle picks the request up.
    pub fn sync_now(&self) -> bool {
        {
            let mut guard = self.guard.lock();
            if guard.0 {
                guard.1 = true;
                tracing::debug!("sync already running; request coalesced");
                return false;
            }
            *guard = (true, false);
        }

        let _running = RunningFlag(&self.guard);
        loop {
            self.run_cycle();
            let mut guard = self.guard.lock();
            if !std::mem::take(&mut guard.1) {
                return true;
            }
        }
    }

    fn run_cycle(&self) {
        let started = Instant::now();
        self.db.events().emit(LowlaEvent::SyncBegin);
        let mut failure: Option<SyncError> = None;

        self.set_state(SyncState::Pushing);
        let pushed = match push_changes(&self.db, self.transport.as_ref(), &self.config) {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "Unable to push changes");
                failure = Some(err);
                0
            }
        };

        self.set_state(SyncState::Pulling);
        let pulled = match pull_changes(&self.db, self.transport.as_ref(), &self.config) {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "Unable to fetch changes");
                failure = Some(err);
                0
            }
        };

        self.set_state(SyncState::Idle);
        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.documents_pushed += pushed as u64;
            stats.documents_pulled += pulled as u64;
            stats.last_sync_time = Some(Instant::now());
            match &failure {
                Some(err) => {
                    stats.failed_cycles += 1;
                    stats.last_error = Some(err.to_string());
                }
                None => stats.last_error = None,
            }
        }
        tracing::info!(
            pushed,
            pulled,
            ok = failure.is_none(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sync cycle finished"
        );
        self.db.events().emit(LowlaEvent::SyncEnd);
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }
}

/// Clears the running flag when the cycle loop exits, including by unwinding.
struct RunningFlag<'a>(&'a Mutex<(bool, bool)>);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        *self.0.lock() = (false, false);
    }
}
