//! Coordinator state and statistics.

use std::time::Instant;

/// Phase of the current sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle running.
    Idle,
    /// Sending local edits.
    Pushing,
    /// Fetching server changes.
    Pulling,
}

impl SyncState {
    /// Returns true while a cycle is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }
}

/// Running totals across cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles run to the end, successfully or not.
    pub cycles_completed: u64,
    /// Documents sent to the adapter.
    pub documents_pushed: u64,
    /// Server records applied locally.
    pub documents_pulled: u64,
    /// Cycles in which push or pull failed.
    pub failed_cycles: u64,
    /// When the last cycle ended.
    pub last_sync_time: Option<Instant>,
    /// Message of the most recent failure, cleared by a clean cycle.
    pub last_error: Option<String>,
}
