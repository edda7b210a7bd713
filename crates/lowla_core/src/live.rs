//! Live query registry.
//!
//! Watchers are grouped by namespace. After any committed change to a
//! namespace, every watcher on it is called again with its own cursor, which
//! it re-evaluates to see fresh results.

use crate::cursor::Cursor;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle for removing a watcher.
pub type WatchId = u64;

type WatchCallback = Arc<dyn Fn(&Cursor) + Send + Sync>;

#[derive(Clone)]
struct Watcher {
    id: WatchId,
    cursor: Cursor,
    callback: WatchCallback,
}

/// Watchers keyed by namespace, owned by one store handle.
///
/// A registered cursor keeps its store alive until the watcher is removed
/// or the store is closed.
#[derive(Default)]
pub struct LiveRegistry {
    watchers: RwLock<HashMap<String, Vec<Watcher>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for LiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let watchers = self.watchers.read();
        f.debug_map()
            .entries(watchers.iter().map(|(ns, w)| (ns, w.len())))
            .finish()
    }
}

impl LiveRegistry {
    pub(crate) fn register(&self, cursor: Cursor, callback: WatchCallback) -> WatchId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.watchers
            .write()
            .entry(cursor.client_ns().to_string())
            .or_default()
            .push(Watcher {
                id,
                cursor,
                callback,
            });
        id
    }

    /// Removes one watcher. Returns false if it was not registered.
    pub fn unregister(&self, id: WatchId) -> bool {
        let mut watchers = self.watchers.write();
        let mut found = false;
        watchers.retain(|_, list| {
            let before = list.len();
            list.retain(|w| w.id != id);
            found |= list.len() != before;
            !list.is_empty()
        });
        found
    }

    /// Calls every watcher registered on `client_ns`.
    ///
    /// Must not be called while a transaction is open on the store: the
    /// watchers typically query it.
    pub fn notify(&self, client_ns: &str) {
        let targets: Vec<Watcher> = match self.watchers.read().get(client_ns) {
            Some(list) => list.clone(),
            None => return,
        };
        tracing::debug!(client_ns, watchers = targets.len(), "notifying live cursors");
        for watcher in targets {
            (watcher.callback)(&watcher.cursor);
        }
    }

    /// Number of watchers on `client_ns`.
    pub fn watcher_count(&self, client_ns: &str) -> usize {
        self.watchers.read().get(client_ns).map_or(0, Vec::len)
    }

    /// Removes every watcher.
    pub fn clear(&self) {
        self.watchers.write().clear();
    }
}
