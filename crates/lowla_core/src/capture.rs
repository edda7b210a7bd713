//! Capture of local writes while a push is in flight.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type IdSet = Arc<Mutex<BTreeSet<String>>>;

#[derive(Debug, Default)]
pub(crate) struct SaveCaptures {
    active: Mutex<Vec<(u64, IdSet)>>,
    next_id: AtomicU64,
}

impl SaveCaptures {
    /// Notes a local write of `lowla_id` in every open capture.
    pub(crate) fn record(&self, lowla_id: &str) {
        for (_, ids) in self.active.lock().iter() {
            ids.lock().insert(lowla_id.to_string());
        }
    }

    pub(crate) fn start(self: &Arc<Self>) -> SaveCapture {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let ids = IdSet::default();
        self.active.lock().push((id, Arc::clone(&ids)));
        SaveCapture {
            id,
            ids,
            registry: Arc::clone(self),
        }
    }
}

/// Collects the lowlaIds of local writes made while it is alive.
///
/// Server-origin writes are not collected. Dropping the capture stops
/// collection.
#[derive(Debug)]
pub struct SaveCapture {
    id: u64,
    ids: IdSet,
    registry: Arc<SaveCaptures>,
}

impl SaveCapture {
    /// Whether `lowla_id` was written locally since the capture started.
    #[must_use]
    pub fn contains(&self, lowla_id: &str) -> bool {
        self.ids.lock().contains(lowla_id)
    }

    /// Everything captured so far.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().iter().cloned().collect()
    }
}

impl Drop for SaveCapture {
    fn drop(&mut self) {
        self.registry.active.lock().retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_only_while_alive() {
        let registry = Arc::new(SaveCaptures::default());
        registry.record("before");
        let capture = registry.start();
        registry.record("during");
        assert!(capture.contains("during"));
        assert!(!capture.contains("before"));

        drop(capture);
        assert!(registry.active.lock().is_empty());
    }

    #[test]
    fn overlapping_captures_are_independent() {
        let registry = Arc::new(SaveCaptures::default());
        let first = registry.start();
        registry.record("a");
        let second = registry.start();
        registry.record("b");
        assert_eq!(first.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(second.ids(), vec!["b".to_string()]);
    }
}
