//! Store lifecycle events.
//!
//! Sync progress and local pending-write notifications are published here.
//! Consumers either take an mpsc [`Receiver`] via [`EventFeed::subscribe`]
//! or register a callback with [`EventFeed::on`].

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// An event published by the store or its sync coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LowlaEvent {
    /// A sync cycle started.
    SyncBegin,
    /// A sync cycle finished, successfully or not.
    SyncEnd,
    /// The push half of a cycle started sending local changes.
    PushBegin,
    /// The push half finished.
    PushEnd,
    /// The pull half started fetching server changes.
    PullBegin,
    /// The pull half finished.
    PullEnd,
    /// A local write committed and is waiting to be pushed.
    Pending,
}

impl LowlaEvent {
    /// Conventional event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SyncBegin => "syncBegin",
            Self::SyncEnd => "syncEnd",
            Self::PushBegin => "pushBegin",
            Self::PushEnd => "pushEnd",
            Self::PullBegin => "pullBegin",
            Self::PullEnd => "pullEnd",
            Self::Pending => "_pending",
        }
    }
}

/// Handle returned by [`EventFeed::on`], used to remove the listener.
pub type ListenerId = u64;

type Listener = Arc<dyn Fn(LowlaEvent) + Send + Sync>;

/// Fan-out of [`LowlaEvent`]s to channels and callbacks.
#[derive(Default)]
pub struct EventFeed {
    subscribers: RwLock<Vec<Sender<LowlaEvent>>>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("subscribers", &self.subscribers.read().len())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl EventFeed {
    /// Creates an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for all future events.
    pub fn subscribe(&self) -> Receiver<LowlaEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Registers a callback for all future events.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(LowlaEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Removes a callback. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Delivers `event` to every subscriber and listener.
    ///
    /// Listeners run on the emitting thread, outside any internal lock, so
    /// they may register or remove listeners themselves.
    pub fn emit(&self, event: LowlaEvent) {
        tracing::trace!(event = event.name(), "emit");
        self.subscribers
            .write()
            .retain(|tx| tx.send(event).is_ok());

        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Drops every subscriber and listener.
    pub fn clear(&self) {
        self.subscribers.write().clear();
        self.listeners.write().clear();
    }

    /// Number of live channel subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn subscribers_receive_in_order() {
        let feed = EventFeed::new();
        let rx = feed.subscribe();
        feed.emit(LowlaEvent::SyncBegin);
        feed.emit(LowlaEvent::SyncEnd);
        assert_eq!(rx.try_recv().unwrap(), LowlaEvent::SyncBegin);
        assert_eq!(rx.try_recv().unwrap(), LowlaEvent::SyncEnd);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let feed = EventFeed::new();
        drop(feed.subscribe());
        let _kept = feed.subscribe();
        feed.emit(LowlaEvent::Pending);
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[test]
    fn listeners_can_be_removed() {
        let feed = EventFeed::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = feed.on(move |e| sink.lock().push(e));

        feed.emit(LowlaEvent::PushBegin);
        assert!(feed.off(id));
        assert!(!feed.off(id));
        feed.emit(LowlaEvent::PushEnd);

        assert_eq!(*seen.lock(), vec![LowlaEvent::PushBegin]);
    }

    #[test]
    fn names_match_convention() {
        assert_eq!(LowlaEvent::PullBegin.name(), "pullBegin");
        assert_eq!(LowlaEvent::Pending.name(), "_pending");
    }
}
