//! The store handle.

use crate::capture::{SaveCapture, SaveCaptures};
use crate::collection::Collection;
use crate::config::Config;
use crate::error::CoreResult;
use crate::events::EventFeed;
use crate::id::{DefaultLowlaId, LowlaIdStrategy};
use crate::live::LiveRegistry;
use crate::metadata::{Metadata, METADATA_NS};
use lowla_codec::JsonDocument;
use lowla_storage::{Datastore, LogDatastore, MemoryDatastore, ScanOptions, Transaction};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Inner {
    store: Arc<dyn Datastore>,
    live: LiveRegistry,
    events: EventFeed,
    captures: Arc<SaveCaptures>,
    id_strategy: Arc<dyn LowlaIdStrategy>,
    closed: AtomicBool,
}

/// Handle to an open LowlaDB store.
///
/// Cheap to clone; all clones share the same datastore, live cursors and
/// event listeners. One handle is meant to be shared by the application and
/// its sync coordinator.
///
/// # Example
///
/// ```rust
/// use lowla_core::{Document, LowlaDb, Value};
///
/// let db = LowlaDb::open_in_memory().unwrap();
/// let people = db.collection("app", "people");
///
/// let mut ada = Document::new();
/// ada.insert("name".into(), Value::from("Ada"));
/// let stored = people.insert(ada).unwrap();
/// assert!(stored.contains_key("_id"));
///
/// assert_eq!(people.count(Document::new()).unwrap(), 1);
/// assert_eq!(db.db("app").collection_names().unwrap(), vec!["app.people"]);
/// ```
#[derive(Clone)]
pub struct LowlaDb {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LowlaDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LowlaDb")
            .field("engine", &self.inner.store.engine_name())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl LowlaDb {
    /// Opens a volatile store.
    ///
    /// # Errors
    ///
    /// Infallible today; kept fallible to match the persistent constructors.
    pub fn open_in_memory() -> CoreResult<Self> {
        Ok(Self::builder().datastore(MemoryDatastore::new()).build())
    }

    /// Opens or creates a persistent store in directory `path`.
    ///
    /// # Errors
    ///
    /// Fails if the directory is locked by another process, is missing and
    /// may not be created, or holds a damaged log.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a persistent store with explicit configuration.
    ///
    /// # Errors
    ///
    /// Same as [`LowlaDb::open`].
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let store = LogDatastore::open_dir(path, config.log_options())?;
        tracing::info!(path = %path.display(), "opened store");
        Ok(Self::builder().datastore(store).build())
    }

    /// Starts configuring a store around a custom datastore or id strategy.
    #[must_use]
    pub fn builder() -> LowlaDbBuilder {
        LowlaDbBuilder::default()
    }

    /// Collection `collection` in database `db`.
    pub fn collection(&self, db: &str, collection: &str) -> Collection {
        Collection::new(self.clone(), format!("{db}.{collection}"))
    }

    /// Collection by full `<db>.<collection>` namespace.
    pub fn collection_ns(&self, client_ns: &str) -> Collection {
        Collection::new(self.clone(), client_ns.to_string())
    }

    /// A database name scope.
    pub fn db(&self, name: &str) -> Db {
        Db {
            owner: self.clone(),
            name: name.to_string(),
        }
    }

    /// Runs `body` in one transaction on the underlying datastore.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a storage error from begin or commit.
    pub fn transact<T, F>(&self, body: F) -> CoreResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> CoreResult<T>,
    {
        self.inner.store.transact(body)
    }

    /// Reads the metadata record.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the record is malformed.
    pub fn metadata(&self) -> CoreResult<Metadata> {
        self.transact(|tx| Metadata::load(tx))
    }

    /// Replaces the metadata record.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn set_metadata(&self, meta: &Metadata) -> CoreResult<()> {
        self.transact(|tx| meta.store(tx))
    }

    /// Lifecycle events of this store.
    pub fn events(&self) -> &EventFeed {
        &self.inner.events
    }

    /// Live cursor watchers of this store.
    pub fn live(&self) -> &LiveRegistry {
        &self.inner.live
    }

    /// Starts capturing lowlaIds of local writes.
    ///
    /// The sync engine holds one while a push is in flight so it can tell
    /// which acknowledged documents were edited again in the meantime.
    pub fn capture_saves(&self) -> SaveCapture {
        self.inner.captures.start()
    }

    pub(crate) fn captures(&self) -> &SaveCaptures {
        &self.inner.captures
    }

    /// Replication id of `doc` in `client_ns` under this store's strategy.
    pub fn lowla_id(&self, client_ns: &str, doc: &JsonDocument) -> String {
        self.inner.id_strategy.lowla_id(client_ns, doc)
    }

    /// The underlying datastore.
    pub fn datastore(&self) -> &dyn Datastore {
        self.inner.store.as_ref()
    }

    /// Every namespace that currently holds at least one document.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn namespaces(&self) -> CoreResult<Vec<String>> {
        self.transact(|tx| {
            let names: BTreeSet<String> = tx
                .scan(&ScanOptions::all())?
                .into_iter()
                .filter(|r| r.client_ns != METADATA_NS)
                .map(|r| r.client_ns)
                .collect();
            Ok(names.into_iter().collect())
        })
    }

    /// Whether [`LowlaDb::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Closes the store.
    ///
    /// Drops every event listener and live cursor, then releases the
    /// datastore. Further operations on any clone fail with a closed error.
    ///
    /// # Errors
    ///
    /// Fails if the datastore cannot flush.
    pub fn close(&self) -> CoreResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.events.clear();
        self.inner.live.clear();
        self.inner.store.close()?;
        tracing::info!("store closed");
        Ok(())
    }
}

/// A database name scope within a store.
#[derive(Debug, Clone)]
pub struct Db {
    owner: LowlaDb,
    name: String,
}

impl Db {
    /// The database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection `collection` in this database.
    pub fn collection(&self, collection: &str) -> Collection {
        self.owner.collection(&self.name, collection)
    }

    /// Full namespaces of this database's non-empty collections, sorted.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn collection_names(&self) -> CoreResult<Vec<String>> {
        let prefix = format!("{}.", self.name);
        Ok(self
            .owner
            .namespaces()?
            .into_iter()
            .filter(|ns| ns.starts_with(&prefix))
            .collect())
    }
}

/// Builder for [`LowlaDb`].
#[derive(Default)]
pub struct LowlaDbBuilder {
    store: Option<Arc<dyn Datastore>>,
    id_strategy: Option<Arc<dyn LowlaIdStrategy>>,
}

impl LowlaDbBuilder {
    /// Uses `store` as the datastore. Defaults to a [`MemoryDatastore`].
    #[must_use]
    pub fn datastore(mut self, store: impl Datastore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Uses `strategy` to derive lowlaIds. Defaults to [`DefaultLowlaId`].
    #[must_use]
    pub fn lowla_id(mut self, strategy: impl LowlaIdStrategy + 'static) -> Self {
        self.id_strategy = Some(Arc::new(strategy));
        self
    }

    /// Builds the handle.
    #[must_use]
    pub fn build(self) -> LowlaDb {
        LowlaDb {
            inner: Arc::new(Inner {
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(MemoryDatastore::new())),
                live: LiveRegistry::default(),
                events: EventFeed::new(),
                captures: Arc::new(SaveCaptures::default()),
                id_strategy: self
                    .id_strategy
                    .unwrap_or_else(|| Arc::new(DefaultLowlaId)),
                closed: AtomicBool::new(false),
            }),
        }
    }
}
