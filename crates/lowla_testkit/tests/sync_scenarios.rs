//! End-to-end sync against the in-process adapter.

use chrono::{TimeZone, Utc};
use lowla_core::{Document, LowlaDb, LowlaEvent, Value};
use lowla_sync::{
    load_from_url, pull_changes, SyncConfig, SyncCoordinator, SyncHandle,
};
use lowla_testkit::{doc, document_strategy, AdapterCall, FakeAdapter, TestStore};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn coordinator(db: &LowlaDb, adapter: &Arc<FakeAdapter>) -> SyncCoordinator {
    SyncCoordinator::new(db.clone(), Arc::clone(adapter), SyncConfig::default())
}

fn push_sizes(adapter: &FakeAdapter) -> Vec<usize> {
    adapter
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            AdapterCall::Push(ids) => Some(ids.len()),
            _ => None,
        })
        .collect()
}

fn by_id(id: &str) -> Document {
    doc(json!({ "_id": id }))
}

#[test]
fn pushes_in_chunks_of_ten() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    let docs: Vec<Document> = (0..25).map(|i| doc(json!({"_id": format!("{i:02}"), "n": i}))).collect();
    store.collection("d", "c").insert_many(docs).unwrap();

    let sync = coordinator(&store, &adapter);
    assert!(sync.sync_now());

    assert_eq!(push_sizes(&adapter), vec![10, 10, 5]);
    assert_eq!(adapter.live_ids().len(), 25);
    assert!(store.metadata().unwrap().changes.is_empty());
    assert_eq!(sync.stats().documents_pushed, 25);
}

#[test]
fn unacknowledged_document_is_pushed_next_cycle() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    let docs: Vec<Document> = (0..15).map(|i| doc(json!({"_id": format!("{i:02}")}))).collect();
    store.collection("d", "c").insert_many(docs).unwrap();
    adapter.skip_ack("d.c$07");

    let sync = coordinator(&store, &adapter);
    sync.sync_now();
    assert_eq!(push_sizes(&adapter), vec![10, 5]);
    let meta = store.metadata().unwrap();
    assert_eq!(meta.changes.len(), 1);
    assert!(meta.is_pending("d.c$07"));

    adapter.clear_calls();
    sync.sync_now();
    assert_eq!(
        adapter.calls().first(),
        Some(&AdapterCall::Push(vec!["d.c$07".into()]))
    );
    assert!(store.metadata().unwrap().changes.is_empty());
}

#[test]
fn pull_never_overwrites_pending_edit() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    adapter.put("d.c$1", json!({"a": "server"}));
    let sync = coordinator(&store, &adapter);
    sync.sync_now();

    let people = store.collection("d", "c");
    people
        .find_and_modify(by_id("1"), &doc(json!({"$set": {"a": "local"}})))
        .unwrap();
    adapter.put("d.c$1", json!({"a": "server again"}));

    pull_changes(&store, adapter.as_ref(), &SyncConfig::default()).unwrap();
    let local = people.find_one(by_id("1")).unwrap().unwrap();
    assert_eq!(local["a"], Value::from("local"));
    assert!(store.metadata().unwrap().is_pending("d.c$1"));

    sync.sync_now();
    assert_eq!(adapter.document("d.c$1").unwrap()["a"], "local");
    assert_eq!(
        people.find_one(by_id("1")).unwrap().unwrap()["a"],
        Value::from("local")
    );
}

#[test]
fn sequence_holds_until_pull_completes() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    for id in ["d.c$1", "d.c$2", "d.c$3"] {
        adapter.put(id, json!({"v": 1}));
    }
    adapter.withhold("d.c$2");

    let sync = coordinator(&store, &adapter);
    sync.sync_now();
    assert_eq!(store.collection("d", "c").count(Document::new()).unwrap(), 2);
    assert_eq!(store.metadata().unwrap().sequence, 0);

    adapter.release("d.c$2");
    adapter.clear_calls();
    sync.sync_now();
    assert_eq!(adapter.calls()[0], AdapterCall::Changes(0));
    assert_eq!(store.collection("d", "c").count(Document::new()).unwrap(), 3);
    assert_eq!(store.metadata().unwrap().sequence, 3);
}

#[test]
fn cycle_events_nest_in_order() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    store.collection("d", "c").insert(by_id("local")).unwrap();
    adapter.put("d.c$remote", json!({}));

    let events = store.events().subscribe();
    coordinator(&store, &adapter).sync_now();

    let seen: Vec<&str> = events.try_iter().map(|e| e.name()).collect();
    assert_eq!(
        seen,
        vec!["syncBegin", "pushBegin", "pushEnd", "pullBegin", "pullEnd", "syncEnd"]
    );
}

#[test]
fn server_assigned_id_replaces_client_id() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    store
        .collection("d", "c")
        .insert(doc(json!({"_id": "tmp", "a": 1})))
        .unwrap();
    adapter.rename_on_push("d.c$tmp", "d.c$srv");

    coordinator(&store, &adapter).sync_now();

    let all = store.collection("d", "c").find(Document::new()).to_array().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["_id"], Value::from("srv"));
    assert_eq!(all[0]["a"], Value::from(1_i64));
    assert!(store.metadata().unwrap().changes.is_empty());
    assert_eq!(adapter.live_ids(), vec!["d.c$srv"]);
}

#[test]
fn dates_cross_the_wire_tagged() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    let when = Utc.timestamp_millis_opt(1_500_000_000_123).unwrap();
    adapter.put(
        "d.c$in",
        json!({"at": {"_bsonType": "Date", "millis": 1_500_000_000_123_i64}}),
    );
    let mut outgoing = by_id("out");
    outgoing.insert("at".into(), Value::Date(when));
    store.collection("d", "c").insert(outgoing).unwrap();

    coordinator(&store, &adapter).sync_now();

    let incoming = store.collection("d", "c").find_one(by_id("in")).unwrap().unwrap();
    assert_eq!(incoming["at"], Value::Date(when));
    assert_eq!(
        adapter.document("d.c$out").unwrap()["at"],
        json!({"_bsonType": "Date", "millis": 1_500_000_000_123_i64})
    );
}

#[test]
fn unknown_tag_fails_the_pull_and_writes_nothing() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    adapter.put("d.c$ok", json!({}));
    adapter.put("d.c$bad", json!({"x": {"_bsonType": "Nope"}}));

    let sync = coordinator(&store, &adapter);
    sync.sync_now();

    let stats = sync.stats();
    assert_eq!(stats.failed_cycles, 1);
    assert!(stats
        .last_error
        .unwrap()
        .contains("Unexpected BSON type: Nope"));
    assert_eq!(store.collection("d", "c").count(Document::new()).unwrap(), 0);
    assert_eq!(store.metadata().unwrap().sequence, 0);
}

#[test]
fn outage_is_recorded_and_next_cycle_recovers() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    store.collection("d", "c").insert(by_id("1")).unwrap();
    adapter.fail_next(2);

    let sync = coordinator(&store, &adapter);
    sync.sync_now();
    assert_eq!(sync.stats().failed_cycles, 1);
    assert!(store.metadata().unwrap().is_pending("d.c$1"));

    sync.sync_now();
    let stats = sync.stats();
    assert_eq!(stats.cycles_completed, 2);
    assert!(stats.last_error.is_none());
    assert!(adapter.document("d.c$1").is_some());
}

#[test]
fn two_clients_converge_through_the_adapter() {
    let adapter = Arc::new(FakeAdapter::new());
    let alice = TestStore::memory();
    let bob = TestStore::file();
    let alice_sync = coordinator(&alice, &adapter);
    let bob_sync = coordinator(&bob, &adapter);

    alice
        .collection("app", "notes")
        .insert(doc(json!({"_id": "n1", "text": "hi"})))
        .unwrap();
    alice_sync.sync_now();
    bob_sync.sync_now();
    let notes = bob.collection("app", "notes");
    assert_eq!(
        notes.find_one(by_id("n1")).unwrap().unwrap()["text"],
        Value::from("hi")
    );

    notes
        .find_and_modify(by_id("n1"), &doc(json!({"$set": {"text": "hello"}})))
        .unwrap();
    bob_sync.sync_now();
    alice_sync.sync_now();
    assert_eq!(
        alice
            .collection("app", "notes")
            .find_one(by_id("n1"))
            .unwrap()
            .unwrap()["text"],
        Value::from("hello")
    );

    alice.collection("app", "notes").remove(by_id("n1")).unwrap();
    alice_sync.sync_now();
    assert!(adapter.is_deleted("app.notes$n1"));
    bob_sync.sync_now();
    assert_eq!(notes.count(Document::new()).unwrap(), 0);
}

#[test]
fn http_transport_round_trips_through_the_adapter() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    adapter.put("d.c$remote", json!({"k": true}));
    store.collection("d", "c").insert(by_id("local")).unwrap();

    let sync = SyncCoordinator::with_client(
        store.db.clone(),
        Arc::clone(&adapter),
        SyncConfig::new("http://adapter.test"),
    )
    .unwrap();
    sync.sync_now();

    assert!(sync.stats().last_error.is_none());
    assert!(adapter.document("d.c$local").is_some());
    assert_eq!(store.collection("d", "c").count(Document::new()).unwrap(), 2);
}

#[test]
fn bootstrap_load_skips_the_first_pull() {
    let adapter = Arc::new(FakeAdapter::new());
    for i in 0..12 {
        adapter.put(&format!("d.c${i}"), json!({"i": i}));
    }
    let store = TestStore::memory();

    let loaded = load_from_url(&store, adapter.as_ref(), "http://adapter.test/_lowla/load").unwrap();
    assert_eq!(loaded, 12);
    assert_eq!(store.metadata().unwrap().sequence, adapter.sequence());

    adapter.clear_calls();
    coordinator(&store, &adapter).sync_now();
    assert_eq!(adapter.calls(), vec![AdapterCall::Changes(12)]);
}

#[test]
fn background_sync_pushes_local_writes() {
    let store = TestStore::memory();
    let adapter = Arc::new(FakeAdapter::new());
    let config = SyncConfig::default()
        .with_listen_for_changes(true)
        .with_debounce(Duration::from_millis(20));
    let sync = Arc::new(SyncCoordinator::new(store.db.clone(), Arc::clone(&adapter), config));
    let handle = SyncHandle::start(Arc::clone(&sync)).unwrap();

    store.collection("d", "c").insert(by_id("bg")).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while adapter.document("d.c$bg").is_none() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    handle.stop();

    assert!(adapter.document("d.c$bg").is_some());
    let events = store.events().subscribe();
    store.collection("d", "c").insert(by_id("after")).unwrap();
    assert_eq!(events.try_recv().unwrap(), LowlaEvent::Pending);
    std::thread::sleep(Duration::from_millis(60));
    assert!(adapter.document("d.c$after").is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn a_second_client_sees_what_the_first_pushed(
        docs in prop::collection::vec(document_strategy(4), 1..15)
    ) {
        let adapter = Arc::new(FakeAdapter::new());
        let writer = TestStore::memory();
        let reader = TestStore::memory();

        let docs: Vec<Document> = docs
            .into_iter()
            .enumerate()
            .map(|(i, mut d)| {
                d.insert("_id".into(), Value::from(format!("{i}")));
                d
            })
            .collect();
        writer.collection("p", "docs").insert_many(docs.clone()).unwrap();

        coordinator(&writer, &adapter).sync_now();
        coordinator(&reader, &adapter).sync_now();

        let pulled = reader.collection("p", "docs");
        prop_assert_eq!(pulled.count(Document::new()).unwrap(), docs.len());
        for original in &docs {
            let id = original["_id"].clone();
            let mut filter = Document::new();
            filter.insert("_id".into(), id);
            let mut got = pulled.find_one(filter).unwrap().unwrap();
            got.remove("_version");
            prop_assert_eq!(&got, original);
        }
    }
}
