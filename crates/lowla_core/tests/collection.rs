//! Local write path: collections, the change ledger and capture.

use lowla_codec::from_json;
use lowla_core::{CoreError, Document, LowlaDb, LowlaEvent, Value};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn doc(v: serde_json::Value) -> Document {
    from_json(v).unwrap()
}

fn all() -> Document {
    Document::new()
}

#[test]
fn insert_assigns_missing_ids() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");

    let generated = coll.insert(doc(json!({"a": 1}))).unwrap();
    let kept = coll.insert(doc(json!({"_id": "mine", "a": 2}))).unwrap();

    assert!(matches!(generated.get("_id"), Some(Value::Text(id)) if id.len() == 36));
    assert_eq!(kept["_id"], Value::from("mine"));
    assert_eq!(coll.count(all()).unwrap(), 2);

    let meta = db.metadata().unwrap();
    assert!(meta.is_pending("app.items$mine"));
    assert!(meta.changes["app.items$mine"].is_empty());
}

#[test]
fn insert_rejects_dollar_fields_before_writing() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");

    let err = coll
        .insert_many(vec![doc(json!({"a": 1})), doc(json!({"$bad": 1}))])
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidField { ref field } if field == "$bad"));
    assert!(err.is_validation());
    assert_eq!(coll.count(all()).unwrap(), 0);
    assert!(db.metadata().unwrap().changes.is_empty());
}

#[test]
fn find_and_modify_applies_modifiers() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    coll.insert(doc(json!({"_id": "1", "a": 1, "gone": true})))
        .unwrap();

    let updated = coll
        .find_and_modify(
            doc(json!({"_id": "1"})),
            &doc(json!({"$set": {"b": 2}, "$unset": {"gone": 1}})),
        )
        .unwrap()
        .unwrap();

    assert_eq!(updated, doc(json!({"_id": "1", "a": 1, "b": 2})));
    assert_eq!(coll.find_one(doc(json!({"b": 2}))).unwrap(), Some(updated));
}

#[test]
fn replacement_keeps_id() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    coll.insert(doc(json!({"_id": "1", "a": 1}))).unwrap();

    let replaced = coll
        .find_and_modify(doc(json!({"a": 1})), &doc(json!({"z": 26})))
        .unwrap()
        .unwrap();
    assert_eq!(replaced, doc(json!({"_id": "1", "z": 26})));
}

#[test]
fn invalid_updates_are_rejected() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    coll.insert(doc(json!({"_id": "1", "a": 1}))).unwrap();

    let unknown = coll
        .find_and_modify(all(), &doc(json!({"$set": {"a": 2}, "$inc": {"a": 1}})))
        .unwrap_err();
    assert_eq!(unknown.to_string(), "Unknown modifier: $inc");

    let mixed = coll
        .find_and_modify(all(), &doc(json!({"$set": {"a": 2}, "b": 1})))
        .unwrap_err();
    assert!(matches!(mixed, CoreError::MixedUpdate));

    let dollar = coll
        .find_and_modify(all(), &doc(json!({"$inc": {"a": 1}})))
        .unwrap_err();
    assert!(matches!(dollar, CoreError::InvalidField { .. }));

    assert_eq!(
        coll.find_one(all()).unwrap().unwrap(),
        doc(json!({"_id": "1", "a": 1}))
    );
}

#[test]
fn find_and_modify_without_match_is_none() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    let result = coll
        .find_and_modify(doc(json!({"_id": "nope"})), &doc(json!({"$set": {"a": 1}})))
        .unwrap();
    assert!(result.is_none());
    assert!(db.metadata().unwrap().changes.is_empty());
}

#[test]
fn remove_counts_and_records_ledger() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    for i in 0..3 {
        coll.insert(doc(json!({"_id": format!("{i}"), "even": i % 2 == 0})))
            .unwrap();
    }

    assert_eq!(coll.remove(doc(json!({"even": true}))).unwrap(), 2);
    assert_eq!(coll.remove(doc(json!({"even": true}))).unwrap(), 0);
    assert_eq!(coll.count(all()).unwrap(), 1);

    // never pushed, so the snapshots are still empty
    let meta = db.metadata().unwrap();
    assert_eq!(meta.changes.len(), 3);
    assert!(meta.changes["app.items$0"].is_empty());
}

#[test]
fn server_writes_bypass_ledger_and_capture() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    let capture = db.capture_saves();

    let server_doc = json!({"_id": "s", "v": 1}).as_object().cloned().unwrap();
    db.transact(|tx| coll.save_from_server(tx, "app.items$s", server_doc, None))
        .unwrap();
    assert!(db.metadata().unwrap().changes.is_empty());
    assert!(!capture.contains("app.items$s"));

    coll.find_and_modify(doc(json!({"_id": "s"})), &doc(json!({"$set": {"v": 2}})))
        .unwrap();
    assert!(capture.contains("app.items$s"));
    let meta = db.metadata().unwrap();
    assert_eq!(meta.changes["app.items$s"]["v"], 1);
}

#[test]
fn editing_back_to_snapshot_clears_pending() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    let original = json!({"_id": "s", "v": 1}).as_object().cloned().unwrap();
    db.transact(|tx| coll.save_from_server(tx, "app.items$s", original, None))
        .unwrap();

    let filter = doc(json!({"_id": "s"}));
    coll.find_and_modify(filter.clone(), &doc(json!({"$set": {"v": 2}})))
        .unwrap();
    assert!(db.metadata().unwrap().is_pending("app.items$s"));

    coll.find_and_modify(filter, &doc(json!({"$set": {"v": 1}})))
        .unwrap();
    assert!(!db.metadata().unwrap().is_pending("app.items$s"));
}

#[test]
fn server_rename_replaces_previous_record() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    coll.insert(doc(json!({"_id": "tmp", "a": 1}))).unwrap();

    let renamed = json!({"_id": "real", "a": 1}).as_object().cloned().unwrap();
    db.transact(|tx| {
        coll.save_from_server(tx, "app.items$real", renamed, Some("app.items$tmp"))
    })
    .unwrap();

    let docs = coll.find(all()).to_array().unwrap();
    assert_eq!(docs, vec![doc(json!({"_id": "real", "a": 1}))]);
}

#[test]
fn server_documents_with_bad_tags_are_rejected() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    let bad = json!({"_id": "x", "d": {"_bsonType": "Nope"}})
        .as_object()
        .cloned()
        .unwrap();
    let err = db
        .transact(|tx| coll.save_from_server(tx, "app.items$x", bad, None))
        .unwrap_err();
    assert_eq!(err.to_string(), "Unexpected BSON type: Nope");
    assert_eq!(coll.count(all()).unwrap(), 0);
}

#[test]
fn live_cursors_rerun_after_local_writes() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    let counts = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&counts);
    let id = coll.find(all()).on(move |cursor| {
        sink.lock().push(cursor.count().unwrap());
    });
    coll.insert(doc(json!({"a": 1}))).unwrap();
    db.collection("app", "other").insert(all()).unwrap();
    coll.insert(doc(json!({"a": 2}))).unwrap();

    assert!(db.live().unregister(id));
    coll.insert(doc(json!({"a": 3}))).unwrap();

    assert_eq!(*counts.lock(), vec![0, 1, 2]);
}

#[test]
fn pending_event_follows_each_write() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    let rx = db.events().subscribe();

    coll.insert(doc(json!({"_id": "1"}))).unwrap();
    coll.find_and_modify(doc(json!({"_id": "1"})), &doc(json!({"$set": {"x": 1}})))
        .unwrap();
    coll.remove(all()).unwrap();

    let events: Vec<LowlaEvent> = rx.try_iter().collect();
    assert_eq!(events, vec![LowlaEvent::Pending; 3]);
}
