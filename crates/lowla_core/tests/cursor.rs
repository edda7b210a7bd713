//! Cursor queries: filter, sort, limit, counts and pending flags.

use chrono::{TimeZone, Utc};
use lowla_codec::from_json;
use lowla_core::{Document, LowlaDb, SortKey, SortSpec, Value};
use serde_json::json;

fn doc(v: serde_json::Value) -> Document {
    from_json(v).unwrap()
}

fn seeded() -> LowlaDb {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "scores");
    coll.insert_many(vec![
        doc(json!({"_id": "a", "name": "ann", "score": 30, "team": "red"})),
        doc(json!({"_id": "b", "name": "bob", "team": "blue"})),
        doc(json!({"_id": "c", "name": "cat", "score": 10, "team": "red"})),
        doc(json!({"_id": "d", "name": "dan", "score": 20, "team": "blue"})),
    ])
    .unwrap();
    db
}

fn names(docs: &[Document]) -> Vec<&str> {
    docs.iter().filter_map(|d| d["name"].as_str()).collect()
}

#[test]
fn ascending_sort_puts_missing_last() {
    let db = seeded();
    let docs = db
        .collection("app", "scores")
        .find(Document::new())
        .sort("score")
        .to_array()
        .unwrap();
    assert_eq!(names(&docs), vec!["cat", "dan", "ann", "bob"]);
}

#[test]
fn descending_sort_still_puts_missing_last() {
    let db = seeded();
    let docs = db
        .collection("app", "scores")
        .find(Document::new())
        .sort(("score", -1))
        .to_array()
        .unwrap();
    assert_eq!(names(&docs), vec!["ann", "dan", "cat", "bob"]);
}

#[test]
fn compound_sort_and_limit() {
    let db = seeded();
    let spec = SortSpec::from(vec![
        SortKey::from_direction("team", 1),
        SortKey::from_direction("name", -1),
    ]);
    let docs = db
        .collection("app", "scores")
        .find(Document::new())
        .sort(spec)
        .limit(3)
        .to_array()
        .unwrap();
    assert_eq!(names(&docs), vec!["dan", "bob", "cat"]);
}

#[test]
fn count_ignores_limit_but_size_does_not() {
    let db = seeded();
    let coll = db.collection("app", "scores");
    let cursor = coll.find(doc(json!({"team": "red"}))).limit(1);
    assert_eq!(cursor.count().unwrap(), 2);
    assert_eq!(cursor.size().unwrap(), 1);
    assert_eq!(coll.find(Document::new()).limit(2).count().unwrap(), 4);
}

#[test]
fn filters_compare_structurally() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "shapes");
    let when = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let mut dated = doc(json!({"_id": "d", "tags": ["x", "y"], "pos": {"x": 1, "y": 2}}));
    dated.insert("at".into(), Value::from(when));
    coll.insert(dated).unwrap();
    coll.insert(doc(json!({"_id": "e", "pos": {"x": 1}}))).unwrap();

    let by_object = coll
        .find(doc(json!({"pos": {"y": 2, "x": 1.0}})))
        .to_array()
        .unwrap();
    assert_eq!(by_object.len(), 1);
    assert_eq!(by_object[0]["at"].as_date(), Some(when));

    let mut by_date = Document::new();
    by_date.insert("at".into(), Value::from(when));
    assert_eq!(coll.count(by_date).unwrap(), 1);

    assert_eq!(coll.count(doc(json!({"tags": ["y", "x"]}))).unwrap(), 0);
    assert_eq!(coll.count(doc(json!({"missing": null}))).unwrap(), 0);
}

#[test]
fn show_pending_flags_dirty_documents() {
    let db = LowlaDb::open_in_memory().unwrap();
    let coll = db.collection("app", "items");
    coll.insert(doc(json!({"_id": "local"}))).unwrap();
    let clean = json!({"_id": "remote"}).as_object().cloned().unwrap();
    db.transact(|tx| coll.save_from_server(tx, "app.items$remote", clean, None))
        .unwrap();

    let docs = coll
        .find(Document::new())
        .sort("_id")
        .show_pending()
        .to_array()
        .unwrap();
    assert_eq!(docs[0]["$pending"], Value::Bool(true));
    assert_eq!(docs[1]["$pending"], Value::Bool(false));

    let plain = coll.find(Document::new()).to_array().unwrap();
    assert!(plain.iter().all(|d| !d.contains_key("$pending")));
}

#[test]
fn each_visits_in_order() {
    let db = seeded();
    let mut seen = Vec::new();
    db.collection("app", "scores")
        .find(doc(json!({"team": "blue"})))
        .sort("name")
        .each(|d| seen.push(d["_id"].clone()))
        .unwrap();
    assert_eq!(seen, vec![Value::from("b"), Value::from("d")]);
}
