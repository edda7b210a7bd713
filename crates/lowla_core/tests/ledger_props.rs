//! The ledger tracks exactly the documents that differ from their last
//! synced state.

use lowla_codec::from_json;
use lowla_core::{Document, LowlaDb};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pending_iff_changed_since_sync(edits in proptest::collection::vec(0_i64..4, 1..12)) {
        let db = LowlaDb::open_in_memory().unwrap();
        let coll = db.collection("p", "c");
        let synced = json!({"_id": "x", "v": 0}).as_object().cloned().unwrap();
        db.transact(|tx| coll.save_from_server(tx, "p.c$x", synced, None)).unwrap();

        let filter: Document = from_json(json!({"_id": "x"})).unwrap();
        for v in &edits {
            let ops: Document = from_json(json!({"$set": {"v": v}})).unwrap();
            coll.find_and_modify(filter.clone(), &ops).unwrap();

            let pending = db.metadata().unwrap().is_pending("p.c$x");
            prop_assert_eq!(pending, *v != 0);
        }
    }
}
