//! Usage Scenarios
//!
//! Concrete sequences of calls with exact expected results.

use crate::common::*;

// ============================================================================
// Queries
// ============================================================================

fn age_query() -> Query {
    Query::new()
        .add("age", Operator::NumGe, "32")
        .order_by("age", Direction::NumDesc)
        .limit(2)
}

#[test]
fn test_age_query_without_index() {
    init_tracing();
    let store = Store::open("*").unwrap();
    load_people(&store);

    let rows = store.query(&age_query()).unwrap().collect_rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].pk(), Some("pk3"));
    assert_eq!(rows[0].get("age"), Some("77"));
    assert_eq!(rows[1].pk(), Some("pk2"));
    assert_eq!(rows[1].get("age"), Some("45"));
}

#[test]
fn test_age_query_with_decimal_index() {
    let t = TestStore::tree();
    let store = t.store();
    store
        .set_index("age", IndexAction::Add(IndexKind::Decimal))
        .unwrap();
    load_people(store);

    assert!(store.explain(&age_query()).unwrap().contains("index age"));
    assert_eq!(query_pks(store, &age_query()), vec!["pk3", "pk2"]);
    assert_eq!(store.count(&age_query()).unwrap(), 2);
    assert_eq!(
        store
            .count(&Query::new().add("age", Operator::NumGe, "32"))
            .unwrap(),
        3
    );
}

#[test]
fn test_token_and_prefix_operators() {
    let store = Store::open("+").unwrap();
    load_people(&store);

    let q = Query::new().add("lang", Operator::StrOr, "fr de");
    let mut pks = query_pks(&store, &q);
    pks.sort();
    assert_eq!(pks, vec!["pk2", "pk3"]);

    let q = Query::new()
        .add("lang", Operator::StrAnd, "ja en")
        .add("name", Operator::StrBw, "al");
    assert_eq!(query_pks(&store, &q), vec!["pk0"]);

    let q = Query::new().add("age", Operator::NumBt, "20 40");
    assert_eq!(query_pks(&store, &q), vec!["pk0", "pk4"]);
}

#[test]
fn test_malformed_conditions_are_query_errors() {
    let store = Store::open("*").unwrap();
    load_people(&store);

    let err = store
        .query(&Query::new().add("age", Operator::NumGt, "old"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);

    let err = store
        .query(&Query::new().add("name", Operator::StrRx, "(unclosed"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);

    let err = Query::new().add_named("age", "numlike", "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);
}

#[test]
fn test_query_delete_removes_matches_only() {
    let store = Store::open("*").unwrap();
    load_people(&store);
    let removed = store
        .query_delete(&Query::new().add("age", Operator::NumLt, "30"))
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.len().unwrap(), 3);
    assert!(store.get("pk0").unwrap().is_none());
    assert!(store.get("pk1").unwrap().is_none());
}

// ============================================================================
// Counters
// ============================================================================

#[test]
fn test_add_int_sequence_and_type_mismatch() {
    let store = Store::open("*").unwrap();
    assert_eq!(store.add_int("counter", 1).unwrap(), 1);
    assert_eq!(store.add_int("counter", 2).unwrap(), 3);

    store.put("counter", "a").unwrap();
    let err = store.add_int("counter", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(store.get("counter").unwrap(), Some(Value::from("a")));
}

#[test]
fn test_add_double_and_field_counters() {
    let store = Store::open("+").unwrap();
    assert_eq!(store.add_double("d", 1.5).unwrap(), 1.5);
    assert_eq!(store.add_double("d", 1.0).unwrap(), 2.5);

    store.put("r", record(&[("hits", "4")])).unwrap();
    assert_eq!(store.add_int_field("r", "hits", 3).unwrap(), 7);
    assert_eq!(
        store.get("r").unwrap().unwrap().column("hits"),
        Some("7")
    );
}

// ============================================================================
// Size and clear
// ============================================================================

#[test]
fn test_size_and_clear() {
    let store = Store::open("*").unwrap();
    for i in 0..10 {
        store.put(&format!("k{}", i), "v").unwrap();
    }
    assert_eq!(store.len().unwrap(), 10);
    for i in 0..4 {
        assert!(store.delete(&format!("k{}", i)).unwrap().is_some());
    }
    assert_eq!(store.len().unwrap(), 6);
    assert!(store.delete("k0").unwrap().is_none());

    store.clear().unwrap();
    assert_eq!(store.len().unwrap(), 0);
    for i in 0..10 {
        assert!(store.get(&format!("k{}", i)).unwrap().is_none());
    }
}

// ============================================================================
// Copy
// ============================================================================

#[test]
fn test_copy_fidelity() {
    let t = TestStore::hash();
    let store = t.store();
    load_people(store);
    store.put("raw", b"\x00\x01binary".to_vec()).unwrap();

    let target = t.sibling("copy.tch");
    store.copy(&target).unwrap();

    let copy = Store::open(&format!("{}#mode=r", target.display())).unwrap();
    assert_eq!(copy.len().unwrap(), store.len().unwrap());
    assert_eq!(contents(&copy), contents(store));
}

#[test]
fn test_memory_store_copy_writes_a_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Store::open("+").unwrap();
    load_people(&store);

    let target = dir.path().join("snapshot.tcb");
    store.copy(&target).unwrap();
    let copy = Store::open(&target.display().to_string()).unwrap();
    assert_eq!(contents(&copy), contents(&store));
}

#[test]
fn test_compact_copy_is_smaller_after_overwrites() {
    let t = TestStore::hash();
    let store = t.store();
    for i in 0..200 {
        store.put("hot", record(&[("n", i.to_string().as_str())])).unwrap();
    }
    store.put("cold", "x").unwrap();

    let raw = t.sibling("raw.tch");
    let compact = t.sibling("compact.tch");
    store.copy(&raw).unwrap();
    store.compact_copy(&compact).unwrap();

    assert!(file_size(&compact) < file_size(&raw));
    let copy = Store::open(&compact.display().to_string()).unwrap();
    assert_eq!(contents(&copy), contents(store));
}

#[test]
fn test_copy_onto_itself_is_rejected() {
    let t = TestStore::hash();
    let err = t.store().copy(&t.path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn test_abort_restores_full_contents() {
    let store = Store::open("+").unwrap();
    load_people(&store);
    let before = contents(&store);

    let mut txn = store.begin().unwrap();
    txn.put("pk9", record(&[("age", "1")])).unwrap();
    txn.delete("pk0").unwrap();
    txn.add_int_field("pk1", "age", 5).unwrap();
    txn.put("pk2", "overwritten").unwrap();
    txn.abort().unwrap();

    assert_eq!(contents(&store), before);
}

#[test]
fn test_begin_while_active_fails() {
    let store = Store::open("*").unwrap();
    let _txn = store.begin().unwrap();
    let err = store.begin().unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::AlreadyActive)
    ));
}

// ============================================================================
// Handle lifecycle
// ============================================================================

#[test]
fn test_operations_after_close_fail() {
    let store = Store::open("*").unwrap();
    store.put("a", "1").unwrap();
    store.close().unwrap();
    store.close().unwrap();

    assert_eq!(store.get("a").unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(store.put("a", "2").unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(store.len().unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(
        store.query(&Query::new()).unwrap_err().kind(),
        ErrorKind::Closed
    );
}

#[test]
fn test_read_only_store_rejects_writes() {
    let mut t = TestStore::hash();
    t.store().put("a", "1").unwrap();
    t.params = "mode=r".to_string();
    t.reopen();

    let store = t.store();
    assert!(store.is_read_only());
    assert_eq!(store.get("a").unwrap(), Some(Value::from("1")));
    assert_eq!(store.put("b", "2").unwrap_err().kind(), ErrorKind::Invalid);
    assert!(store.begin().is_ok());
}
