//! Recovery Tests
//!
//! File-backed stores across close and reopen: committed state survives,
//! crashed tails are discarded, and maintenance keeps contents intact.

use crate::common::*;

#[test]
fn test_committed_transaction_survives_reopen() {
    let mut t = TestStore::tree();
    {
        let store = t.store();
        let mut txn = store.begin().unwrap();
        txn.put("a", record(&[("x", "1")])).unwrap();
        txn.put("b", record(&[("x", "2")])).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin().unwrap();
        txn.put("c", "lost").unwrap();
        txn.abort().unwrap();
    }
    t.reopen();
    let store = t.store();
    assert_eq!(store.keys(None, None).unwrap(), vec!["a", "b"]);
}

#[test]
fn test_truncated_log_recovers_a_prefix() {
    let mut t = TestStore::hash();
    for i in 0..50 {
        t.store().put(&format!("k{}", i), "v").unwrap();
    }
    t.store().sync().unwrap();
    t.store.take().unwrap().close().unwrap();

    let size = file_size(&t.path);
    truncate_file(&t.path, size - 20);
    t.reopen();

    let store = t.store();
    let n = store.len().unwrap();
    assert!(n > 0 && n < 50);
    for i in 0..n {
        assert!(store.contains(&format!("k{}", i)).unwrap());
    }
}

#[test]
fn test_optimize_keeps_contents_and_indexes() {
    let mut t = TestStore::with_file("opt.tcb", "apow=4");
    {
        let store = t.store();
        store
            .set_index("age", IndexAction::Add(IndexKind::Decimal))
            .unwrap();
        load_people(store);
        for i in 0..100 {
            store.put("pk0", record(&[("age", i.to_string().as_str())])).unwrap();
        }
        let before = t.file_size();
        store.optimize().unwrap();
        assert!(t.file_size() < before);
    }
    let expected = contents(t.store());
    t.reopen();
    let store = t.store();
    assert_eq!(contents(store), expected);
    assert_eq!(
        store.index_kind("age").unwrap(),
        Some(IndexKind::Decimal)
    );
    assert_eq!(
        query_pks(store, &Query::new().add("age", Operator::NumEq, "99")),
        vec!["pk0"]
    );
}

#[test]
fn test_config_file_drives_open() {
    let dir = tempfile::TempDir::new().unwrap();
    let cfg_path = dir.path().join("tansu.toml");
    tansu::write_config(&StoreConfig::tree().with_mutex(true), &cfg_path).unwrap();

    let config = tansu::load_config(&cfg_path).unwrap();
    let path = dir.path().join("from_config.db");
    let store = Store::open_with(&path.display().to_string(), &config).unwrap();
    assert_eq!(store.kind(), StoreKind::Tree);
    store.put("b", "2").unwrap();
    store.put("a", "1").unwrap();
    assert_eq!(store.keys(None, None).unwrap(), vec!["a", "b"]);
}
