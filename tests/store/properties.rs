//! Store Properties
//!
//! Randomized checks of the record, index and transaction guarantees,
//! run against both backends.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use crate::common::*;

#[derive(Debug, Clone)]
enum Op {
    Put(String, String),
    Delete(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => ("[a-e]{1,2}", "[a-z0-9]{0,6}").prop_map(|(k, v)| Op::Put(k, v)),
        1 => "[a-e]{1,2}".prop_map(Op::Delete),
    ]
}

fn kind_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["*", "+"])
}

fn rows_strategy() -> impl Strategy<Value = BTreeMap<String, (u8, String)>> {
    prop::collection::btree_map(
        "k[0-9]{1,3}",
        (0u8..60, prop::sample::select(vec!["a", "b", "c"]).prop_map(str::to_string)),
        0..30,
    )
}

fn load_rows(store: &Store, rows: &BTreeMap<String, (u8, String)>) {
    for (key, (score, tag)) in rows {
        store
            .put(key, record(&[("score", score.to_string().as_str()), ("tag", tag.as_str())]))
            .unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_store_matches_model(spec in kind_strategy(), ops in prop::collection::vec(op_strategy(), 0..60)) {
        let store = Store::open(spec).unwrap();
        let mut model: BTreeMap<String, Value> = BTreeMap::new();
        for op in ops {
            match op {
                Op::Put(k, v) => {
                    store.put(&k, v.as_str()).unwrap();
                    model.insert(k, Value::from(v));
                }
                Op::Delete(k) => {
                    let removed = store.delete(&k).unwrap();
                    prop_assert_eq!(removed, model.remove(&k));
                }
            }
        }
        prop_assert_eq!(store.len().unwrap(), model.len());
        for (k, v) in &model {
            let got = store.get(k).unwrap();
            prop_assert_eq!(got.as_ref(), Some(v));
        }
        prop_assert_eq!(contents(&store), model);
    }

    #[test]
    fn prop_clear_empties_everything(spec in kind_strategy(), keys in prop::collection::btree_set("[a-z]{1,5}", 0..30)) {
        let store = Store::open(spec).unwrap();
        for k in &keys {
            store.put(k, "v").unwrap();
        }
        prop_assert_eq!(store.len().unwrap(), keys.len());
        store.clear().unwrap();
        prop_assert_eq!(store.len().unwrap(), 0);
        for k in &keys {
            prop_assert!(store.get(k).unwrap().is_none());
        }
    }

    #[test]
    fn prop_index_lookup_is_exact(
        spec in kind_strategy(),
        rows in rows_strategy(),
        overwrites in rows_strategy(),
        wanted in prop::sample::select(vec!["a", "b", "c"]),
    ) {
        let store = Store::open(spec).unwrap();
        store.set_index("tag", IndexAction::Add(IndexKind::Lexical)).unwrap();
        load_rows(&store, &rows);
        load_rows(&store, &overwrites);

        let mut committed = rows.clone();
        committed.extend(overwrites);
        let expected: BTreeSet<String> = committed
            .iter()
            .filter(|(_, (_, tag))| tag == wanted)
            .map(|(k, _)| k.clone())
            .collect();

        let q = Query::new().add("tag", Operator::StrEq, wanted);
        prop_assert!(store.explain(&q).unwrap().contains("index tag"));
        let got: BTreeSet<String> = query_pks(&store, &q).into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_two_conditions_intersect(
        spec in kind_strategy(),
        rows in rows_strategy(),
        bound in 0u8..60,
        tag in prop::sample::select(vec!["a", "b", "c"]),
    ) {
        let store = Store::open(spec).unwrap();
        store.set_index("score", IndexAction::Add(IndexKind::Decimal)).unwrap();
        load_rows(&store, &rows);

        let by_score = Query::new().add("score", Operator::NumGe, bound.to_string());
        let by_tag = Query::new().add("tag", Operator::StrEq, tag);
        let both = by_score.clone().add("tag", Operator::StrEq, tag);

        let a: BTreeSet<String> = query_pks(&store, &by_score).into_iter().collect();
        let b: BTreeSet<String> = query_pks(&store, &by_tag).into_iter().collect();
        let ab: BTreeSet<String> = query_pks(&store, &both).into_iter().collect();
        prop_assert_eq!(ab, a.intersection(&b).cloned().collect::<BTreeSet<_>>());
    }

    #[test]
    fn prop_descending_sort_is_non_increasing(
        spec in kind_strategy(),
        rows in rows_strategy(),
        indexed in any::<bool>(),
    ) {
        let store = Store::open(spec).unwrap();
        if indexed {
            store.set_index("score", IndexAction::Add(IndexKind::Decimal)).unwrap();
        }
        load_rows(&store, &rows);

        let q = Query::new().order_by("score", Direction::NumDesc);
        let scores: Vec<u8> = store
            .query(&q)
            .unwrap()
            .collect_rows()
            .unwrap()
            .iter()
            .map(|row| row.get("score").unwrap().parse().unwrap())
            .collect();
        prop_assert_eq!(scores.len(), rows.len());
        prop_assert!(scores.windows(2).all(|w| w[0] >= w[1]));

        let q = Query::new().order_by("tag", Direction::StrDesc);
        let tags: Vec<String> = store
            .query(&q)
            .unwrap()
            .collect_rows()
            .unwrap()
            .iter()
            .map(|row| row.get("tag").unwrap().to_string())
            .collect();
        prop_assert!(tags.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn prop_abort_is_atomic(
        spec in kind_strategy(),
        rows in rows_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..30),
    ) {
        let store = Store::open(spec).unwrap();
        load_rows(&store, &rows);
        let before = contents(&store);

        let mut txn = store.begin().unwrap();
        for op in ops {
            match op {
                Op::Put(k, v) => txn.put(&k, v.as_str()).unwrap(),
                Op::Delete(k) => {
                    txn.delete(&k).unwrap();
                }
            }
        }
        txn.abort().unwrap();
        prop_assert_eq!(contents(&store), before);
    }
}
