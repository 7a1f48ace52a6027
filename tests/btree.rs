//! # B+Tree Integration Tests
//!
//! End-to-end coverage of the index through the public API: ordered
//! iteration, lookup consistency under mixed inserts and removes, split
//! cascades at a tiny page capacity, and predicate-filtered range scans.
//! Expected values are computed independently of the engine.

use std::sync::Arc;

use shale::btree::{BTree, IndexComparator, KeyCondition};
use shale::error::{kind_of, ErrorKind};
use shale::storage::BufferPool;
use shale::table::Store;
use shale::types::{ColumnSchema, Row, RowId, Schema, SchemaRef, Type, Value};
use tempfile::tempdir;

fn int_key_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![ColumnSchema::new("k", Type::Int64)]).unwrap())
}

fn key(v: i64) -> Row {
    vec![Value::Int64(v)]
}

fn store(frames: usize) -> (Store, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let pool = Arc::new(BufferPool::new(frames));
    (Store::new(dir.path(), pool).unwrap(), dir)
}

fn collect_keys(tree: &BTree) -> Vec<i64> {
    let mut iter = tree.iter().unwrap();
    let mut keys = Vec::new();
    while let Some((row, _)) = iter.next().unwrap() {
        let Value::Int64(v) = row[0] else {
            panic!("unexpected key {row:?}");
        };
        keys.push(v);
    }
    keys
}

#[test]
fn ascending_inserts_with_capacity_four_split_and_stay_ordered() {
    let (mut store, _dir) = store(32);
    let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(4)).unwrap();

    for k in 1..=100i64 {
        tree.insert(&key(k), RowId::new(0, k as u32)).unwrap();
    }

    // Every key resolves; the fenceposts do not.
    for k in 1..=100i64 {
        assert_eq!(
            tree.lookup(&key(k)).unwrap(),
            Some(RowId::new(0, k as u32)),
            "lookup({k})"
        );
    }
    assert_eq!(tree.lookup(&key(0)).unwrap(), None);
    assert_eq!(tree.lookup(&key(101)).unwrap(), None);

    // Ordered iteration yields each key exactly once, ascending.
    let keys = collect_keys(&tree);
    assert_eq!(keys, (1..=100).collect::<Vec<_>>());
}

#[test]
fn random_order_inserts_iterate_in_ascending_order() {
    let (mut store, _dir) = store(32);
    let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(4)).unwrap();

    // Deterministic shuffle: a multiplicative walk over 0..=196.
    let inserted: Vec<i64> = (0..197i64).map(|i| (i * 89) % 197).collect();
    for (slot, k) in inserted.iter().enumerate() {
        tree.insert(&key(*k), RowId::new(1, slot as u32)).unwrap();
    }

    let keys = collect_keys(&tree);
    assert_eq!(keys, (0..197).collect::<Vec<_>>());
}

#[test]
fn duplicate_keys_are_rejected() {
    let (mut store, _dir) = store(16);
    let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(4)).unwrap();

    tree.insert(&key(42), RowId::new(0, 0)).unwrap();
    let err = tree.insert(&key(42), RowId::new(0, 1)).unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::DuplicateKey));

    // The failed insert must not damage the existing entry.
    assert_eq!(tree.lookup(&key(42)).unwrap(), Some(RowId::new(0, 0)));
}

#[test]
fn lookup_tracks_inserts_and_removes() {
    let (mut store, _dir) = store(32);
    let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(4)).unwrap();

    for k in 0..60i64 {
        tree.insert(&key(k), RowId::new(0, k as u32)).unwrap();
    }
    for k in (0..60i64).step_by(3) {
        assert!(tree.remove(&key(k)).unwrap(), "remove({k})");
    }
    assert!(!tree.remove(&key(0)).unwrap(), "double remove");
    assert!(!tree.remove(&key(1000)).unwrap(), "remove of absent key");

    for k in 0..60i64 {
        let expected = if k % 3 == 0 {
            None
        } else {
            Some(RowId::new(0, k as u32))
        };
        assert_eq!(tree.lookup(&key(k)).unwrap(), expected, "lookup({k})");
    }

    let expected: Vec<i64> = (0..60).filter(|k| k % 3 != 0).collect();
    assert_eq!(collect_keys(&tree), expected);
}

#[test]
fn tree_drained_to_empty_accepts_new_keys() {
    let (mut store, _dir) = store(32);
    let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(4)).unwrap();

    for k in 0..40i64 {
        tree.insert(&key(k), RowId::new(0, k as u32)).unwrap();
    }
    for k in 0..40i64 {
        assert!(tree.remove(&key(k)).unwrap());
    }

    assert_eq!(collect_keys(&tree), Vec::<i64>::new());
    assert_eq!(tree.lookup(&key(7)).unwrap(), None);

    tree.insert(&key(7), RowId::new(2, 2)).unwrap();
    assert_eq!(tree.lookup(&key(7)).unwrap(), Some(RowId::new(2, 2)));
    assert_eq!(collect_keys(&tree), vec![7]);
}

#[test]
fn range_scan_applies_all_predicates_conjunctively() {
    let (mut store, _dir) = store(32);
    let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(4)).unwrap();

    for k in 0..50i64 {
        tree.insert(&key(k), RowId::new(0, k as u32)).unwrap();
    }

    let conditions = vec![
        KeyCondition::new("k", IndexComparator::GreaterOrEqual, Value::Int64(10)),
        KeyCondition::new("k", IndexComparator::Less, Value::Int64(20)),
        KeyCondition::new("k", IndexComparator::NotEqual, Value::Int64(15)),
    ];
    let mut iter = tree.scan(&conditions).unwrap();

    let mut seen = Vec::new();
    while let Some((row, _)) = iter.next().unwrap() {
        let Value::Int64(v) = row[0] else { unreachable!() };
        seen.push(v);
    }

    let expected: Vec<i64> = (10..20).filter(|k| *k != 15).collect();
    assert_eq!(seen, expected);
}

#[test]
fn equality_scan_finds_exactly_one_key() {
    let (mut store, _dir) = store(32);
    let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(4)).unwrap();

    for k in 0..200i64 {
        tree.insert(&key(k), RowId::new(0, k as u32)).unwrap();
    }

    let conditions = vec![KeyCondition::new(
        "k",
        IndexComparator::Equal,
        Value::Int64(137),
    )];
    let mut iter = tree.scan(&conditions).unwrap();
    let (row, row_id) = iter.next().unwrap().unwrap();
    assert_eq!(row, key(137));
    assert_eq!(row_id, RowId::new(0, 137));
    assert!(iter.next().unwrap().is_none());
}

#[test]
fn composite_keys_order_lexicographically() {
    let (mut store, _dir) = store(32);
    let key_schema = Arc::new(
        Schema::new(vec![
            ColumnSchema::new("a", Type::Int64),
            ColumnSchema::new("b", Type::Int64),
        ])
        .unwrap(),
    );
    let tree = BTree::open_or_create(&mut store, "idx", key_schema, Some(4)).unwrap();

    let mut pairs = Vec::new();
    for a in 0..6i64 {
        for b in 0..6i64 {
            pairs.push((a, b));
        }
    }
    // Insert in a scrambled but deterministic order.
    pairs.rotate_left(17);
    pairs.reverse();
    for (slot, (a, b)) in pairs.iter().enumerate() {
        tree.insert(
            &vec![Value::Int64(*a), Value::Int64(*b)],
            RowId::new(0, slot as u32),
        )
        .unwrap();
    }

    let mut iter = tree.iter().unwrap();
    let mut seen = Vec::new();
    while let Some((row, _)) = iter.next().unwrap() {
        let (Value::Int64(a), Value::Int64(b)) = (&row[0], &row[1]) else {
            unreachable!()
        };
        seen.push((*a, *b));
    }

    let mut expected = pairs.clone();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn varchar_keys_are_fixed_width_and_ordered() {
    let (mut store, _dir) = store(32);
    let key_schema = Arc::new(Schema::new(vec![ColumnSchema::varchar("name", 8)]).unwrap());
    let tree = BTree::open_or_create(&mut store, "idx", key_schema, Some(4)).unwrap();

    for (slot, name) in ["pear", "apple", "fig", "banana", "cherry"].iter().enumerate() {
        tree.insert(
            &vec![Value::Varchar((*name).to_string())],
            RowId::new(0, slot as u32),
        )
        .unwrap();
    }

    let mut iter = tree.iter().unwrap();
    let mut seen = Vec::new();
    while let Some((row, _)) = iter.next().unwrap() {
        seen.push(row[0].as_str().unwrap().to_string());
    }
    assert_eq!(seen, ["apple", "banana", "cherry", "fig", "pear"]);

    assert!(tree
        .lookup(&vec![Value::Varchar("fig".into())])
        .unwrap()
        .is_some());
    assert!(tree
        .lookup(&vec![Value::Varchar("grape".into())])
        .unwrap()
        .is_none());
}

#[test]
fn string_key_columns_are_rejected() {
    let (mut store, _dir) = store(8);
    let key_schema = Arc::new(Schema::new(vec![ColumnSchema::new("s", Type::String)]).unwrap());
    let err = BTree::open_or_create(&mut store, "idx", key_schema, None).unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::SchemaMismatch));
}

#[test]
fn reopen_validates_key_size_and_capacity() {
    let dir = tempdir().unwrap();
    {
        let pool = Arc::new(BufferPool::new(16));
        let mut store = Store::new(dir.path(), pool).unwrap();
        let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(8)).unwrap();
        tree.insert(&key(1), RowId::new(0, 0)).unwrap();
        store.pool().flush().unwrap();
    }

    let pool = Arc::new(BufferPool::new(16));
    let mut store = Store::new(dir.path(), pool).unwrap();

    // Different capacity: metadata mismatch.
    let err = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(4)).unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::IndexInvariant));

    // Different key schema (wider key): metadata mismatch.
    let wide = Arc::new(
        Schema::new(vec![
            ColumnSchema::new("a", Type::Int64),
            ColumnSchema::new("b", Type::Int64),
        ])
        .unwrap(),
    );
    let err = BTree::open_or_create(&mut store, "idx", wide, Some(8)).unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::IndexInvariant));

    // Matching parameters reopen cleanly and see the old data.
    let tree = BTree::open_or_create(&mut store, "idx", int_key_schema(), Some(8)).unwrap();
    assert_eq!(tree.lookup(&key(1)).unwrap(), Some(RowId::new(0, 0)));
}
