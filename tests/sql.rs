//! # SQL Integration Tests
//!
//! End-to-end statements through the public [`Database`] API. Expected
//! values are computed by hand, not by running the engine.

use std::sync::Arc;

use shale::error::{kind_of, ErrorKind};
use shale::types::{ColumnSchema, Row, Schema, Type, Value};
use shale::Database;
use tempfile::tempdir;

fn database() -> (Database, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path(), 32).unwrap();
    (db, dir)
}

fn int(v: i64) -> Value {
    Value::Int64(v)
}

fn text(s: &str) -> Value {
    Value::String(s.into())
}

#[test]
fn select_with_order_by_desc() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (a int64, b string)").unwrap();
    db.execute("INSERT INTO t VALUES (1, \"x\")").unwrap();
    db.execute("INSERT INTO t VALUES (2, \"y\")").unwrap();

    let result = db.execute("SELECT a, b FROM t ORDER BY a DESC").unwrap();
    assert_eq!(
        result.rows,
        vec![vec![int(2), text("y")], vec![int(1), text("x")]]
    );
}

#[test]
fn group_by_constant_computes_all_aggregates() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (a int64)").unwrap();
    for v in [1, 2, 3] {
        db.execute(&format!("INSERT INTO t VALUES ({v})")).unwrap();
    }

    let result = db
        .execute("SELECT sum(a), avg(a), min(a), max(a) FROM t GROUP BY 1")
        .unwrap();
    assert_eq!(result.rows, vec![vec![int(6), int(2), int(1), int(3)]]);

    let names: Vec<&str> = result.schema.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["sum(a)", "avg(a)", "min(a)", "max(a)"]);
}

#[test]
fn group_by_key_column_with_having() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (g int64, v int64)").unwrap();
    for (g, v) in [(1, 10), (2, 1), (1, 20), (2, 2), (3, 100)] {
        db.execute(&format!("INSERT INTO t VALUES ({g}, {v})"))
            .unwrap();
    }

    let result = db
        .execute("SELECT g, sum(v) FROM t GROUP BY g HAVING sum(v) > 5 ORDER BY g")
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![int(1), int(30)], vec![int(3), int(100)]]
    );
}

#[test]
fn join_on_shared_column_name() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE a (id int64, x string)").unwrap();
    db.execute("CREATE TABLE b (id int64, y string)").unwrap();
    db.execute("INSERT INTO a VALUES (1, \"a\")").unwrap();
    db.execute("INSERT INTO a VALUES (2, \"b\")").unwrap();
    db.execute("INSERT INTO b VALUES (1, \"p\")").unwrap();
    db.execute("INSERT INTO b VALUES (3, \"q\")").unwrap();

    let result = db.execute("SELECT id, x, y FROM a, b").unwrap();
    assert_eq!(result.rows, vec![vec![int(1), text("a"), text("p")]]);
}

#[test]
fn star_expands_to_the_union_of_column_names() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE a (id int64, x string)").unwrap();
    db.execute("CREATE TABLE b (id int64, y string)").unwrap();
    db.execute("INSERT INTO a VALUES (1, \"a\")").unwrap();
    db.execute("INSERT INTO b VALUES (1, \"p\")").unwrap();

    let result = db.execute("SELECT * FROM a, b").unwrap();
    let names: Vec<&str> = result.schema.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "x", "y"]);
    assert_eq!(result.rows, vec![vec![int(1), text("a"), text("p")]]);
}

#[test]
fn constant_select_without_from() {
    let (mut db, _dir) = database();

    let result = db.execute("SELECT (3 + 4) * 2 > 13").unwrap();
    assert_eq!(result.rows, vec![vec![Value::Bool(true)]]);

    let result = db.execute("SELECT NOT (5 == 5)").unwrap();
    assert_eq!(result.rows, vec![vec![Value::Bool(false)]]);

    let result = db.execute("SELECT 1 + 2, \"hi\"").unwrap();
    assert_eq!(result.rows, vec![vec![int(3), text("hi")]]);
}

#[test]
fn where_filters_and_projects_expressions() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (a int64)").unwrap();
    for v in 0..10 {
        db.execute(&format!("INSERT INTO t VALUES ({v})")).unwrap();
    }

    let result = db
        .execute("SELECT a * 2 FROM t WHERE a >= 3 AND a < 6 ORDER BY a")
        .unwrap();
    assert_eq!(result.rows, vec![vec![int(6)], vec![int(8)], vec![int(10)]]);
}

#[test]
fn multi_key_order_by_mixes_directions() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (a int64, b int64)").unwrap();
    for (a, b) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
        db.execute(&format!("INSERT INTO t VALUES ({a}, {b})"))
            .unwrap();
    }

    let result = db
        .execute("SELECT a, b FROM t ORDER BY a ASC, b DESC")
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![int(1), int(2)],
            vec![int(1), int(1)],
            vec![int(2), int(2)],
            vec![int(2), int(1)],
        ]
    );
}

#[test]
fn varchar_columns_truncate_to_declared_length() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (tag varchar(4))").unwrap();
    db.execute("INSERT INTO t VALUES (\"abcdef\")").unwrap();

    let result = db.execute("SELECT tag FROM t").unwrap();
    assert_eq!(result.rows, vec![vec![Value::Varchar("abcd".into())]]);
}

#[test]
fn nulls_roundtrip_and_compare_equal() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (a int64, b string)").unwrap();
    db.execute("INSERT INTO t VALUES (NULL, \"kept\")").unwrap();
    db.execute("INSERT INTO t VALUES (1, NULL)").unwrap();

    let result = db.execute("SELECT a, b FROM t").unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::Null, text("kept")],
            vec![int(1), Value::Null],
        ]
    );

    let result = db.execute("SELECT a, b FROM t WHERE a == NULL").unwrap();
    assert_eq!(result.rows, vec![vec![Value::Null, text("kept")]]);
}

#[test]
fn insert_arity_and_type_mismatches_are_rejected() {
    let (mut db, _dir) = database();
    db.execute("CREATE TABLE t (a int64, b string)").unwrap();

    let err = db.execute("INSERT INTO t VALUES (1)").unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::SchemaMismatch));

    let err = db
        .execute("INSERT INTO t VALUES (\"wrong\", \"b\")")
        .unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::SchemaMismatch));

    let err = db.execute("INSERT INTO ghost VALUES (1)").unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::SchemaMismatch));
}

#[test]
fn error_kinds_surface_for_bad_queries() {
    let (mut db, _dir) = database();
    db.execute("CREATE TABLE t (a int64)").unwrap();
    db.execute("INSERT INTO t VALUES (1)").unwrap();

    let err = db.execute("SELEKT 1").unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::Parse));

    let err = db.execute("SELECT missing FROM t").unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::SchemaMismatch));

    let err = db.execute("SELECT a / 0 FROM t").unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::Type));

    let err = db.execute("SELECT sum(a) FROM t").unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::Unsupported));
}

#[test]
fn negative_literals_flow_through_inserts() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (a int64)").unwrap();
    db.execute("INSERT INTO t VALUES (-42)").unwrap();

    let result = db.execute("SELECT a FROM t WHERE a < 0").unwrap();
    assert_eq!(result.rows, vec![vec![int(-42)]]);

    db.execute("CREATE TABLE u (n uint64)").unwrap();
    let err = db.execute("INSERT INTO u VALUES (-1)").unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::SchemaMismatch));
}

#[test]
fn manual_index_rebuild_tracks_a_table() {
    let (mut db, _dir) = database();

    db.execute("CREATE TABLE t (k int64, v string)").unwrap();
    for (k, v) in [(30, "c"), (10, "a"), (20, "b")] {
        db.execute(&format!("INSERT INTO t VALUES ({k}, \"{v}\")"))
            .unwrap();
    }

    let key_schema = Arc::new(Schema::new(vec![ColumnSchema::new("k", Type::Int64)]).unwrap());
    let index = db.open_index("t_by_k", key_schema, Some(4)).unwrap();
    let table = db.open_table("t").unwrap();
    assert_eq!(index.rebuild_from(&table, &[0]).unwrap(), 3);

    // Index lookups resolve to row ids; the caller reads the table.
    let row_id = index.lookup(&vec![int(20)]).unwrap().unwrap();
    let row: Row = table.get_row(row_id).unwrap().unwrap();
    assert_eq!(row, vec![int(20), text("b")]);

    // Ordered iteration reflects key order, not insertion order.
    let mut iter = index.iter().unwrap();
    let mut keys = Vec::new();
    while let Some((key, _)) = iter.next().unwrap() {
        keys.push(key[0].clone());
    }
    assert_eq!(keys, vec![int(10), int(20), int(30)]);
}
