//! Runs SELECT queries against the shared dataset and compares the result rows.
use super::{int, real, rows, setup, text, DATASET, NULL};
use vaultdb::error::{Error, Result};
use vaultdb::sql::execution::ResultSet;
use vaultdb::Caller;

macro_rules! test_query {
    ( $( $name:ident: $query:expr => $expect:expr, )* ) => {
        $(
            #[test]
            fn $name() -> Result<()> {
                let mut db = setup(DATASET)?;
                assert_eq!(rows(&mut db, $query)?, $expect);
                Ok(())
            }
        )*
    };
}

macro_rules! test_query_error {
    ( $( $name:ident: $query:expr => $expect:pat, )* ) => {
        $(
            #[test]
            fn $name() -> Result<()> {
                let mut db = setup(DATASET)?;
                let result = db.query($query, &[], &Caller::Local);
                assert!(matches!(result, Err($expect)), "unexpected result {:?}", result);
                Ok(())
            }
        )*
    };
}

test_query! {
    all_columns: "SELECT * FROM users WHERE age > 26" => vec![
        vec![int(1), text("Alice"), int(30), text("Paris")],
        vec![int(4), text("Dave"), int(41), text("Rome")],
    ],
    and: "SELECT name FROM users WHERE age > 25 AND city = 'Paris'" => vec![vec![text("Alice")]],
    or: "SELECT name FROM users WHERE city = 'Paris' OR age < 26 ORDER BY name DESC" => vec![
        vec![text("Eve")], vec![text("Carol")], vec![text("Bob")], vec![text("Alice")],
    ],
    like: "SELECT name FROM users WHERE name LIKE 'a%'" => vec![vec![text("Alice")]],
    like_single: "SELECT name FROM users WHERE name LIKE '_ve'" => vec![vec![text("Eve")]],
    in_list: "SELECT id FROM users WHERE id IN (1, 3)" => vec![vec![int(1)], vec![int(3)]],
    not_in_list: "SELECT id FROM users WHERE id NOT IN (1, 2, 3)" => vec![vec![int(4)], vec![int(5)]],
    between: "SELECT name FROM users WHERE age BETWEEN 25 AND 30" => vec![
        vec![text("Alice")], vec![text("Bob")], vec![text("Eve")],
    ],
    is_null: "SELECT name FROM users WHERE age IS NULL" => vec![vec![text("Carol")]],
    not: "SELECT name FROM users WHERE age IS NOT NULL AND NOT city = 'Oslo'" => vec![
        vec![text("Alice")], vec![text("Dave")],
    ],
    not_equal_skips_null: "SELECT name FROM users WHERE age != 25" => vec![
        vec![text("Alice")], vec![text("Dave")],
    ],
    numeric_text: "SELECT name FROM users WHERE age = '25'" => vec![vec![text("Bob")], vec![text("Eve")]],
    no_match: "SELECT name FROM users WHERE age > 100" => Vec::<Vec<vaultdb::sql::types::Value>>::new(),
    injection_literal: "SELECT name FROM users WHERE name = 'x'' OR ''1''=''1'" =>
        Vec::<Vec<vaultdb::sql::types::Value>>::new(),

    order_desc: "SELECT name, age FROM users ORDER BY age DESC, name" => vec![
        vec![text("Dave"), int(41)],
        vec![text("Alice"), int(30)],
        vec![text("Bob"), int(25)],
        vec![text("Eve"), int(25)],
        vec![text("Carol"), NULL],
    ],
    order_nulls_first: "SELECT name FROM users ORDER BY age" => vec![
        vec![text("Carol")], vec![text("Bob")], vec![text("Eve")], vec![text("Alice")], vec![text("Dave")],
    ],
    order_hidden: "SELECT name FROM users ORDER BY city, id" => vec![
        vec![text("Bob")], vec![text("Eve")], vec![text("Alice")], vec![text("Carol")], vec![text("Dave")],
    ],
    limit_offset: "SELECT name FROM users ORDER BY id LIMIT 2 OFFSET 1" => vec![
        vec![text("Bob")], vec![text("Carol")],
    ],
    limit_zero: "SELECT name FROM users LIMIT 0" => Vec::<Vec<vaultdb::sql::types::Value>>::new(),
    distinct: "SELECT DISTINCT city FROM users" => vec![
        vec![text("Paris")], vec![text("Oslo")], vec![text("Rome")],
    ],
    constants: "SELECT 1, 'a' AS x" => vec![vec![int(1), text("a")]],

    group_count: "SELECT city, COUNT(*) FROM users GROUP BY city" => vec![
        vec![text("Paris"), int(2)], vec![text("Oslo"), int(2)], vec![text("Rome"), int(1)],
    ],
    group_having: "SELECT city, AVG(age) AS avg_age FROM users GROUP BY city HAVING COUNT(*) > 1 ORDER BY city" => vec![
        vec![text("Oslo"), real(25.0)], vec![text("Paris"), real(30.0)],
    ],
    aggregates: "SELECT COUNT(*), COUNT(age), SUM(age), MIN(age), MAX(name) FROM users" => vec![
        vec![int(5), int(4), int(121), int(25), text("Eve")],
    ],
    aggregates_empty: "SELECT COUNT(*), SUM(age), MAX(age) FROM users WHERE age > 100" => vec![
        vec![int(0), NULL, NULL],
    ],
    group_qualified: "SELECT o.user_id, SUM(o.amount) FROM orders AS o GROUP BY o.user_id ORDER BY 2 DESC" => vec![
        vec![int(2), real(30.0)], vec![int(4), real(15.0)], vec![int(1), real(14.5)], vec![int(9), real(1.0)],
    ],

    join_inner: "SELECT u.name, o.item FROM users AS u JOIN orders AS o ON o.user_id = u.id ORDER BY o.id" => vec![
        vec![text("Alice"), text("book")],
        vec![text("Alice"), text("pen")],
        vec![text("Bob"), text("lamp")],
        vec![text("Dave"), text("book")],
    ],
    join_left: "SELECT u.name, o.item FROM users u LEFT JOIN orders o ON o.user_id = u.id WHERE o.id IS NULL" => vec![
        vec![text("Carol"), NULL], vec![text("Eve"), NULL],
    ],
    join_right: "SELECT o.item, u.name FROM users u RIGHT OUTER JOIN orders o ON o.user_id = u.id WHERE u.id IS NULL" => vec![
        vec![text("ghost"), NULL],
    ],
    join_cross: "SELECT COUNT(*) FROM users CROSS JOIN orders" => vec![vec![int(25)]],
    join_comma: "SELECT COUNT(*) FROM users, orders WHERE users.id = orders.user_id" => vec![vec![int(4)]],
    join_grouped: "SELECT u.name, COUNT(*) FROM users u JOIN orders o ON o.user_id = u.id GROUP BY u.name ORDER BY u.name" => vec![
        vec![text("Alice"), int(2)], vec![text("Bob"), int(1)], vec![text("Dave"), int(1)],
    ],
}

test_query_error! {
    missing_table: "SELECT * FROM missing" => Error::TableNotFound(_),
    missing_column: "SELECT nope FROM users" => Error::ColumnNotFound(_),
    missing_relation: "SELECT x.name FROM users" => Error::TableNotFound(_),
    ambiguous_column: "SELECT id FROM users u JOIN orders o ON o.user_id = u.id" => Error::Validation(_),
    duplicate_alias: "SELECT * FROM users u JOIN orders u ON u.id = 1" => Error::Validation(_),
    having_without_group: "SELECT name FROM users HAVING name = 'x'" => Error::Validation(_),
    missing_from: "SELECT name" => Error::Validation(_),
    aggregate_in_where: "SELECT name FROM users WHERE COUNT(*) > 1" => Error::Validation(_),
}

#[test]
fn column_labels() -> Result<()> {
    let mut db = setup(DATASET)?;
    match db.query("SELECT name AS n, age, 1 FROM users LIMIT 1", &[], &Caller::Local)? {
        ResultSet::Query { columns, rows } => {
            assert_eq!(columns, vec!["n", "age", "1"]);
            assert_eq!(rows, vec![vec![text("Alice"), int(30), int(1)]]);
        },
        result => panic!("Unexpected result {:?}", result),
    }
    Ok(())
}

#[test]
fn parameters() -> Result<()> {
    let mut db = setup(DATASET)?;
    let result = db.query(
        "SELECT name FROM users WHERE city = ? AND age >= ?",
        &["Paris".into(), 18.into()],
        &Caller::Local,
    )?;
    assert_eq!(result, ResultSet::Query { columns: vec!["name".into()], rows: vec![vec![text("Alice")]] });

    // Parameters are values, never SQL.
    let result = db.query("SELECT name FROM users WHERE name = ?", &["' OR '1'='1".into()], &Caller::Local)?;
    assert_eq!(result.into_rows()?.len(), 0);

    assert_eq!(
        db.query("SELECT name FROM users WHERE id = ?", &[], &Caller::Local),
        Err(Error::InvalidParameterCount { expected: 1, actual: 0 })
    );
    Ok(())
}

#[test]
fn execute_rows() -> Result<()> {
    let mut db = setup(DATASET)?;
    let result = db.execute("SELECT id, name FROM users WHERE age > 26", &[], &Caller::Local);
    assert!(result.success);
    assert_eq!(result.row_count, Some(2));
    assert_eq!(result.columns, Some(vec!["id".to_string(), "name".to_string()]));
    let rows = result.rows.unwrap_or_default();
    assert_eq!(rows[0].get("name"), Some(&text("Alice")));
    assert_eq!(rows[1].get("id"), Some(&int(4)));
    Ok(())
}

#[test]
fn signed_zeros_are_one_value() -> Result<()> {
    let mut db = setup(&[
        "CREATE TABLE z (id INTEGER PRIMARY KEY, r REAL)",
        "INSERT INTO z (r) VALUES (0.0), (-0.0), (0)",
    ])?;
    assert_eq!(rows(&mut db, "SELECT DISTINCT r FROM z")?, vec![vec![real(0.0)]]);
    assert_eq!(rows(&mut db, "SELECT r, COUNT(*) FROM z GROUP BY r")?, vec![vec![real(0.0), int(3)]]);
    Ok(())
}

#[test]
fn integer_bounds() -> Result<()> {
    let mut db = setup(&[
        "CREATE TABLE n (id INTEGER PRIMARY KEY, v INTEGER)",
        "INSERT INTO n (v) VALUES (-9223372036854775808), (9223372036854775807)",
    ])?;
    assert_eq!(
        rows(&mut db, "SELECT v FROM n WHERE v < 0")?,
        vec![vec![int(i64::MIN)]]
    );
    assert!(matches!(
        db.query("SELECT v FROM n WHERE v < -9223372036854775809", &[], &Caller::Local),
        Err(Error::Parse(_))
    ));
    Ok(())
}
